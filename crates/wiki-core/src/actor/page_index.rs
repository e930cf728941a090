use super::runtime::{reject_reply, Actor, Envelope, Reply};
use super::state_store::PersistentState;
use crate::error::{Result, WikiError};
use crate::markdown::{excerpt, first_heading};
use crate::page::{PageContent, PageType, UNTITLED};
use crate::system::WikiSystem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The catalog is a singleton addressed by this key.
pub const CATALOG_KEY: &str = "index";

const STATE_NAME: &str = "page-index";

/// Denormalized summary of one page, as served by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIndexEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub excerpt: String,
}

impl PageIndexEntry {
    /// Summarize parsed page content. Missing timestamps fall back to `now`
    /// and a blank title to the first heading.
    pub fn from_content(content: &PageContent, excerpt_chars: usize, now: DateTime<Utc>) -> Self {
        let fm = &content.front_matter;
        let title = if fm.title.trim().is_empty() {
            first_heading(&content.html).unwrap_or_else(|| UNTITLED.to_string())
        } else {
            fm.title.clone()
        };
        let created_at = fm.created_at.unwrap_or(now);
        Self {
            id: fm.permanent_id.clone(),
            title,
            page_type: fm.page_type,
            created_at,
            updated_at: fm.updated_at.unwrap_or(created_at),
            category: fm.normalized_category(),
            tags: fm.normalized_tags(),
            pinned: fm.is_pinned(),
            excerpt: excerpt(&content.html, excerpt_chars),
        }
    }
}

/// Totals over the whole catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageCounts {
    pub note_count: usize,
    pub post_count: usize,
    pub journal_count: usize,
    pub category_count: usize,
    pub tag_count: usize,
}

impl PageCounts {
    pub fn total(&self) -> usize {
        self.note_count + self.post_count + self.journal_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogPhase {
    Uninitialized,
    Seeding,
    Ready,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogState {
    pages: HashMap<String, PageIndexEntry>,
    /// Set once the bulk backfill from the content store has been persisted.
    last_indexed_at: Option<DateTime<Utc>>,
    /// Storage key each backfilled page was found under, by page id.
    #[serde(default)]
    seeded_keys: HashMap<String, String>,
}

/// A page the backfill found in storage, as its own actor takes it over.
#[derive(Debug, Clone, PartialEq)]
pub struct SeededPage {
    pub storage_key: String,
    pub entry: PageIndexEntry,
}

/// Point-in-time copy of the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    pub phase: CatalogPhase,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub pages: Vec<PageIndexEntry>,
}

pub enum PageIndexMsg {
    AddToIndex { entry: PageIndexEntry, reply: Reply<()> },
    UpdateIndex { entry: PageIndexEntry, reply: Reply<()> },
    GetById { id: String, reply: Reply<Option<PageIndexEntry>> },
    GetByType { page_type: String, reply: Reply<Vec<PageIndexEntry>> },
    GetRecentPages { pinned: bool, reply: Reply<Vec<PageIndexEntry>> },
    GetCount { reply: Reply<PageCounts> },
    GetState { reply: Reply<CatalogSnapshot> },
    GetSeededPage { id: String, reply: Reply<Option<SeededPage>> },
}

impl Envelope for PageIndexMsg {
    fn reject(self, error: WikiError) {
        match self {
            PageIndexMsg::AddToIndex { reply, .. } | PageIndexMsg::UpdateIndex { reply, .. } => {
                reject_reply(reply, error)
            }
            PageIndexMsg::GetById { reply, .. } => reject_reply(reply, error),
            PageIndexMsg::GetByType { reply, .. } | PageIndexMsg::GetRecentPages { reply, .. } => {
                reject_reply(reply, error)
            }
            PageIndexMsg::GetCount { reply } => reject_reply(reply, error),
            PageIndexMsg::GetState { reply } => reject_reply(reply, error),
            PageIndexMsg::GetSeededPage { reply, .. } => reject_reply(reply, error),
        }
    }
}

/// The catalog of page summaries.
pub struct PageIndexActor {
    state: PersistentState<CatalogState>,
    phase: CatalogPhase,
    recent_limit: usize,
}

impl PageIndexActor {
    /// One-time backfill from every page already in the content store.
    async fn seed(&mut self, system: &WikiSystem) -> Result<()> {
        self.phase = CatalogPhase::Seeding;
        let stored = system.content_store().get_all().await?;
        let markdown = system.markdown();
        let excerpt_chars = system.config().excerpt_chars;
        let now = Utc::now();

        for page in &stored {
            let content = match markdown.deserialize(&page.markdown) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Skipping {} while seeding the catalog: {}", page.key, e);
                    continue;
                }
            };
            if content.front_matter.permanent_id.trim().is_empty() {
                tracing::warn!("Skipping {} while seeding the catalog: no permanent id", page.key);
                continue;
            }
            let entry = PageIndexEntry::from_content(&content, excerpt_chars, now);
            self.state.state.seeded_keys.insert(entry.id.clone(), page.key.clone());
            self.state.state.pages.insert(entry.id.clone(), entry);
        }

        self.state.state.last_indexed_at = Some(now);
        self.state.write().await?;
        tracing::info!(
            "Seeded catalog with {} of {} stored pages",
            self.state.state.pages.len(),
            stored.len()
        );
        Ok(())
    }

    async fn add(&mut self, entry: PageIndexEntry) -> Result<()> {
        if self.state.state.pages.contains_key(&entry.id) {
            return Err(WikiError::DuplicateEntry(entry.id));
        }
        self.state.state.pages.insert(entry.id.clone(), entry);
        self.state.write().await
    }

    async fn update(&mut self, entry: PageIndexEntry) -> Result<()> {
        self.state.state.pages.insert(entry.id.clone(), entry);
        self.state.write().await
    }

    fn by_type(&self, page_type: &str) -> Vec<PageIndexEntry> {
        let wanted = page_type.trim();
        newest_first(
            self.state
                .state
                .pages
                .values()
                .filter(|e| e.page_type.as_str().eq_ignore_ascii_case(wanted)),
        )
    }

    fn recent(&self, pinned: bool) -> Vec<PageIndexEntry> {
        let mut entries = newest_first(self.state.state.pages.values().filter(|e| e.pinned == pinned));
        entries.truncate(self.recent_limit);
        entries
    }

    fn counts(&self) -> PageCounts {
        let mut counts = PageCounts::default();
        let mut categories = HashSet::new();
        let mut tags = HashSet::new();

        for entry in self.state.state.pages.values() {
            match entry.page_type {
                PageType::Note => counts.note_count += 1,
                PageType::Post => counts.post_count += 1,
                PageType::Journal => counts.journal_count += 1,
            }
            if let Some(category) = &entry.category {
                categories.insert(category.to_lowercase());
            }
            tags.extend(entry.tags.iter().map(|t| t.to_lowercase()));
        }

        counts.category_count = categories.len();
        counts.tag_count = tags.len();
        counts
    }

    fn seeded_page(&self, id: &str) -> Option<SeededPage> {
        let storage_key = self.state.state.seeded_keys.get(id)?;
        let entry = self.state.state.pages.get(id)?;
        Some(SeededPage {
            storage_key: storage_key.clone(),
            entry: entry.clone(),
        })
    }

    fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            phase: self.phase,
            last_indexed_at: self.state.state.last_indexed_at,
            pages: newest_first(self.state.state.pages.values()),
        }
    }
}

/// Wake every backfilled page in the background so each one takes over its
/// stored file and pushes its links and tags downstream. Not awaited: the
/// pages ask the catalog, which is still activating.
fn wake_seeded_pages(system: &WikiSystem, ids: Vec<String>) {
    if ids.is_empty() {
        return;
    }
    let system = system.clone();
    tokio::spawn(async move {
        for id in ids {
            if let Err(e) = system.page(&id).get_outgoing_links().await {
                tracing::warn!("Waking seeded page {} failed: {}", id, e);
            }
        }
    });
}

/// Most recently updated first; ties broken by id so listings are stable.
fn newest_first<'a>(entries: impl Iterator<Item = &'a PageIndexEntry>) -> Vec<PageIndexEntry> {
    let mut entries: Vec<PageIndexEntry> = entries.cloned().collect();
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    entries
}

#[async_trait]
impl Actor for PageIndexActor {
    type Msg = PageIndexMsg;
    const KIND: &'static str = "page-index";

    async fn activate(key: &str, system: &WikiSystem) -> Result<Self> {
        let state = PersistentState::load(system.state_store(), STATE_NAME, key).await?;
        let mut actor = Self {
            state,
            phase: CatalogPhase::Uninitialized,
            recent_limit: system.config().recent_limit,
        };
        if actor.state.state.pages.is_empty() && actor.state.state.last_indexed_at.is_none() {
            actor.seed(system).await?;
            wake_seeded_pages(system, actor.state.state.seeded_keys.keys().cloned().collect());
        }
        actor.phase = CatalogPhase::Ready;
        Ok(actor)
    }

    async fn handle(&mut self, msg: PageIndexMsg, _system: &WikiSystem) {
        match msg {
            PageIndexMsg::AddToIndex { entry, reply } => {
                let _ = reply.send(self.add(entry).await);
            }
            PageIndexMsg::UpdateIndex { entry, reply } => {
                let _ = reply.send(self.update(entry).await);
            }
            PageIndexMsg::GetById { id, reply } => {
                let _ = reply.send(Ok(self.state.state.pages.get(&id).cloned()));
            }
            PageIndexMsg::GetByType { page_type, reply } => {
                let _ = reply.send(Ok(self.by_type(&page_type)));
            }
            PageIndexMsg::GetRecentPages { pinned, reply } => {
                let _ = reply.send(Ok(self.recent(pinned)));
            }
            PageIndexMsg::GetCount { reply } => {
                let _ = reply.send(Ok(self.counts()));
            }
            PageIndexMsg::GetState { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            PageIndexMsg::GetSeededPage { id, reply } => {
                let _ = reply.send(Ok(self.seeded_page(&id)));
            }
        }
    }
}

pub struct PageIndexRef {
    system: WikiSystem,
}

impl PageIndexRef {
    pub(crate) fn new(system: WikiSystem) -> Self {
        Self { system }
    }

    async fn ask<R, F>(&self, make: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(Reply<R>) -> PageIndexMsg + Send,
    {
        self.system
            .registries()
            .catalog
            .ask(&self.system, CATALOG_KEY, make)
            .await
    }

    /// Fails with [`WikiError::DuplicateEntry`] when the id is already listed.
    pub async fn add_to_index(&self, entry: PageIndexEntry) -> Result<()> {
        self.ask(|reply| PageIndexMsg::AddToIndex { entry, reply }).await
    }

    /// Replace the entry wholesale, inserting it if absent.
    pub async fn update_index(&self, entry: PageIndexEntry) -> Result<()> {
        self.ask(|reply| PageIndexMsg::UpdateIndex { entry, reply }).await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<PageIndexEntry>> {
        let id = id.to_string();
        self.ask(|reply| PageIndexMsg::GetById { id, reply }).await
    }

    pub async fn get_by_type(&self, page_type: &str) -> Result<Vec<PageIndexEntry>> {
        let page_type = page_type.to_string();
        self.ask(|reply| PageIndexMsg::GetByType { page_type, reply }).await
    }

    pub async fn get_recent_pages(&self, pinned: bool) -> Result<Vec<PageIndexEntry>> {
        self.ask(|reply| PageIndexMsg::GetRecentPages { pinned, reply }).await
    }

    pub async fn get_count(&self) -> Result<PageCounts> {
        self.ask(|reply| PageIndexMsg::GetCount { reply }).await
    }

    pub async fn get_state(&self) -> Result<CatalogSnapshot> {
        self.ask(|reply| PageIndexMsg::GetState { reply }).await
    }

    /// Where the backfill found page `id`, if it did.
    pub(crate) async fn get_seeded_page(&self, id: &str) -> Result<Option<SeededPage>> {
        let id = id.to_string();
        self.ask(|reply| PageIndexMsg::GetSeededPage { id, reply }).await
    }
}
