use super::page_index::PageIndexEntry;
use super::runtime::{reject_reply, Actor, Envelope, Reply};
use super::state_store::PersistentState;
use crate::delta::{diff_ignore_case, LinkDelta, TagDelta};
use crate::error::{Result, WikiError};
use crate::id_gen::seed_for;
use crate::link_parser::outgoing_links;
use crate::markdown::first_heading;
use crate::page::{storage_key, suffixed_storage_key, FrontMatter, PageContent, UNTITLED};
use crate::search_index::SearchItem;
use crate::system::WikiSystem;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

const STATE_NAME: &str = "page";

/// How many suffixed keys are tried before a write gives up on naming.
const MAX_KEY_ATTEMPTS: u64 = 8;

/// Durable facts a page needs to diff its next write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageActorState {
    pub id: String,
    /// Storage key of the page text, possibly suffixed.
    pub file_name: Option<String>,
    /// The unsuffixed key derived from the title the file was named after.
    pub title_key: Option<String>,
    pub outgoing_links: Vec<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    /// Fan-out of the last write that has not been confirmed complete.
    pub pending: Option<PendingPropagation>,
}

/// Everything downstream actors must receive for one page write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPropagation {
    pub entry: PageIndexEntry,
    pub links: LinkDelta,
    pub tags: TagDelta,
    pub categories: TagDelta,
}

/// Link, tag and category changes between the held state and new content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDeltas {
    pub links: LinkDelta,
    pub tags: TagDelta,
    pub categories: TagDelta,
    pub outgoing_links: Vec<String>,
}

/// Diff new content against the previous derived state. With
/// `propagate_tags` off, tag and category deltas come back empty.
pub fn derive_deltas(
    previous: &PageActorState,
    page_id: &str,
    content: &PageContent,
    propagate_tags: bool,
) -> PageDeltas {
    let outgoing = outgoing_links(&content.body);
    let (added_targets, removed_targets) = diff_ignore_case(&previous.outgoing_links, &outgoing);

    let (added_tags, removed_tags) = if propagate_tags {
        diff_ignore_case(&previous.tags, &content.front_matter.normalized_tags())
    } else {
        (Vec::new(), Vec::new())
    };

    let (added_categories, removed_categories) = if propagate_tags {
        let old: Vec<String> = previous.category.iter().cloned().collect();
        let new: Vec<String> = content.front_matter.normalized_category().into_iter().collect();
        diff_ignore_case(&old, &new)
    } else {
        (Vec::new(), Vec::new())
    };

    PageDeltas {
        links: LinkDelta {
            source_page_id: page_id.to_string(),
            added_targets,
            removed_targets,
        },
        tags: TagDelta {
            page_id: page_id.to_string(),
            added_tags,
            removed_tags,
        },
        categories: TagDelta {
            page_id: page_id.to_string(),
            added_tags: added_categories,
            removed_tags: removed_categories,
        },
        outgoing_links: outgoing,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Update,
}

pub enum PageMsg {
    CreatePage { front_matter: FrontMatter, body: String, reply: Reply<()> },
    UpdatePage { front_matter: FrontMatter, body: String, reply: Reply<()> },
    GetOutgoingLinks { reply: Reply<Vec<String>> },
    GetContent { reply: Reply<Option<String>> },
}

impl Envelope for PageMsg {
    fn reject(self, error: WikiError) {
        match self {
            PageMsg::CreatePage { reply, .. } | PageMsg::UpdatePage { reply, .. } => {
                reject_reply(reply, error)
            }
            PageMsg::GetOutgoingLinks { reply } => reject_reply(reply, error),
            PageMsg::GetContent { reply } => reject_reply(reply, error),
        }
    }
}

/// Owns one page's canonical content and the derived facts it last
/// propagated.
pub struct PageActor {
    id: String,
    state: PersistentState<PageActorState>,
    /// Stored text, as last written or loaded.
    markdown: Option<String>,
}

impl PageActor {
    async fn write(
        &mut self,
        kind: WriteKind,
        front_matter: FrontMatter,
        body: String,
        system: &WikiSystem,
    ) -> Result<()> {
        // An earlier write's fan-out goes out before this one computes deltas.
        self.replay_pending(system).await?;

        let markdown = system.markdown();
        let front_matter = self.complete_front_matter(front_matter, &body, system)?;
        let text = markdown.serialize(&front_matter, &body)?;
        let content = markdown.deserialize(&text)?;

        let key = self.resolve_storage_key(&front_matter.title, system).await?;
        let store = system.content_store();
        store.save(&text, &key).await?;
        if let Some(old) = self.state.state.file_name.as_deref().filter(|old| *old != key) {
            tracing::info!("Page {} renamed from {} to {}", self.id, old, key);
            store.delete(old).await?;
        }
        self.markdown = Some(text);

        self.index_for_search(&content, system).await;

        // A page that has never been written here is new to the catalog.
        let is_new = kind == WriteKind::Create && !self.state.record_exists;
        let propagate_tags = kind == WriteKind::Create || system.config().propagate_tags_on_update;
        let deltas = derive_deltas(&self.state.state, &self.id, &content, propagate_tags);
        let entry = PageIndexEntry::from_content(&content, system.config().excerpt_chars, Utc::now());

        let state = &mut self.state.state;
        state.id = self.id.clone();
        state.file_name = Some(key);
        state.title_key = Some(storage_key(&front_matter.title));
        state.outgoing_links = deltas.outgoing_links;
        if propagate_tags {
            state.tags = front_matter.normalized_tags();
            state.category = front_matter.normalized_category();
        }
        let pending = PendingPropagation {
            entry,
            links: deltas.links,
            tags: deltas.tags,
            categories: deltas.categories,
        };
        state.pending = Some(pending.clone());
        self.state.write().await?;

        self.propagate(&pending, is_new, system).await?;
        self.state.state.pending = None;
        self.state.write().await?;

        tracing::info!("Page {} {}", self.id, if is_new { "created" } else { "updated" });
        Ok(())
    }

    /// Pin the id, fill a blank title and stamp the timestamps.
    fn complete_front_matter(
        &self,
        mut front_matter: FrontMatter,
        body: &str,
        system: &WikiSystem,
    ) -> Result<FrontMatter> {
        if !front_matter.permanent_id.is_empty() && front_matter.permanent_id != self.id {
            tracing::warn!(
                "Ignoring permanent id {} sent to page {}",
                front_matter.permanent_id,
                self.id
            );
        }
        front_matter.permanent_id = self.id.clone();

        if front_matter.title.trim().is_empty() {
            let preview = system.markdown().deserialize(body)?;
            front_matter.title =
                first_heading(&preview.html).unwrap_or_else(|| UNTITLED.to_string());
        }

        let now = Utc::now();
        if front_matter.created_at.is_none() {
            front_matter.created_at = Some(self.previous_created_at(system)?.unwrap_or(now));
        }
        front_matter.updated_at.get_or_insert(now);
        Ok(front_matter)
    }

    fn previous_created_at(&self, system: &WikiSystem) -> Result<Option<chrono::DateTime<Utc>>> {
        match &self.markdown {
            Some(text) => Ok(system.markdown().deserialize(text)?.front_matter.created_at),
            None => Ok(None),
        }
    }

    /// Storage key for `title`. A key held by a different page gets a
    /// generated suffix; an already-suffixed key is kept while the title
    /// still derives the same base key.
    async fn resolve_storage_key(&self, title: &str, system: &WikiSystem) -> Result<String> {
        let base = storage_key(title);
        if let (Some(file), Some(title_key)) = (&self.state.state.file_name, &self.state.state.title_key) {
            if *title_key == base {
                return Ok(file.clone());
            }
        }

        let seed = seed_for(&self.id);
        let mut candidate = base;
        for attempt in 0..MAX_KEY_ATTEMPTS {
            if self.key_is_free(&candidate, system).await? {
                return Ok(candidate);
            }
            let suffix = system.ids().generate(seed.wrapping_add(attempt));
            let next = suffixed_storage_key(title, &suffix);
            tracing::debug!("Storage key {} is taken, trying {}", candidate, next);
            candidate = next;
        }
        Err(WikiError::Storage(format!(
            "no free storage key for page {} after {} attempts",
            self.id, MAX_KEY_ATTEMPTS
        )))
    }

    async fn key_is_free(&self, key: &str, system: &WikiSystem) -> Result<bool> {
        let Some(existing) = system.content_store().get(key).await? else {
            return Ok(true);
        };
        let owner = match system.markdown().deserialize(&existing) {
            Ok(content) => content.front_matter.permanent_id,
            Err(_) => String::new(),
        };
        Ok(owner == self.id)
    }

    async fn index_for_search(&self, content: &PageContent, system: &WikiSystem) {
        let fm = &content.front_matter;
        let item = SearchItem {
            page_id: self.id.clone(),
            title: fm.title.clone(),
            body: content.body.clone(),
            tags: fm.normalized_tags(),
        };
        let index = system.search_index();
        let outcome = tokio::task::spawn_blocking(move || index.upsert(&item)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Search indexing failed for page {}: {}", self.id, e),
            Err(e) => tracing::warn!("Search indexing task for page {} failed: {}", self.id, e),
        }
    }

    /// Push one write's summary and deltas downstream, in order, stopping at
    /// the first failure.
    async fn propagate(&self, pending: &PendingPropagation, is_new: bool, system: &WikiSystem) -> Result<()> {
        let catalog = system.catalog();
        if is_new {
            catalog.add_to_index(pending.entry.clone()).await?;
        } else {
            catalog.update_index(pending.entry.clone()).await?;
        }

        if !pending.links.is_empty() {
            tracing::debug!(
                "Page {} links +{:?} -{:?}",
                self.id,
                pending.links.added_targets,
                pending.links.removed_targets
            );
            system.coordinator().apply_delta(pending.links.clone()).await?;
        }

        if !pending.tags.is_empty() {
            for slug in pending.tags.affected_slugs() {
                system.tag(&slug).apply_delta(pending.tags.clone()).await?;
            }
        }

        if !pending.categories.is_empty() {
            for slug in pending.categories.affected_slugs() {
                system.category(&slug).apply_delta(pending.categories.clone()).await?;
            }
        }
        Ok(())
    }

    /// Take over the stored file the catalog backfilled for this id, as if
    /// it had been created here. The catalog answers only once seeding is
    /// done, so this also runs before this page can save anything.
    async fn adopt_seeded(&mut self, system: &WikiSystem) -> Result<()> {
        let Some(seeded) = system.catalog().get_seeded_page(&self.id).await? else {
            return Ok(());
        };
        let Some(text) = system.content_store().get(&seeded.storage_key).await? else {
            tracing::warn!("Seeded page {} is gone from {}", self.id, seeded.storage_key);
            return Ok(());
        };
        let content = match system.markdown().deserialize(&text) {
            Ok(content) if content.front_matter.permanent_id == self.id => content,
            Ok(_) => {
                tracing::warn!("{} no longer belongs to page {}", seeded.storage_key, self.id);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Seeded page {} at {} is unreadable: {}", self.id, seeded.storage_key, e);
                return Ok(());
            }
        };

        let deltas = derive_deltas(&PageActorState::default(), &self.id, &content, true);
        let fm = &content.front_matter;
        let state = &mut self.state.state;
        state.id = self.id.clone();
        state.title_key = Some(storage_key(&seeded.entry.title));
        state.file_name = Some(seeded.storage_key);
        state.outgoing_links = deltas.outgoing_links;
        state.tags = fm.normalized_tags();
        state.category = fm.normalized_category();
        state.pending = Some(PendingPropagation {
            entry: seeded.entry,
            links: deltas.links,
            tags: deltas.tags,
            categories: deltas.categories,
        });
        self.state.write().await?;

        self.index_for_search(&content, system).await;
        self.markdown = Some(text);
        tracing::info!("Page {} adopted its seeded file", self.id);
        Ok(())
    }

    /// Re-send an unconfirmed fan-out. Every step is an overwrite or an
    /// idempotent set update, so sending it twice is harmless.
    async fn replay_pending(&mut self, system: &WikiSystem) -> Result<()> {
        let Some(pending) = self.state.state.pending.clone() else {
            return Ok(());
        };
        tracing::info!("Replaying unfinished propagation for page {}", self.id);
        self.propagate(&pending, false, system).await?;
        self.state.state.pending = None;
        self.state.write().await
    }
}

#[async_trait]
impl Actor for PageActor {
    type Msg = PageMsg;
    const KIND: &'static str = "page";

    async fn activate(key: &str, system: &WikiSystem) -> Result<Self> {
        let state: PersistentState<PageActorState> =
            PersistentState::load(system.state_store(), STATE_NAME, key).await?;

        let markdown = match &state.state.file_name {
            Some(file) => {
                let text = system.content_store().get(file).await?;
                if text.is_none() {
                    tracing::warn!("Page {} has no stored text at {}", key, file);
                }
                text
            }
            None => None,
        };

        let mut actor = Self {
            id: key.to_string(),
            state,
            markdown,
        };
        if !actor.state.record_exists {
            actor.adopt_seeded(system).await?;
        }
        // Adoption leaves its fan-out pending, so it goes out here too.
        if let Err(e) = actor.replay_pending(system).await {
            // Kept for the next write, which replays before doing anything else.
            tracing::error!("Propagation replay for page {} failed: {}", key, e);
        }
        Ok(actor)
    }

    async fn handle(&mut self, msg: PageMsg, system: &WikiSystem) {
        match msg {
            PageMsg::CreatePage { front_matter, body, reply } => {
                let result = self.write(WriteKind::Create, front_matter, body, system).await;
                if let Err(e) = &result {
                    tracing::error!("Creating page {} failed: {}", self.id, e);
                }
                let _ = reply.send(result);
            }
            PageMsg::UpdatePage { front_matter, body, reply } => {
                let result = self.write(WriteKind::Update, front_matter, body, system).await;
                if let Err(e) = &result {
                    tracing::error!("Updating page {} failed: {}", self.id, e);
                }
                let _ = reply.send(result);
            }
            PageMsg::GetOutgoingLinks { reply } => {
                let _ = reply.send(Ok(self.state.state.outgoing_links.clone()));
            }
            PageMsg::GetContent { reply } => {
                let _ = reply.send(Ok(self.markdown.clone()));
            }
        }
    }
}

pub struct PageRef {
    system: WikiSystem,
    id: String,
}

impl PageRef {
    pub(crate) fn new(system: WikiSystem, id: &str) -> Self {
        Self {
            system,
            id: id.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    async fn ask<R, F>(&self, make: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(Reply<R>) -> PageMsg + Send,
    {
        self.system
            .registries()
            .pages
            .ask(&self.system, &self.id, make)
            .await
    }

    pub async fn create_page(&self, front_matter: FrontMatter, body: impl Into<String>) -> Result<()> {
        let body = body.into();
        self.ask(|reply| PageMsg::CreatePage { front_matter, body, reply }).await
    }

    pub async fn update_page(&self, front_matter: FrontMatter, body: impl Into<String>) -> Result<()> {
        let body = body.into();
        self.ask(|reply| PageMsg::UpdatePage { front_matter, body, reply }).await
    }

    pub async fn get_outgoing_links(&self) -> Result<Vec<String>> {
        self.ask(|reply| PageMsg::GetOutgoingLinks { reply }).await
    }

    /// The stored page text, or `None` if no file backs this page.
    pub async fn get_content(&self) -> Result<Option<String>> {
        self.ask(|reply| PageMsg::GetContent { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::state_store::{MemoryStateStore, StateStore};
    use crate::content_store::{ContentStore, MemoryContentStore};
    use crate::markdown::{MarkdownService, YamlMarkdown};
    use crate::page::PageType;
    use std::sync::Arc;

    fn note(title: &str) -> FrontMatter {
        FrontMatter {
            title: title.into(),
            ..FrontMatter::default()
        }
    }

    fn parsed(body: &str, tags: &[&str], category: Option<&str>) -> PageContent {
        let mut fm = FrontMatter::new("A", PageType::Note);
        fm.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        fm.category = category.map(str::to_string);
        let text = YamlMarkdown.serialize(&fm, body).unwrap();
        YamlMarkdown.deserialize(&text).unwrap()
    }

    fn memory_system() -> (WikiSystem, Arc<MemoryContentStore>) {
        let content = Arc::new(MemoryContentStore::new());
        let system = WikiSystem::builder()
            .content_store(content.clone() as Arc<dyn ContentStore>)
            .build()
            .unwrap();
        (system, content)
    }

    #[test]
    fn deltas_against_empty_state_add_everything() {
        let content = parsed("See [[B]] and [[c|Cee]]", &["Rust", "rust", "web"], Some("Tech"));
        let deltas = derive_deltas(&PageActorState::default(), "A", &content, true);

        assert_eq!(deltas.links.added_targets, vec!["B", "c"]);
        assert!(deltas.links.removed_targets.is_empty());
        assert_eq!(deltas.tags.added_tags, vec!["Rust", "web"]);
        assert_eq!(deltas.categories.added_tags, vec!["Tech"]);
    }

    #[test]
    fn unchanged_content_yields_empty_deltas() {
        let content = parsed("See [[B]]", &["rust"], Some("Tech"));
        let previous = PageActorState {
            outgoing_links: vec!["b".into()],
            tags: vec!["RUST".into()],
            category: Some("tech".into()),
            ..PageActorState::default()
        };
        let deltas = derive_deltas(&previous, "A", &content, true);

        assert!(deltas.links.is_empty());
        assert!(deltas.tags.is_empty());
        assert!(deltas.categories.is_empty());
    }

    #[test]
    fn category_change_is_one_add_and_one_remove() {
        let content = parsed("", &[], Some("Travel"));
        let previous = PageActorState {
            category: Some("Work".into()),
            ..PageActorState::default()
        };
        let deltas = derive_deltas(&previous, "A", &content, true);
        assert_eq!(deltas.categories.added_tags, vec!["Travel"]);
        assert_eq!(deltas.categories.removed_tags, vec!["Work"]);
    }

    #[test]
    fn tag_deltas_are_suppressed_when_disabled() {
        let content = parsed("[[B]]", &["new"], Some("Cat"));
        let deltas = derive_deltas(&PageActorState::default(), "A", &content, false);
        assert_eq!(deltas.links.added_targets, vec!["B"]);
        assert!(deltas.tags.is_empty());
        assert!(deltas.categories.is_empty());
    }

    #[tokio::test]
    async fn create_stores_text_under_the_title_slug() {
        let (system, content) = memory_system();
        system.page("A").create_page(note("Hello World"), "Body").await.unwrap();

        assert_eq!(content.keys(), vec!["hello-world.md".to_string()]);
        let text = system.page("A").get_content().await.unwrap().unwrap();
        let stored = YamlMarkdown.deserialize(&text).unwrap();
        assert_eq!(stored.front_matter.permanent_id, "A");
        assert_eq!(stored.front_matter.title, "Hello World");
        assert!(stored.front_matter.created_at.is_some());
        assert_eq!(stored.body, "Body");
    }

    #[tokio::test]
    async fn unknown_page_has_no_content() {
        let (system, _) = memory_system();
        assert_eq!(system.page("nobody").get_content().await.unwrap(), None);
        assert!(system.page("nobody").get_outgoing_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_title_comes_from_the_first_heading() {
        let (system, content) = memory_system();
        system.page("A").create_page(note(""), "# Garden Log\n\ntext").await.unwrap();
        system.page("B").create_page(note("  "), "no heading").await.unwrap();

        let mut keys = content.keys();
        keys.sort();
        assert_eq!(keys, vec!["garden-log.md".to_string(), "untitled.md".to_string()]);
        let entry = system.catalog().get_by_id("B").await.unwrap().unwrap();
        assert_eq!(entry.title, UNTITLED);
    }

    #[tokio::test]
    async fn repeated_create_updates_the_catalog_entry() {
        let (system, _) = memory_system();
        let page = system.page("A");
        page.create_page(note("Same"), "[[B]]").await.unwrap();
        page.create_page(note("Same"), "[[B]]").await.unwrap();

        assert_eq!(system.catalog().get_count().await.unwrap().total(), 1);
        assert_eq!(system.backlinks("B").get_backlinks().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn title_change_moves_the_stored_file() {
        let (system, content) = memory_system();
        let page = system.page("A");
        page.create_page(note("First Name"), "text").await.unwrap();
        page.update_page(note("Second Name"), "text").await.unwrap();

        assert_eq!(content.keys(), vec!["second-name.md".to_string()]);
        let entry = system.catalog().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(entry.title, "Second Name");
    }

    #[tokio::test]
    async fn colliding_title_gets_a_suffix() {
        let (system, content) = memory_system();
        system.page("A").create_page(note("Ideas"), "first").await.unwrap();
        system.page("B").create_page(note("Ideas"), "second").await.unwrap();

        let expected = suffixed_storage_key("Ideas", &system.ids().generate(seed_for("B")));
        let mut keys = content.keys();
        keys.sort();
        let mut wanted = vec!["ideas.md".to_string(), expected.clone()];
        wanted.sort();
        assert_eq!(keys, wanted);

        // The suffixed name sticks across edits that keep the title.
        system.page("B").update_page(note("Ideas"), "edited").await.unwrap();
        assert!(content.get(&expected).await.unwrap().unwrap().ends_with("edited"));
        assert_eq!(content.keys().len(), 2);
    }

    #[tokio::test]
    async fn update_keeps_the_original_created_at() {
        let (system, _) = memory_system();
        let page = system.page("A");
        page.create_page(note("Dated"), "v1").await.unwrap();
        let created = system.catalog().get_by_id("A").await.unwrap().unwrap().created_at;

        page.update_page(note("Dated"), "v2").await.unwrap();
        let entry = system.catalog().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(entry.created_at, created);
        assert!(entry.updated_at >= created);
    }

    #[tokio::test]
    async fn tags_and_categories_follow_edits() {
        let (system, _) = memory_system();
        let page = system.page("A");
        let mut fm = note("Tagged");
        fm.tags = Some(vec!["Rust".into(), "async".into()]);
        fm.category = Some("Work".into());
        page.create_page(fm, "text").await.unwrap();

        assert_eq!(system.tag("rust").get_pages().await.unwrap(), vec!["A"]);
        assert_eq!(system.category("work").get_pages().await.unwrap(), vec!["A"]);

        let mut fm = note("Tagged");
        fm.tags = Some(vec!["rust".into()]);
        fm.category = Some("Travel".into());
        page.update_page(fm, "text").await.unwrap();

        assert_eq!(system.tag("RUST").get_pages().await.unwrap(), vec!["A"]);
        assert!(system.tag("async").get_pages().await.unwrap().is_empty());
        assert!(system.category("work").get_pages().await.unwrap().is_empty());
        assert_eq!(system.category("travel").get_pages().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn update_leaves_tag_sets_alone_when_propagation_is_off() {
        let system = WikiSystem::builder()
            .propagate_tags_on_update(false)
            .build()
            .unwrap();
        let page = system.page("A");
        let mut fm = note("Tagged");
        fm.tags = Some(vec!["old".into()]);
        page.create_page(fm, "text").await.unwrap();

        let mut fm = note("Tagged");
        fm.tags = Some(vec!["new".into()]);
        page.update_page(fm, "text").await.unwrap();

        assert_eq!(system.tag("old").get_pages().await.unwrap(), vec!["A"]);
        assert!(system.tag("new").get_pages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn content_and_links_survive_eviction() {
        let content = Arc::new(MemoryContentStore::new());
        let state = Arc::new(MemoryStateStore::new());
        let system = WikiSystem::builder()
            .content_store(content.clone() as Arc<dyn ContentStore>)
            .state_store(state.clone() as Arc<dyn StateStore>)
            .idle_timeout_ms(30)
            .build()
            .unwrap();

        system.page("A").create_page(note("Kept"), "[[B]]").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(!system.registries().pages.is_active("A"));

        assert_eq!(system.page("A").get_outgoing_links().await.unwrap(), vec!["B"]);
        let text = system.page("A").get_content().await.unwrap().unwrap();
        assert!(text.ends_with("[[B]]"));
    }

    async fn seeded_store() -> Arc<MemoryContentStore> {
        let store = Arc::new(MemoryContentStore::new());
        let mut fm = FrontMatter::new("s1", PageType::Note);
        fm.title = "Seeded".into();
        fm.tags = Some(vec!["Old".into()]);
        let text = YamlMarkdown.serialize(&fm, "See [[Other]]").unwrap();
        store.save(&text, "seeded.md").await.unwrap();
        store
    }

    fn system_over(content: &Arc<MemoryContentStore>) -> WikiSystem {
        WikiSystem::builder()
            .content_store(content.clone() as Arc<dyn ContentStore>)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn first_create_on_a_fresh_system_succeeds() {
        let (system, content) = memory_system();
        system.page("A").create_page(note("A"), "[[B]]").await.unwrap();

        assert_eq!(content.keys(), vec!["a.md".to_string()]);
        assert_eq!(system.backlinks("B").get_backlinks().await.unwrap(), vec!["A"]);
        assert_eq!(system.catalog().get_count().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn seeded_page_takes_over_its_stored_file() {
        let content = seeded_store().await;
        let system = system_over(&content);

        let text = system.page("s1").get_content().await.unwrap().unwrap();
        assert!(text.contains("See [[Other]]"));
        assert_eq!(system.page("s1").get_outgoing_links().await.unwrap(), vec!["Other"]);
        assert_eq!(system.backlinks("other").get_backlinks().await.unwrap(), vec!["s1"]);
        assert_eq!(system.tag("old").get_pages().await.unwrap(), vec!["s1"]);
        assert_eq!(
            system.graph("s1").get_neighbors().await.unwrap().outgoing,
            vec!["Other"]
        );
    }

    #[tokio::test]
    async fn seeded_links_arrive_without_touching_the_page() {
        let content = seeded_store().await;
        let system = system_over(&content);
        assert_eq!(system.catalog().get_count().await.unwrap().total(), 1);

        let backlinks = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                let sources = system.backlinks("Other").get_backlinks().await.unwrap();
                if !sources.is_empty() {
                    return sources;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(backlinks, vec!["s1"]);
    }

    #[tokio::test]
    async fn create_on_a_seeded_page_replaces_its_entry() {
        let content = seeded_store().await;
        let system = system_over(&content);

        system.page("s1").create_page(note("Fresh Name"), "[[Elsewhere]]").await.unwrap();

        assert_eq!(content.keys(), vec!["fresh-name.md".to_string()]);
        let entry = system.catalog().get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(entry.title, "Fresh Name");
        assert_eq!(system.catalog().get_count().await.unwrap().total(), 1);
        assert!(system.backlinks("other").get_backlinks().await.unwrap().is_empty());
        assert_eq!(system.backlinks("elsewhere").get_backlinks().await.unwrap(), vec!["s1"]);
    }

    #[tokio::test]
    async fn unfinished_propagation_is_replayed_on_activation() {
        let content = Arc::new(MemoryContentStore::new());
        let state = Arc::new(MemoryStateStore::new());

        // Leave a write-ahead record behind as if the process died mid fan-out.
        let mut fm = FrontMatter::new("A", PageType::Note);
        fm.title = "Crashed".into();
        fm.tags = Some(vec!["late".into()]);
        let text = YamlMarkdown.serialize(&fm, "[[B]]").unwrap();
        content.save(&text, "crashed.md").await.unwrap();
        let parsed = YamlMarkdown.deserialize(&text).unwrap();
        let record = PageActorState {
            id: "A".into(),
            file_name: Some("crashed.md".into()),
            title_key: Some("crashed.md".into()),
            outgoing_links: vec!["B".into()],
            tags: vec!["late".into()],
            category: None,
            pending: Some(PendingPropagation {
                entry: PageIndexEntry::from_content(&parsed, 45, Utc::now()),
                links: LinkDelta {
                    source_page_id: "A".into(),
                    added_targets: vec!["B".into()],
                    removed_targets: vec![],
                },
                tags: TagDelta {
                    page_id: "A".into(),
                    added_tags: vec!["late".into()],
                    removed_tags: vec![],
                },
                categories: TagDelta {
                    page_id: "A".into(),
                    added_tags: vec![],
                    removed_tags: vec![],
                },
            }),
        };
        state
            .write(STATE_NAME, "A", &serde_json::to_vec(&record).unwrap())
            .await
            .unwrap();

        let system = WikiSystem::builder()
            .content_store(content.clone() as Arc<dyn ContentStore>)
            .state_store(state.clone() as Arc<dyn StateStore>)
            .build()
            .unwrap();

        assert!(system.page("A").get_content().await.unwrap().is_some());
        assert_eq!(system.backlinks("B").get_backlinks().await.unwrap(), vec!["A"]);
        assert_eq!(system.tag("late").get_pages().await.unwrap(), vec!["A"]);
        assert_eq!(system.catalog().get_by_id("A").await.unwrap().unwrap().title, "Crashed");

        let saved: PageActorState =
            serde_json::from_slice(&state.read(STATE_NAME, "A").await.unwrap().unwrap()).unwrap();
        assert!(saved.pending.is_none());
    }
}
