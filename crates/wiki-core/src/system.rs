use crate::actor::coordinator::{LinkCoordinatorActor, LinkCoordinatorRef};
use crate::actor::graph::{GraphActor, GraphRef};
use crate::actor::index_set::{BacklinkActor, BacklinkRef, CategoryActor, CategoryRef, TagActor, TagRef};
use crate::actor::page::{PageActor, PageRef};
use crate::actor::page_index::{PageIndexActor, PageIndexRef};
use crate::actor::runtime::Registry;
use crate::actor::state_store::{FileStateStore, MemoryStateStore, StateStore};
use crate::config::SystemConfig;
use crate::content_store::{ContentStore, FileContentStore, MemoryContentStore};
use crate::error::{Result, WikiError};
use crate::id_gen::{IdGenerator, ShortIdGenerator};
use crate::markdown::{MarkdownService, YamlMarkdown};
use crate::search_index::{FullTextIndex, SearchIndex, SearchResult};
use std::path::Path;
use std::sync::Arc;

pub const PAGES_DIR: &str = "pages";
pub const STATE_DIR: &str = "db";
pub const SEARCH_INDEX_DIR: &str = "search_index";

/// One registry per actor kind.
#[derive(Default)]
pub(crate) struct Registries {
    pub(crate) pages: Registry<PageActor>,
    pub(crate) catalog: Registry<PageIndexActor>,
    pub(crate) coordinator: Registry<LinkCoordinatorActor>,
    pub(crate) backlinks: Registry<BacklinkActor>,
    pub(crate) tags: Registry<TagActor>,
    pub(crate) categories: Registry<CategoryActor>,
    pub(crate) graphs: Registry<GraphActor>,
}

struct Inner {
    config: SystemConfig,
    state_store: Arc<dyn StateStore>,
    content_store: Arc<dyn ContentStore>,
    markdown: Arc<dyn MarkdownService>,
    search_index: Arc<dyn FullTextIndex>,
    ids: Arc<dyn IdGenerator>,
    registries: Registries,
}

/// Entry point to the wiki index: collaborators plus the actor registries.
/// Cheap to clone; every clone addresses the same actors.
#[derive(Clone)]
pub struct WikiSystem {
    inner: Arc<Inner>,
}

impl WikiSystem {
    pub fn builder() -> WikiSystemBuilder {
        WikiSystemBuilder::default()
    }

    /// Everything in memory, default settings.
    pub fn in_memory() -> Result<Self> {
        Self::builder().build()
    }

    /// File-backed system rooted at `data_dir`:
    /// `pages/` for page text, `db/` for actor state, `search_index/`.
    pub fn open(data_dir: &Path, config: SystemConfig) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let search = SearchIndex::new(&data_dir.join(SEARCH_INDEX_DIR))?;
        tracing::info!("Opening wiki data directory {}", data_dir.display());
        Self::builder()
            .config(config)
            .content_store(Arc::new(FileContentStore::new(data_dir.join(PAGES_DIR))))
            .state_store(Arc::new(FileStateStore::new(data_dir.join(STATE_DIR))))
            .search_index(Arc::new(search))
            .build()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    pub fn state_store(&self) -> Arc<dyn StateStore> {
        self.inner.state_store.clone()
    }

    pub fn content_store(&self) -> Arc<dyn ContentStore> {
        self.inner.content_store.clone()
    }

    pub fn markdown(&self) -> Arc<dyn MarkdownService> {
        self.inner.markdown.clone()
    }

    pub fn search_index(&self) -> Arc<dyn FullTextIndex> {
        self.inner.search_index.clone()
    }

    pub fn ids(&self) -> Arc<dyn IdGenerator> {
        self.inner.ids.clone()
    }

    pub(crate) fn registries(&self) -> &Registries {
        &self.inner.registries
    }

    pub fn page(&self, id: &str) -> PageRef {
        PageRef::new(self.clone(), id)
    }

    pub fn catalog(&self) -> PageIndexRef {
        PageIndexRef::new(self.clone())
    }

    pub fn coordinator(&self) -> LinkCoordinatorRef {
        LinkCoordinatorRef::new(self.clone())
    }

    pub fn backlinks(&self, target: &str) -> BacklinkRef {
        BacklinkRef::new(self.clone(), target)
    }

    pub fn tag(&self, slug: &str) -> TagRef {
        TagRef::new(self.clone(), slug)
    }

    pub fn category(&self, slug: &str) -> CategoryRef {
        CategoryRef::new(self.clone(), slug)
    }

    pub fn graph(&self, page_id: &str) -> GraphRef {
        GraphRef::new(self.clone(), page_id)
    }

    /// Full-text query over every indexed page.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let index = self.search_index();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || index.search(&query, limit))
            .await
            .map_err(|e| WikiError::Search(e.to_string()))?
    }
}

#[derive(Default)]
pub struct WikiSystemBuilder {
    config: SystemConfig,
    state_store: Option<Arc<dyn StateStore>>,
    content_store: Option<Arc<dyn ContentStore>>,
    markdown: Option<Arc<dyn MarkdownService>>,
    search_index: Option<Arc<dyn FullTextIndex>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl WikiSystemBuilder {
    pub fn config(mut self, config: SystemConfig) -> Self {
        self.config = config;
        self
    }

    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    pub fn propagate_tags_on_update(mut self, enabled: bool) -> Self {
        self.config.propagate_tags_on_update = enabled;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content_store = Some(store);
        self
    }

    pub fn markdown(mut self, markdown: Arc<dyn MarkdownService>) -> Self {
        self.markdown = Some(markdown);
        self
    }

    pub fn search_index(mut self, index: Arc<dyn FullTextIndex>) -> Self {
        self.search_index = Some(index);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Unset collaborators default to their in-memory versions.
    pub fn build(self) -> Result<WikiSystem> {
        let search_index: Arc<dyn FullTextIndex> = match self.search_index {
            Some(index) => index,
            None => Arc::new(SearchIndex::new_in_memory()?),
        };
        Ok(WikiSystem {
            inner: Arc::new(Inner {
                config: self.config,
                state_store: self
                    .state_store
                    .unwrap_or_else(|| Arc::new(MemoryStateStore::new())),
                content_store: self
                    .content_store
                    .unwrap_or_else(|| Arc::new(MemoryContentStore::new())),
                markdown: self.markdown.unwrap_or_else(|| Arc::new(YamlMarkdown::new())),
                search_index,
                ids: self.ids.unwrap_or_else(|| Arc::new(ShortIdGenerator::new())),
                registries: Registries::default(),
            }),
        })
    }
}
