use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};

/// A stored page file: its storage key and full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPage {
    pub key: String,
    pub markdown: String,
}

/// Durable home of raw page text, addressed by storage key (`hello-world.md`).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The page text at `key`, or `None` when nothing is stored there.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every stored page, in no particular order.
    async fn get_all(&self) -> Result<Vec<StoredPage>>;

    async fn save(&self, markdown: &str, key: &str) -> Result<()>;

    /// Removing a key that is not stored is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Flat directory of `*.md` files.
pub struct FileContentStore {
    root: PathBuf,
}

impl FileContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root(&self) -> Result<&Path> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(&self.root)
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.ensure_root().await?.join(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self) -> Result<Vec<StoredPage>> {
        let root = self.ensure_root().await?;
        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            let Some(key) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                tracing::warn!("Skipping page file with non UTF-8 name: {:?}", path);
                continue;
            };
            let markdown = tokio::fs::read_to_string(&path).await?;
            pages.push(StoredPage { key, markdown });
        }

        Ok(pages)
    }

    async fn save(&self, markdown: &str, key: &str) -> Result<()> {
        let path = self.ensure_root().await?.join(key);
        let temp = self.root.join(format!("{}.tmp", key));
        tokio::fs::write(&temp, markdown).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.ensure_root().await?.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and throwaway systems.
#[derive(Default)]
pub struct MemoryContentStore {
    pages: DashMap<String, String>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pages.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.pages.get(key).map(|v| v.clone()))
    }

    async fn get_all(&self) -> Result<Vec<StoredPage>> {
        Ok(self
            .pages
            .iter()
            .map(|e| StoredPage {
                key: e.key().clone(),
                markdown: e.value().clone(),
            })
            .collect())
    }

    async fn save(&self, markdown: &str, key: &str) -> Result<()> {
        self.pages.insert(key.to_string(), markdown.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.pages.remove(key);
        Ok(())
    }
}
