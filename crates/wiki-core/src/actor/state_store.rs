use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Durable per-actor records, addressed by state name and actor key.
///
/// Only the actor owning a key ever reads or writes its record, so writes
/// are plain overwrites with no locking or version checks.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self, state_name: &str, key: &str) -> Result<Option<Vec<u8>>>;
    async fn write(&self, state_name: &str, key: &str, bytes: &[u8]) -> Result<()>;
}

/// One JSON file per actor: `<root>/<state_name>/<url-encoded key>.json`.
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn state_dir(&self, state_name: &str) -> Result<PathBuf> {
        let dir = self.root.join(state_name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

// Keys are free text (link targets, tag slugs), so they are encoded before
// becoming file names.
fn file_name(key: &str) -> String {
    format!("{}.json", urlencoding::encode(key))
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self, state_name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.state_dir(state_name).await?.join(file_name(key));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, state_name: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.state_dir(state_name).await?;
        let name = file_name(key);
        let temp = dir.join(format!("{}.tmp", name));
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, dir.join(name)).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    records: DashMap<(String, String), Vec<u8>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, state_name: &str, key: &str) -> bool {
        self.records
            .contains_key(&(state_name.to_string(), key.to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self, state_name: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .records
            .get(&(state_name.to_string(), key.to_string()))
            .map(|r| r.clone()))
    }

    async fn write(&self, state_name: &str, key: &str, bytes: &[u8]) -> Result<()> {
        self.records
            .insert((state_name.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}

/// Typed view over one actor's durable record.
///
/// `state` starts as `T::default()` when nothing has been written yet;
/// `record_exists` tells the two cases apart.
pub struct PersistentState<T> {
    store: Arc<dyn StateStore>,
    state_name: &'static str,
    key: String,
    pub state: T,
    pub record_exists: bool,
}

impl<T> PersistentState<T>
where
    T: Serialize + DeserializeOwned + Default + Send,
{
    pub async fn load(store: Arc<dyn StateStore>, state_name: &'static str, key: &str) -> Result<Self> {
        let (state, record_exists) = match store.read(state_name, key).await? {
            Some(bytes) => (serde_json::from_slice(&bytes)?, true),
            None => (T::default(), false),
        };
        Ok(Self {
            store,
            state_name,
            key: key.to_string(),
            state,
            record_exists,
        })
    }

    pub async fn write(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.state)?;
        self.store.write(self.state_name, &self.key, &bytes).await?;
        self.record_exists = true;
        Ok(())
    }
}
