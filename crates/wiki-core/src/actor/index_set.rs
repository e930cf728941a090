use super::runtime::{reject_reply, Actor, Envelope, Registry, Reply};
use super::state_store::PersistentState;
use crate::delta::{LinkDelta, TagDelta};
use crate::error::{Result, WikiError};
use crate::system::WikiSystem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::marker::PhantomData;

/// A delta as seen by one set-owning actor: who is joining or leaving,
/// and whether a given key is among the affected ones.
pub trait SetDelta: Clone + Send + Sync + 'static {
    fn member(&self) -> &str;
    fn adds(&self, key: &str) -> bool;
    fn removes(&self, key: &str) -> bool;
}

impl SetDelta for LinkDelta {
    fn member(&self) -> &str {
        &self.source_page_id
    }

    fn adds(&self, key: &str) -> bool {
        LinkDelta::adds(self, key)
    }

    fn removes(&self, key: &str) -> bool {
        LinkDelta::removes(self, key)
    }
}

impl SetDelta for TagDelta {
    fn member(&self) -> &str {
        &self.page_id
    }

    fn adds(&self, key: &str) -> bool {
        TagDelta::adds(self, key)
    }

    fn removes(&self, key: &str) -> bool {
        TagDelta::removes(self, key)
    }
}

/// One classification axis: backlinks per target, pages per tag, pages per
/// category. Each axis has its own actors, registry and durable records.
pub trait SetKind: Send + Sync + 'static {
    const KIND: &'static str;
    const STATE_NAME: &'static str;
    type Delta: SetDelta;

    fn registry(system: &WikiSystem) -> &Registry<IndexSetActor<Self>>
    where
        Self: Sized;
}

/// Source page ids linking to a target page.
pub struct Backlinks;

/// Page ids carrying a tag.
pub struct Tags;

/// Page ids filed under a category.
pub struct Categories;

impl SetKind for Backlinks {
    const KIND: &'static str = "backlink";
    const STATE_NAME: &'static str = "backlink";
    type Delta = LinkDelta;

    fn registry(system: &WikiSystem) -> &Registry<IndexSetActor<Self>> {
        &system.registries().backlinks
    }
}

impl SetKind for Tags {
    const KIND: &'static str = "tag";
    const STATE_NAME: &'static str = "tag";
    type Delta = TagDelta;

    fn registry(system: &WikiSystem) -> &Registry<IndexSetActor<Self>> {
        &system.registries().tags
    }
}

impl SetKind for Categories {
    const KIND: &'static str = "category";
    const STATE_NAME: &'static str = "category";
    type Delta = TagDelta;

    fn registry(system: &WikiSystem) -> &Registry<IndexSetActor<Self>> {
        &system.registries().categories
    }
}

pub type BacklinkActor = IndexSetActor<Backlinks>;
pub type TagActor = IndexSetActor<Tags>;
pub type CategoryActor = IndexSetActor<Categories>;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IndexSetState {
    pub members: BTreeSet<String>,
}

pub enum IndexSetMsg<D> {
    ApplyDelta { delta: D, reply: Reply<()> },
    GetMembers { reply: Reply<Vec<String>> },
}

impl<D: Send + 'static> Envelope for IndexSetMsg<D> {
    fn reject(self, error: WikiError) {
        match self {
            IndexSetMsg::ApplyDelta { reply, .. } => reject_reply(reply, error),
            IndexSetMsg::GetMembers { reply } => reject_reply(reply, error),
        }
    }
}

/// Owns the member set for one key of one axis.
pub struct IndexSetActor<K: SetKind> {
    key: String,
    state: PersistentState<IndexSetState>,
    _kind: PhantomData<K>,
}

impl<K: SetKind> IndexSetActor<K> {
    /// Set semantics make a repeated delta a no-op.
    async fn apply_delta(&mut self, delta: &K::Delta) -> Result<()> {
        let adds = delta.adds(&self.key);
        let removes = delta.removes(&self.key);
        if !adds && !removes {
            return Ok(());
        }

        let members = &mut self.state.state.members;
        if adds {
            members.insert(delta.member().to_string());
        }
        if removes {
            members.remove(delta.member());
        }
        tracing::debug!(
            "{} {}: {} (+{} -{}), {} members",
            K::KIND,
            self.key,
            delta.member(),
            adds,
            removes,
            members.len()
        );
        self.state.write().await
    }
}

#[async_trait]
impl<K: SetKind> Actor for IndexSetActor<K> {
    type Msg = IndexSetMsg<K::Delta>;
    const KIND: &'static str = K::KIND;

    async fn activate(key: &str, system: &WikiSystem) -> Result<Self> {
        let state = PersistentState::load(system.state_store(), K::STATE_NAME, key).await?;
        Ok(Self {
            key: key.to_string(),
            state,
            _kind: PhantomData,
        })
    }

    async fn handle(&mut self, msg: Self::Msg, _system: &WikiSystem) {
        match msg {
            IndexSetMsg::ApplyDelta { delta, reply } => {
                let _ = reply.send(self.apply_delta(&delta).await);
            }
            IndexSetMsg::GetMembers { reply } => {
                let members = self.state.state.members.iter().cloned().collect();
                let _ = reply.send(Ok(members));
            }
        }
    }
}

/// Address of one set-owning actor. Keys are lowercased so that
/// differently-cased spellings of a target or tag reach the same actor.
pub struct IndexSetRef<K: SetKind> {
    system: WikiSystem,
    key: String,
    _kind: PhantomData<K>,
}

pub type BacklinkRef = IndexSetRef<Backlinks>;
pub type TagRef = IndexSetRef<Tags>;
pub type CategoryRef = IndexSetRef<Categories>;

impl<K: SetKind> IndexSetRef<K> {
    pub(crate) fn new(system: WikiSystem, key: &str) -> Self {
        Self {
            system,
            key: key.trim().to_lowercase(),
            _kind: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn apply_delta(&self, delta: K::Delta) -> Result<()> {
        K::registry(&self.system)
            .ask(&self.system, &self.key, |reply| IndexSetMsg::ApplyDelta { delta, reply })
            .await
    }

    /// Members in ascending order.
    pub async fn members(&self) -> Result<Vec<String>> {
        K::registry(&self.system)
            .ask(&self.system, &self.key, |reply| IndexSetMsg::GetMembers { reply })
            .await
    }
}

impl BacklinkRef {
    pub async fn get_backlinks(&self) -> Result<Vec<String>> {
        self.members().await
    }
}

impl TagRef {
    pub async fn get_pages(&self) -> Result<Vec<String>> {
        self.members().await
    }
}

impl CategoryRef {
    pub async fn get_pages(&self) -> Result<Vec<String>> {
        self.members().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::state_store::{MemoryStateStore, StateStore};
    use std::sync::Arc;

    fn link(source: &str, added: &[&str], removed: &[&str]) -> LinkDelta {
        LinkDelta {
            source_page_id: source.into(),
            added_targets: added.iter().map(|s| s.to_string()).collect(),
            removed_targets: removed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn tagged(page: &str, added: &[&str], removed: &[&str]) -> TagDelta {
        TagDelta {
            page_id: page.into(),
            added_tags: added.iter().map(|s| s.to_string()).collect(),
            removed_tags: removed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn applying_a_delta_twice_equals_applying_it_once() {
        let system = WikiSystem::in_memory().unwrap();
        let target = system.backlinks("B");

        target.apply_delta(link("A", &["B"], &[])).await.unwrap();
        let once = target.get_backlinks().await.unwrap();
        target.apply_delta(link("A", &["B"], &[])).await.unwrap();
        let twice = target.get_backlinks().await.unwrap();

        assert_eq!(once, vec!["A".to_string()]);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn removal_drops_the_source() {
        let system = WikiSystem::in_memory().unwrap();
        let target = system.backlinks("B");

        target.apply_delta(link("A", &["B"], &[])).await.unwrap();
        target.apply_delta(link("C", &["B"], &[])).await.unwrap();
        target.apply_delta(link("A", &[], &["B"])).await.unwrap();

        assert_eq!(target.get_backlinks().await.unwrap(), vec!["C".to_string()]);
    }

    #[tokio::test]
    async fn delta_for_other_targets_is_ignored() {
        let system = WikiSystem::in_memory().unwrap();
        let target = system.backlinks("B");

        target.apply_delta(link("A", &["X"], &["Y"])).await.unwrap();
        assert!(target.get_backlinks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_are_case_insensitive() {
        let system = WikiSystem::in_memory().unwrap();

        system.backlinks("Hello").apply_delta(link("A", &["hello"], &[])).await.unwrap();
        assert_eq!(
            system.backlinks("HELLO").get_backlinks().await.unwrap(),
            vec!["A".to_string()]
        );
    }

    #[tokio::test]
    async fn tags_and_categories_are_separate_axes() {
        let system = WikiSystem::in_memory().unwrap();

        system.tag("rust").apply_delta(tagged("p1", &["Rust"], &[])).await.unwrap();
        system.category("rust").apply_delta(tagged("p2", &["rust"], &[])).await.unwrap();

        assert_eq!(system.tag("rust").get_pages().await.unwrap(), vec!["p1".to_string()]);
        assert_eq!(system.category("rust").get_pages().await.unwrap(), vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn members_survive_eviction() {
        let store = Arc::new(MemoryStateStore::new());
        let system = WikiSystem::builder()
            .state_store(store.clone() as Arc<dyn StateStore>)
            .idle_timeout_ms(30)
            .build()
            .unwrap();

        system.tag("garden").apply_delta(tagged("p1", &["garden"], &[])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(!system.registries().tags.is_active("garden"));
        assert!(store.contains("tag", "garden"));

        assert_eq!(system.tag("garden").get_pages().await.unwrap(), vec!["p1".to_string()]);
    }
}
