use super::runtime::{reject_reply, Actor, Envelope, Reply};
use crate::delta::LinkDelta;
use crate::error::{Result, WikiError};
use crate::system::WikiSystem;
use async_trait::async_trait;

/// The coordinator is a singleton addressed by this key.
pub const COORDINATOR_KEY: &str = "0";

pub enum CoordinatorMsg {
    ApplyDelta { delta: LinkDelta, reply: Reply<()> },
}

impl Envelope for CoordinatorMsg {
    fn reject(self, error: WikiError) {
        match self {
            CoordinatorMsg::ApplyDelta { reply, .. } => reject_reply(reply, error),
        }
    }
}

/// Fans one page's link delta out to the backlink actor of every target it
/// touches. Holds no state of its own.
pub struct LinkCoordinatorActor;

impl LinkCoordinatorActor {
    async fn fan_out(&self, delta: &LinkDelta, system: &WikiSystem) -> Result<()> {
        // Removals first, each awaited, so the first failure names its target.
        let targets = delta.removed_targets.iter().chain(delta.added_targets.iter());
        for target in targets {
            tracing::debug!("Forwarding link delta from {} to {}", delta.source_page_id, target);
            system.backlinks(target).apply_delta(delta.clone()).await.map_err(|e| {
                tracing::error!(
                    "Backlink update for {} from {} failed: {}",
                    target,
                    delta.source_page_id,
                    e
                );
                e
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl Actor for LinkCoordinatorActor {
    type Msg = CoordinatorMsg;
    const KIND: &'static str = "link-coordinator";

    async fn activate(_key: &str, _system: &WikiSystem) -> Result<Self> {
        Ok(LinkCoordinatorActor)
    }

    async fn handle(&mut self, msg: CoordinatorMsg, system: &WikiSystem) {
        match msg {
            CoordinatorMsg::ApplyDelta { delta, reply } => {
                let _ = reply.send(self.fan_out(&delta, system).await);
            }
        }
    }
}

pub struct LinkCoordinatorRef {
    system: WikiSystem,
}

impl LinkCoordinatorRef {
    pub(crate) fn new(system: WikiSystem) -> Self {
        Self { system }
    }

    pub async fn apply_delta(&self, delta: LinkDelta) -> Result<()> {
        self.system
            .registries()
            .coordinator
            .ask(&self.system, COORDINATOR_KEY, |reply| CoordinatorMsg::ApplyDelta { delta, reply })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_to_every_target() {
        let system = WikiSystem::in_memory().unwrap();
        let delta = LinkDelta {
            source_page_id: "A".into(),
            added_targets: vec!["B".into(), "C".into()],
            removed_targets: vec![],
        };
        system.coordinator().apply_delta(delta).await.unwrap();

        assert_eq!(system.backlinks("B").get_backlinks().await.unwrap(), vec!["A"]);
        assert_eq!(system.backlinks("C").get_backlinks().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn redelivery_is_harmless() {
        let system = WikiSystem::in_memory().unwrap();
        let add = LinkDelta {
            source_page_id: "A".into(),
            added_targets: vec!["B".into()],
            removed_targets: vec!["D".into()],
        };
        system.coordinator().apply_delta(add.clone()).await.unwrap();
        system.coordinator().apply_delta(add).await.unwrap();

        assert_eq!(system.backlinks("B").get_backlinks().await.unwrap(), vec!["A"]);
        assert!(system.backlinks("D").get_backlinks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_one_coordinator_is_ever_active() {
        let system = WikiSystem::in_memory().unwrap();
        for source in ["A", "B", "C"] {
            let delta = LinkDelta {
                source_page_id: source.into(),
                added_targets: vec!["T".into()],
                removed_targets: vec![],
            };
            system.coordinator().apply_delta(delta).await.unwrap();
        }
        assert_eq!(system.registries().coordinator.active(), 1);
        assert_eq!(
            system.backlinks("t").get_backlinks().await.unwrap(),
            vec!["A", "B", "C"]
        );
    }
}
