use super::runtime::{reject_reply, Actor, Envelope, Reply};
use crate::error::{Result, WikiError};
use crate::system::WikiSystem;
use async_trait::async_trait;
use serde::Serialize;

/// A page together with the pages it links to and the pages linking to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNeighbors {
    pub center: String,
    pub outgoing: Vec<String>,
    pub incoming: Vec<String>,
}

pub enum GraphMsg {
    GetNeighbors { reply: Reply<GraphNeighbors> },
}

impl Envelope for GraphMsg {
    fn reject(self, error: WikiError) {
        match self {
            GraphMsg::GetNeighbors { reply } => reject_reply(reply, error),
        }
    }
}

/// Read-side aggregation for one page id.
pub struct GraphActor {
    page_id: String,
}

impl GraphActor {
    async fn neighbors(&self, system: &WikiSystem) -> Result<GraphNeighbors> {
        let page = system.page(&self.page_id);
        let backlinks = system.backlinks(&self.page_id);
        let (outgoing, incoming) =
            tokio::try_join!(page.get_outgoing_links(), backlinks.get_backlinks())?;
        Ok(GraphNeighbors {
            center: self.page_id.clone(),
            outgoing,
            incoming,
        })
    }
}

#[async_trait]
impl Actor for GraphActor {
    type Msg = GraphMsg;
    const KIND: &'static str = "graph";

    async fn activate(key: &str, _system: &WikiSystem) -> Result<Self> {
        Ok(GraphActor {
            page_id: key.to_string(),
        })
    }

    async fn handle(&mut self, msg: GraphMsg, system: &WikiSystem) {
        match msg {
            GraphMsg::GetNeighbors { reply } => {
                let _ = reply.send(self.neighbors(system).await);
            }
        }
    }
}

pub struct GraphRef {
    system: WikiSystem,
    page_id: String,
}

impl GraphRef {
    pub(crate) fn new(system: WikiSystem, page_id: &str) -> Self {
        Self {
            system,
            page_id: page_id.to_string(),
        }
    }

    pub async fn get_neighbors(&self) -> Result<GraphNeighbors> {
        self.system
            .registries()
            .graphs
            .ask(&self.system, &self.page_id, |reply| GraphMsg::GetNeighbors { reply })
            .await
    }
}
