pub mod coordinator;
pub mod graph;
pub mod index_set;
pub mod page;
pub mod page_index;
pub mod runtime;
pub mod state_store;

pub use coordinator::{LinkCoordinatorActor, LinkCoordinatorRef, COORDINATOR_KEY};
pub use graph::{GraphActor, GraphNeighbors, GraphRef};
pub use index_set::{BacklinkActor, BacklinkRef, CategoryActor, CategoryRef, TagActor, TagRef};
pub use page::{PageActor, PageActorState, PageRef};
pub use page_index::{CatalogPhase, CatalogSnapshot, PageCounts, PageIndexActor, PageIndexEntry, PageIndexRef, CATALOG_KEY};
pub use runtime::{Actor, Envelope, Registry, Reply};
pub use state_store::{FileStateStore, MemoryStateStore, PersistentState, StateStore};
