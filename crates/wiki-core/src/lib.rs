pub mod actor;
pub mod config;
pub mod content_store;
pub mod delta;
pub mod error;
pub mod id_gen;
pub mod link_parser;
pub mod markdown;
pub mod page;
pub mod search_index;
pub mod system;

pub use config::SystemConfig;
pub use error::{Result, WikiError};
pub use system::{WikiSystem, WikiSystemBuilder};
