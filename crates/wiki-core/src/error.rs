use thiserror::Error;

pub type Result<T> = std::result::Result<T, WikiError>;

#[derive(Error, Debug)]
pub enum WikiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    State(#[from] serde_json::Error),

    #[error("front matter error: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("search index error: {0}")]
    Search(String),

    /// The catalog already holds an entry for this page id.
    #[error("page {0} is already in the index")]
    DuplicateEntry(String),

    #[error("unknown page type: {0}")]
    InvalidPageType(String),

    /// The actor's mailbox closed or it dropped the reply before answering.
    #[error("{kind} actor {key} is unavailable")]
    ActorUnavailable { kind: &'static str, key: String },

    /// Activation could not load durable state. The message is kept as text
    /// because queued callers each receive their own copy.
    #[error("{kind} actor {key} failed to activate: {reason}")]
    Activation {
        kind: &'static str,
        key: String,
        reason: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<tantivy::TantivyError> for WikiError {
    fn from(e: tantivy::TantivyError) -> Self {
        WikiError::Search(e.to_string())
    }
}

impl From<tantivy::directory::error::OpenDirectoryError> for WikiError {
    fn from(e: tantivy::directory::error::OpenDirectoryError) -> Self {
        WikiError::Search(e.to_string())
    }
}
