use pathtree_core::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("core error: {0}")]
    Core(#[from] pathtree_core::CoreError),
}
