use pathtree_core::{CoreError, NodeId};
use pathtree_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("path of {len} chars exceeds the {max} char limit")]
    PathTooLong { len: usize, max: usize },

    #[error("moving {node} under {new_parent} would create a cycle")]
    CycleDetected { node: NodeId, new_parent: NodeId },
}

/// Failure while self-healing one node. Never fatal to the subscriber.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node {node} points at missing parent {parent}")]
    OrphanedNode { node: NodeId, parent: NodeId },

    #[error("node {node} appears in the path of its own parent {parent}")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("repairing {node} would write a path of {len} chars, limit is {max}")]
    PathTooLong { node: NodeId, len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("change bus lock poisoned")]
    Poisoned,
}
