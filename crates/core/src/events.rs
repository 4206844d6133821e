use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "This row changed" notification. Carries identity only; handlers reload
/// current state from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub node_id: NodeId,
    pub operation: ChangeOperation,
}

impl ChangeEvent {
    pub fn inserted(node_id: NodeId) -> Self {
        Self { node_id, operation: ChangeOperation::Insert }
    }

    pub fn updated(node_id: NodeId) -> Self {
        Self { node_id, operation: ChangeOperation::Update }
    }
}
