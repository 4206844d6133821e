use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Store-assigned row identifier of a tree node.
///
/// Always positive. The store reserves `0` in the parent column to mean
/// "no parent", which surfaces in Rust as `Option<NodeId>::None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct NodeId(i64);

impl NodeId {
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Decode the parent column, where `0` (or any non-positive value) means root.
    pub fn from_parent_column(raw: i64) -> Option<Self> {
        Self::new(raw)
    }

    /// Encode an optional parent for the parent column.
    pub fn to_parent_column(parent: Option<NodeId>) -> i64 {
        parent.map_or(0, |p| p.0)
    }
}

impl TryFrom<i64> for NodeId {
    type Error = CoreError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| CoreError::Serialization(format!("invalid node id: {raw}")))
    }
}

impl From<NodeId> for i64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| CoreError::Serialization(format!("invalid node id: {s:?}")))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
