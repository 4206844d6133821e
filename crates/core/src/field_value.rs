use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::ids::NodeId;

/// Opaque per-node attributes. Path maintenance never reads them.
pub type Attributes = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
    NodeRef(NodeId),
    Bytes(Vec<u8>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::NodeRef(a), Self::NodeRef(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

/// Encode attributes for the attributes blob column.
pub fn encode_attributes(attributes: &Attributes) -> Result<Vec<u8>, CoreError> {
    rmp_serde::to_vec(attributes).map_err(|e| CoreError::Serialization(e.to_string()))
}

/// Decode the attributes blob column. An empty blob is an empty map.
pub fn decode_attributes(bytes: &[u8]) -> Result<Attributes, CoreError> {
    if bytes.is_empty() {
        return Ok(Attributes::new());
    }
    rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}
