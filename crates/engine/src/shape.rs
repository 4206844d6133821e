//! Typed inputs for the write operations, validated before any store call.

use pathtree_core::{Attributes, NodeId};
use pathtree_storage::{NewNode, NodeChanges, NodeStore, StorageError};

use crate::error::EngineError;

pub const MAX_TITLE_CHARS: usize = 256;
pub const MAX_PATH_CHARS: usize = 2048;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddNode {
    /// `None` creates a root.
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub attributes: Attributes,
}

impl AddNode {
    pub fn root(title: impl Into<String>) -> Self {
        Self { parent_id: None, title: title.into(), attributes: Attributes::new() }
    }

    pub fn child(parent_id: NodeId, title: impl Into<String>) -> Self {
        Self { parent_id: Some(parent_id), title: title.into(), attributes: Attributes::new() }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        check_title(&self.title)?;
        check_attributes(&self.attributes)
    }

    pub(crate) fn into_new_node(self) -> NewNode {
        NewNode {
            parent_id: self.parent_id,
            title: self.title,
            attributes: self.attributes,
        }
    }
}

/// Non-structural edit. Parent and path are only changed by moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNode {
    pub id: NodeId,
    pub title: Option<String>,
    pub attributes: Option<Attributes>,
}

impl UpdateNode {
    pub fn new(id: NodeId) -> Self {
        Self { id, title: None, attributes: None }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.title.is_none() && self.attributes.is_none() {
            return Err(EngineError::Validation(format!("update of {} changes nothing", self.id)));
        }
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(attributes) = &self.attributes {
            check_attributes(attributes)?;
        }
        Ok(())
    }

    pub(crate) fn into_changes(self) -> NodeChanges {
        NodeChanges { title: self.title, attributes: self.attributes }
    }
}

fn check_title(title: &str) -> Result<(), EngineError> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("title is required".into()));
    }
    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(EngineError::Validation(format!(
            "title is {len} chars, limit is {MAX_TITLE_CHARS}"
        )));
    }
    Ok(())
}

fn check_attributes(attributes: &Attributes) -> Result<(), EngineError> {
    if attributes.keys().any(|k| k.trim().is_empty()) {
        return Err(EngineError::Validation("attribute keys must be non-empty".into()));
    }
    Ok(())
}

pub(crate) fn check_path_len(path: &str) -> Result<(), EngineError> {
    check_len(path.chars().count())
}

fn check_len(len: usize) -> Result<(), EngineError> {
    if len > MAX_PATH_CHARS {
        return Err(EngineError::PathTooLong { len, max: MAX_PATH_CHARS });
    }
    Ok(())
}

/// Longest path a cascade from `old_path` to `new_path` would write,
/// descendants included.
pub(crate) fn cascaded_path_len(
    store: &dyn NodeStore,
    old_path: &str,
    new_path: &str,
) -> Result<usize, StorageError> {
    let new_len = new_path.chars().count();
    if old_path.is_empty() {
        return Ok(new_len);
    }
    let longest = store.longest_path_within(old_path)?;
    Ok(new_len + longest.saturating_sub(old_path.chars().count()))
}

pub(crate) fn check_cascade_len(
    store: &dyn NodeStore,
    old_path: &str,
    new_path: &str,
) -> Result<(), EngineError> {
    check_len(cascaded_path_len(store, old_path, new_path)?)
}
