use pathtree_core::{Attributes, NodeId, PathCodec};

use crate::error::StorageError;

/// A live (not soft-deleted) row of the node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub path: String,
    pub title: String,
    pub attributes: Attributes,
}

/// Columns written by the initial insert. The path is filled afterwards,
/// once the store has assigned the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNode {
    pub parent_id: Option<NodeId>,
    pub title: String,
    pub attributes: Attributes,
}

/// Non-structural column changes. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeChanges {
    pub title: Option<String>,
    pub attributes: Option<Attributes>,
}

impl NodeChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.attributes.is_none()
    }
}

/// Row-level access to the node table. Every read and write ignores
/// soft-deleted rows.
pub trait NodeStore {
    /// Fails with [`StorageError::NotFound`] when absent or soft-deleted.
    fn get_by_id(&self, id: NodeId) -> Result<NodeRecord, StorageError>;

    /// Missing ids are left out of the result. Order is unspecified.
    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, StorageError>;

    /// Rows whose path equals `prefix` or extends it past a delimiter.
    fn get_by_path_prefix(&self, prefix: &str) -> Result<Vec<NodeRecord>, StorageError>;

    /// Character length of the longest live path within `prefix`, or 0 when
    /// nothing matches.
    fn longest_path_within(&self, prefix: &str) -> Result<usize, StorageError>;

    fn insert(&self, node: &NewNode) -> Result<NodeId, StorageError>;

    fn update_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), StorageError>;

    fn update_path(&self, id: NodeId, path: &str) -> Result<(), StorageError>;

    /// Rewrite the leading `old_prefix` of every path within it to `new_prefix`
    /// in a single statement. Returns the number of rows rewritten.
    fn update_path_prefix(&self, old_prefix: &str, new_prefix: &str)
    -> Result<usize, StorageError>;

    /// Fails with [`StorageError::InvalidArgument`] when `changes` is empty.
    fn update_fields(&self, id: NodeId, changes: &NodeChanges) -> Result<(), StorageError>;

    fn soft_delete(&self, id: NodeId) -> Result<(), StorageError>;
}

/// A [`NodeStore`] that can scope several writes into one transaction.
pub trait Store: NodeStore {
    /// Codec for the delimiter this store bounds prefixes with.
    fn codec(&self) -> PathCodec;

    /// Run `f` against a view bound to a fresh transaction. `Ok` commits;
    /// `Err` or unwinding rolls every write back.
    fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn NodeStore) -> Result<T, E>,
        E: From<StorageError>;
}
