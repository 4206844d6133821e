use pathtree_core::{NodeId, PathCodec};
use pathtree_storage::{
    NewNode, NodeChanges, NodeRecord, NodeStore, SqliteStorage, StorageError, Store,
};

/// Write that [`FaultyStore`] fails on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    UpdatePath,
    UpdatePathPrefix,
}

/// SQLite storage that can be armed to fail a chosen write, for checking
/// that coordinated operations roll back completely.
pub struct FaultyStore {
    inner: SqliteStorage,
    fault: Option<Fault>,
}

impl FaultyStore {
    pub fn new(inner: SqliteStorage) -> Self {
        Self { inner, fault: None }
    }

    pub fn arm(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn disarm(&mut self) {
        self.fault = None;
    }

    pub fn inner(&self) -> &SqliteStorage {
        &self.inner
    }

    fn scope(&self) -> FaultyScope<'_> {
        FaultyScope { inner: &self.inner, fault: self.fault }
    }
}

struct FaultyScope<'a> {
    inner: &'a dyn NodeStore,
    fault: Option<Fault>,
}

impl FaultyScope<'_> {
    fn trip(&self, fault: Fault) -> Result<(), StorageError> {
        if self.fault == Some(fault) {
            return Err(StorageError::InvalidArgument(format!("injected {fault:?} failure")));
        }
        Ok(())
    }
}

impl NodeStore for FaultyScope<'_> {
    fn get_by_id(&self, id: NodeId) -> Result<NodeRecord, StorageError> {
        self.inner.get_by_id(id)
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, StorageError> {
        self.inner.get_by_ids(ids)
    }

    fn get_by_path_prefix(&self, prefix: &str) -> Result<Vec<NodeRecord>, StorageError> {
        self.inner.get_by_path_prefix(prefix)
    }

    fn longest_path_within(&self, prefix: &str) -> Result<usize, StorageError> {
        self.inner.longest_path_within(prefix)
    }

    fn insert(&self, node: &NewNode) -> Result<NodeId, StorageError> {
        self.inner.insert(node)
    }

    fn update_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), StorageError> {
        self.inner.update_parent(id, parent_id)
    }

    fn update_path(&self, id: NodeId, path: &str) -> Result<(), StorageError> {
        self.trip(Fault::UpdatePath)?;
        self.inner.update_path(id, path)
    }

    fn update_path_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<usize, StorageError> {
        self.trip(Fault::UpdatePathPrefix)?;
        self.inner.update_path_prefix(old_prefix, new_prefix)
    }

    fn update_fields(&self, id: NodeId, changes: &NodeChanges) -> Result<(), StorageError> {
        self.inner.update_fields(id, changes)
    }

    fn soft_delete(&self, id: NodeId) -> Result<(), StorageError> {
        self.inner.soft_delete(id)
    }
}

impl NodeStore for FaultyStore {
    fn get_by_id(&self, id: NodeId) -> Result<NodeRecord, StorageError> {
        self.scope().get_by_id(id)
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, StorageError> {
        self.scope().get_by_ids(ids)
    }

    fn get_by_path_prefix(&self, prefix: &str) -> Result<Vec<NodeRecord>, StorageError> {
        self.scope().get_by_path_prefix(prefix)
    }

    fn longest_path_within(&self, prefix: &str) -> Result<usize, StorageError> {
        self.scope().longest_path_within(prefix)
    }

    fn insert(&self, node: &NewNode) -> Result<NodeId, StorageError> {
        self.scope().insert(node)
    }

    fn update_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), StorageError> {
        self.scope().update_parent(id, parent_id)
    }

    fn update_path(&self, id: NodeId, path: &str) -> Result<(), StorageError> {
        self.scope().update_path(id, path)
    }

    fn update_path_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<usize, StorageError> {
        self.scope().update_path_prefix(old_prefix, new_prefix)
    }

    fn update_fields(&self, id: NodeId, changes: &NodeChanges) -> Result<(), StorageError> {
        self.scope().update_fields(id, changes)
    }

    fn soft_delete(&self, id: NodeId) -> Result<(), StorageError> {
        self.scope().soft_delete(id)
    }
}

impl Store for FaultyStore {
    fn codec(&self) -> PathCodec {
        self.inner.codec()
    }

    fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn NodeStore) -> Result<T, E>,
        E: From<StorageError>,
    {
        let fault = self.fault;
        self.inner
            .with_transaction(|tx| f(&FaultyScope { inner: tx, fault }))
    }
}
