pub mod bus;
pub mod error;
pub mod repair;
pub mod shape;

pub use bus::{ChangeBus, LocalChangeBus, Subscription};
pub use error::{BusError, EngineError, RepairError};
pub use repair::{DrainFailure, DrainSummary, DriftRepairer, PathFix, RepairReport};
pub use shape::{AddNode, MAX_PATH_CHARS, MAX_TITLE_CHARS, UpdateNode};

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use pathtree_core::{ChangeEvent, CoreError, NodeId, PathCodec, TreeConfig};
use pathtree_storage::{NodeRecord, NodeStore, SqliteStorage, StorageError, Store};

use crate::shape::{check_cascade_len, check_path_len};

/// Coordinated writes and path-based reads over a node table.
///
/// Inserts and moves keep every live path equal to its parent's path plus the
/// node's own id. Each write runs in one store transaction; a failure at any
/// step leaves the table as it was.
pub struct TreeEngine<S: Store = SqliteStorage> {
    store: S,
    codec: PathCodec,
    bus: Option<Box<dyn ChangeBus>>,
}

impl TreeEngine<SqliteStorage> {
    pub fn open(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self, EngineError> {
        Ok(Self::new(SqliteStorage::open(path, config)?))
    }

    pub fn open_in_memory(config: TreeConfig) -> Result<Self, EngineError> {
        Ok(Self::new(SqliteStorage::open_in_memory(config)?))
    }
}

impl<S: Store> TreeEngine<S> {
    /// Paths are built with the store's own delimiter, so the engine and the
    /// store's prefix bounds always agree.
    pub fn new(store: S) -> Self {
        let codec = store.codec();
        Self { store, codec, bus: None }
    }

    /// Publish insert/update notifications to `bus` after each commit.
    pub fn with_bus(mut self, bus: impl ChangeBus + 'static) -> Self {
        self.bus = Some(Box::new(bus));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn codec(&self) -> PathCodec {
        self.codec
    }

    pub fn repairer(&self) -> DriftRepairer {
        DriftRepairer::new(self.codec)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a node and fill its path in the same transaction.
    pub fn add_node(&mut self, input: AddNode) -> Result<NodeId, EngineError> {
        input.validate()?;
        let codec = self.codec;
        let new_node = input.into_new_node();
        let (id, path) = self.store.with_transaction(|tx| -> Result<_, EngineError> {
            let parent_path = match new_node.parent_id {
                Some(parent_id) => require_parent(tx, parent_id)?.path,
                None => String::new(),
            };
            // The path embeds the id, which only exists after the insert.
            let id = tx.insert(&new_node)?;
            let path = codec.build(&parent_path, id);
            check_path_len(&path)?;
            tx.update_path(id, &path)?;
            Ok((id, path))
        })?;
        debug!(node = %id, %path, "inserted node");
        self.publish(ChangeEvent::inserted(id));
        Ok(id)
    }

    /// Reparent `id` and cascade the path change through its subtree.
    ///
    /// Moving under the node itself or one of its descendants is rejected
    /// with [`EngineError::CycleDetected`] before anything is written.
    pub fn move_node(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<(), EngineError> {
        let codec = self.codec;
        let (old_path, new_path) = self.store.with_transaction(|tx| -> Result<_, EngineError> {
            let lookup: Vec<NodeId> = std::iter::once(id).chain(new_parent).collect();
            let found = tx.get_by_ids(&lookup)?;
            let node = found
                .iter()
                .find(|n| n.id == id)
                .ok_or(EngineError::NodeNotFound(id))?;

            let parent_path = match new_parent {
                None => "",
                Some(parent_id) => {
                    if parent_id == id {
                        return Err(EngineError::CycleDetected { node: id, new_parent: parent_id });
                    }
                    let parent = found
                        .iter()
                        .find(|n| n.id == parent_id)
                        .ok_or(EngineError::ParentNotFound(parent_id))?;
                    if !node.path.is_empty() && codec.is_within(&parent.path, &node.path) {
                        return Err(EngineError::CycleDetected { node: id, new_parent: parent_id });
                    }
                    parent.path.as_str()
                }
            };
            let new_path = codec.build(parent_path, id);
            check_cascade_len(tx, &node.path, &new_path)?;

            tx.update_parent(id, new_parent)?;
            if node.path.is_empty() {
                tx.update_path(id, &new_path)?;
            } else if node.path != new_path {
                tx.update_path_prefix(&node.path, &new_path)?;
            }
            Ok((node.path.clone(), new_path))
        })?;
        debug!(node = %id, old = %old_path, new = %new_path, "moved node");
        self.publish(ChangeEvent::updated(id));
        Ok(())
    }

    /// Change title and/or attributes. Never touches parent or path.
    pub fn update_node(&mut self, input: UpdateNode) -> Result<(), EngineError> {
        input.validate()?;
        let id = input.id;
        self.store
            .update_fields(id, &input.into_changes())
            .map_err(|e| not_found_as(e, EngineError::NodeNotFound(id)))
    }

    /// Soft-delete one row. Children keep their parent pointer and path.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.store
            .soft_delete(id)
            .map_err(|e| not_found_as(e, EngineError::NodeNotFound(id)))?;
        debug!(node = %id, "soft-deleted node");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_node(&self, id: NodeId) -> Result<NodeRecord, EngineError> {
        self.store
            .get_by_id(id)
            .map_err(|e| not_found_as(e, EngineError::NodeNotFound(id)))
    }

    /// Every live node at or below `prefix`, in store order.
    pub fn get_subtree(&self, prefix: &str) -> Result<Vec<NodeRecord>, EngineError> {
        Ok(self.store.get_by_path_prefix(prefix)?)
    }

    /// [`Self::get_subtree`] in pre-order: parents first, siblings by id.
    /// A path that does not decode fails the whole query.
    pub fn get_subtree_sorted(&self, prefix: &str) -> Result<Vec<NodeRecord>, EngineError> {
        let mut keyed = self
            .get_subtree(prefix)?
            .into_iter()
            .map(|n| Ok((self.codec.split(&n.path)?, n)))
            .collect::<Result<Vec<_>, CoreError>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, n)| n).collect())
    }

    /// Live nodes named by `path`, root first. Ids that no longer resolve
    /// are skipped.
    pub fn get_ancestors(&self, path: &str) -> Result<Vec<NodeRecord>, EngineError> {
        let chain = self.codec.split(path)?;
        if chain.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id: HashMap<NodeId, NodeRecord> = self
            .store
            .get_by_ids(&chain)?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();
        Ok(chain.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    // ========================================================================
    // Drift repair
    // ========================================================================

    pub fn repair(&mut self, id: NodeId) -> Result<RepairReport, RepairError> {
        self.repairer().repair(&mut self.store, id)
    }

    pub fn drain_changes(&mut self, subscription: &Subscription) -> DrainSummary {
        self.repairer().drain(&mut self.store, subscription)
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(bus) = &self.bus
            && let Err(e) = bus.publish(event)
        {
            // The write is committed; a lost notification only delays repair.
            warn!(node = %event.node_id, operation = %event.operation, error = %e, "failed to publish change");
        }
    }
}

fn require_parent(store: &dyn NodeStore, id: NodeId) -> Result<NodeRecord, EngineError> {
    store
        .get_by_id(id)
        .map_err(|e| not_found_as(e, EngineError::ParentNotFound(id)))
}

fn not_found_as(e: StorageError, replacement: EngineError) -> EngineError {
    match e {
        StorageError::NotFound(_) => replacement,
        other => other.into(),
    }
}
