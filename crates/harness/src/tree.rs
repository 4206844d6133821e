use pathtree_core::{ChangeEvent, NodeId, TreeConfig};
use pathtree_engine::{
    AddNode, ChangeBus, DrainSummary, EngineError, LocalChangeBus, Subscription, TreeEngine,
};
use pathtree_storage::{NewNode, NodeRecord, NodeStore, StorageError};

use crate::invariants::{Violation, path_violations};

/// In-memory tree wired to a change bus, plus helpers for editing rows
/// behind the engine's back.
pub struct TestTree {
    pub engine: TreeEngine,
    pub bus: LocalChangeBus,
    pub changes: Subscription,
}

impl TestTree {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Result<Self, Box<dyn std::error::Error>> {
        crate::init_tracing();
        let bus = LocalChangeBus::new();
        let changes = bus.subscribe()?;
        let engine = TreeEngine::open_in_memory(config)?.with_bus(bus.clone());
        Ok(Self { engine, bus, changes })
    }

    pub fn add_root(&mut self, title: &str) -> Result<NodeId, EngineError> {
        self.engine.add_node(AddNode::root(title))
    }

    pub fn add_child(&mut self, parent: NodeId, title: &str) -> Result<NodeId, EngineError> {
        self.engine.add_node(AddNode::child(parent, title))
    }

    /// Nodes stacked one under the other, `len` deep, below `parent`.
    /// Returns their ids top down.
    pub fn add_chain(
        &mut self,
        parent: Option<NodeId>,
        len: usize,
    ) -> Result<Vec<NodeId>, EngineError> {
        let mut ids = Vec::with_capacity(len);
        let mut parent = parent;
        for depth in 0..len {
            let id = self.engine.add_node(AddNode {
                parent_id: parent,
                title: format!("level {depth}"),
                ..Default::default()
            })?;
            ids.push(id);
            parent = Some(id);
        }
        Ok(ids)
    }

    pub fn path_of(&self, id: NodeId) -> Result<String, EngineError> {
        Ok(self.engine.get_node(id)?.path)
    }

    /// Ids of a query result, sorted, for order-insensitive comparison.
    pub fn ids(nodes: &[NodeRecord]) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        ids.sort();
        ids
    }

    // ------------------------------------------------------------------------
    // Out-of-band edits: these bypass the engine and publish nothing.
    // ------------------------------------------------------------------------

    pub fn set_parent_raw(&self, id: NodeId, parent: Option<NodeId>) -> Result<(), StorageError> {
        self.engine.store().update_parent(id, parent)
    }

    pub fn set_path_raw(&self, id: NodeId, path: &str) -> Result<(), StorageError> {
        self.engine.store().update_path(id, path)
    }

    /// Insert a row without ever filling its path.
    pub fn insert_raw(&self, parent: Option<NodeId>, title: &str) -> Result<NodeId, StorageError> {
        self.engine.store().insert(&NewNode {
            parent_id: parent,
            title: title.to_string(),
            ..Default::default()
        })
    }

    /// Announce an out-of-band change the way an external writer would.
    pub fn notify(&self, id: NodeId) -> Result<(), Box<dyn std::error::Error>> {
        self.bus.publish(ChangeEvent::updated(id))?;
        Ok(())
    }

    /// Run the drift repairer over every queued notification.
    pub fn drain(&mut self) -> DrainSummary {
        self.engine.drain_changes(&self.changes)
    }

    /// Throw away queued notifications.
    pub fn discard_changes(&self) -> usize {
        self.changes.pending().count()
    }

    pub fn violations(&self) -> Result<Vec<Violation>, StorageError> {
        path_violations(self.engine.store())
    }

    pub fn assert_consistent(&self) {
        match self.violations() {
            Ok(v) => assert!(v.is_empty(), "path invariant violated: {v:?}"),
            Err(e) => panic!("could not scan tree: {e}"),
        }
    }
}
