//! Self-healing of drifted paths.
//!
//! Rows can be edited without going through [`crate::TreeEngine`], leaving a
//! path that no longer matches the parent chain. The repairer reacts to a
//! change notification by recomputing the node's path from its parent's
//! stored path, cascading any correction through the subtree, and then
//! auditing the ancestor chain so a stale ancestor does not make the node
//! drift again on the next write.
//!
//! Each correction commits in its own transaction. A run over a consistent
//! tree writes nothing, so replaying notifications is always safe.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use pathtree_core::{ChangeEvent, NodeId, PathCodec};
use pathtree_storage::{NodeRecord, NodeStore, StorageError, Store};

use crate::bus::Subscription;
use crate::error::RepairError;
use crate::shape::{MAX_PATH_CHARS, cascaded_path_len};

/// One committed path correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFix {
    pub node_id: NodeId,
    pub old_path: String,
    pub new_path: String,
    /// Rows rewritten, the node itself included.
    pub rows: usize,
}

#[derive(Debug, Default)]
pub struct RepairReport {
    pub node: Option<PathFix>,
    pub ancestors: Vec<PathFix>,
    /// Ancestor repairs that failed after the node itself was fixed.
    pub failures: Vec<(NodeId, RepairError)>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.node.is_none() && self.ancestors.is_empty() && self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct DrainSummary {
    pub processed: usize,
    pub repaired: usize,
    pub failures: Vec<DrainFailure>,
}

/// A repair that failed while handling `event`. `node_id` is the node whose
/// repair failed, which is an ancestor when the audit tripped.
#[derive(Debug)]
pub struct DrainFailure {
    pub event: ChangeEvent,
    pub node_id: NodeId,
    pub error: RepairError,
}

#[derive(Debug, Clone, Copy)]
pub struct DriftRepairer {
    codec: PathCodec,
}

impl DriftRepairer {
    pub fn new(codec: PathCodec) -> Self {
        Self { codec }
    }

    pub fn handle<S: Store>(
        &self,
        store: &mut S,
        event: &ChangeEvent,
    ) -> Result<RepairReport, RepairError> {
        self.repair(store, event.node_id)
    }

    /// Handle every queued event. A failing event is logged and collected;
    /// it never stops the rest of the queue.
    pub fn drain<S: Store>(&self, store: &mut S, subscription: &Subscription) -> DrainSummary {
        let mut summary = DrainSummary::default();
        for event in subscription.pending() {
            summary.processed += 1;
            match self.handle(store, &event) {
                Ok(report) => {
                    if report.node.is_some() || !report.ancestors.is_empty() {
                        summary.repaired += 1;
                    }
                    summary.failures.extend(report.failures.into_iter().map(
                        |(node_id, error)| DrainFailure { event, node_id, error },
                    ));
                }
                Err(error) => {
                    warn!(node = %event.node_id, operation = %event.operation, error = %error, "drift repair failed");
                    summary.failures.push(DrainFailure { event, node_id: event.node_id, error });
                }
            }
        }
        summary
    }

    /// Bring `node_id` and any stale ancestor back in line with the parent chain.
    pub fn repair<S: Store>(
        &self,
        store: &mut S,
        node_id: NodeId,
    ) -> Result<RepairReport, RepairError> {
        let Some(fix) = self.repair_one(store, node_id)? else {
            return Ok(RepairReport::default());
        };
        info!(node = %node_id, old = %fix.old_path, new = %fix.new_path, rows = fix.rows, "repaired drifted path");

        let mut report = RepairReport { node: Some(fix), ..Default::default() };
        if let Err(e) = self.audit_ancestors(store, node_id, &mut report) {
            warn!(node = %node_id, error = %e, "ancestor audit failed");
            report.failures.push((node_id, e));
        }
        Ok(report)
    }

    /// Recompute one node's path from its parent's current stored path and
    /// cascade the difference. `None` when the stored path is already right.
    fn repair_one<S: Store>(
        &self,
        store: &mut S,
        id: NodeId,
    ) -> Result<Option<PathFix>, RepairError> {
        let codec = self.codec;
        store.with_transaction(|tx| -> Result<_, RepairError> {
            let node = tx.get_by_id(id).map_err(|e| match e {
                StorageError::NotFound(_) => RepairError::NodeNotFound(id),
                other => other.into(),
            })?;
            let parent_path = match node.parent_id {
                None => String::new(),
                Some(parent_id) => {
                    let parent = tx.get_by_id(parent_id).map_err(|e| match e {
                        StorageError::NotFound(_) => {
                            RepairError::OrphanedNode { node: id, parent: parent_id }
                        }
                        other => other.into(),
                    })?;
                    if parent_id == id || codec.split(&parent.path)?.contains(&id) {
                        return Err(RepairError::Cycle { node: id, parent: parent_id });
                    }
                    parent.path
                }
            };

            let new_path = codec.build(&parent_path, id);
            if new_path == node.path {
                return Ok(None);
            }
            let len = cascaded_path_len(tx, &node.path, &new_path)?;
            if len > MAX_PATH_CHARS {
                return Err(RepairError::PathTooLong { node: id, len, max: MAX_PATH_CHARS });
            }
            // A never-filled path has no prefix to cascade from.
            let rows = if node.path.is_empty() {
                tx.update_path(id, &new_path)?;
                1
            } else {
                tx.update_path_prefix(&node.path, &new_path)?
            };
            Ok(Some(PathFix { node_id: id, old_path: node.path, new_path, rows }))
        })
    }

    /// Check the ancestors named by the node's old and new paths, computing
    /// what each path should be from the parent pointers among them, and
    /// repair the stale ones root first.
    fn audit_ancestors<S: Store>(
        &self,
        store: &mut S,
        node_id: NodeId,
        report: &mut RepairReport,
    ) -> Result<(), RepairError> {
        let Some(fix) = &report.node else {
            return Ok(());
        };
        let mut chain = self.codec.split(&fix.old_path)?;
        for id in self.codec.split(&fix.new_path)? {
            if !chain.contains(&id) {
                chain.push(id);
            }
        }
        chain.retain(|id| *id != node_id);
        if chain.is_empty() {
            return Ok(());
        }

        let members: HashMap<NodeId, NodeRecord> = store
            .get_by_ids(&chain)?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();
        let outside: Vec<NodeId> = members
            .values()
            .filter_map(|n| n.parent_id)
            .filter(|p| !members.contains_key(p))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let outside_paths: HashMap<NodeId, String> = store
            .get_by_ids(&outside)?
            .into_iter()
            .map(|n| (n.id, n.path))
            .collect();

        let mut expected = ExpectedPaths {
            codec: self.codec,
            members: &members,
            outside_paths: &outside_paths,
            memo: HashMap::new(),
        };
        let mut candidates: Vec<(usize, NodeId)> = Vec::new();
        for member in members.values() {
            match expected.path_of(member.id, &mut HashSet::new()) {
                Some(path) if path == member.path => {}
                Some(path) => candidates.push((self.codec.depth(&path), member.id)),
                // Cycle or orphan among the ancestors; let the single-node
                // repair classify it.
                None => candidates.push((self.codec.depth(&member.path), member.id)),
            }
        }
        candidates.sort();

        for (_, id) in candidates {
            match self.repair_one(store, id) {
                Ok(Some(fix)) => {
                    info!(node = %id, old = %fix.old_path, new = %fix.new_path, rows = fix.rows, "repaired stale ancestor");
                    report.ancestors.push(fix);
                }
                // Already corrected by an earlier cascade in this audit.
                Ok(None) => {}
                Err(e) => {
                    warn!(node = %id, error = %e, "ancestor repair failed");
                    report.failures.push((id, e));
                }
            }
        }
        Ok(())
    }
}

/// Expected paths for an in-memory set of ancestors, derived from their
/// parent pointers. Parents outside the set contribute their stored path.
struct ExpectedPaths<'a> {
    codec: PathCodec,
    members: &'a HashMap<NodeId, NodeRecord>,
    outside_paths: &'a HashMap<NodeId, String>,
    memo: HashMap<NodeId, Option<String>>,
}

impl ExpectedPaths<'_> {
    fn path_of(&mut self, id: NodeId, visiting: &mut HashSet<NodeId>) -> Option<String> {
        if let Some(known) = self.memo.get(&id) {
            return known.clone();
        }
        if !visiting.insert(id) {
            return None;
        }
        let node = self.members.get(&id)?;
        let parent_path = match node.parent_id {
            None => Some(String::new()),
            Some(p) if self.members.contains_key(&p) => self.path_of(p, visiting),
            Some(p) => self.outside_paths.get(&p).cloned(),
        };
        let path = parent_path.map(|parent_path| self.codec.build(&parent_path, id));
        self.memo.insert(id, path.clone());
        path
    }
}
