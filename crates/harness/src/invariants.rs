use std::collections::HashMap;

use pathtree_core::{NodeId, PathCodec};
use pathtree_storage::{NodeRecord, SqliteStorage, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    PathMismatch {
        node: NodeId,
        stored: String,
        expected: String,
    },
    MissingParent {
        node: NodeId,
        parent: NodeId,
    },
}

/// Every live node whose stored path disagrees with its parent's stored path.
pub fn path_violations(storage: &SqliteStorage) -> Result<Vec<Violation>, StorageError> {
    let nodes = storage.scan_live()?;
    Ok(check(&nodes, storage.config().codec()))
}

fn check(nodes: &[NodeRecord], codec: PathCodec) -> Vec<Violation> {
    let paths: HashMap<NodeId, &str> = nodes.iter().map(|n| (n.id, n.path.as_str())).collect();
    let mut violations = Vec::new();
    for node in nodes {
        let parent_path = match node.parent_id {
            None => "",
            Some(parent) => match paths.get(&parent) {
                Some(path) => *path,
                None => {
                    violations.push(Violation::MissingParent { node: node.id, parent });
                    continue;
                }
            },
        };
        let expected = codec.build(parent_path, node.id);
        if node.path != expected {
            violations.push(Violation::PathMismatch {
                node: node.id,
                stored: node.path.clone(),
                expected,
            });
        }
    }
    violations
}
