use pathtree_core::{Attributes, ChangeEvent, FieldValue, NodeId, TreeConfig};
use pathtree_engine::{AddNode, EngineError, MAX_PATH_CHARS, TreeEngine, UpdateNode};
use pathtree_harness::{Fault, FaultyStore, TestTree};
use pathtree_storage::{NodeStore, SqliteStorage, StorageError};

fn faulty_engine(config: TreeConfig) -> Result<TreeEngine<FaultyStore>, StorageError> {
    Ok(TreeEngine::new(FaultyStore::new(SqliteStorage::open_in_memory(config)?)))
}

// ============================================================================
// Insert
// ============================================================================

#[test]
fn insert_fills_paths_from_the_parent_chain() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;
    let c = tree.add_child(b, "C")?;

    assert_eq!(tree.path_of(a)?, "/1");
    assert_eq!(tree.path_of(b)?, "/1/2");
    assert_eq!(tree.path_of(c)?, "/1/2/3");
    assert_eq!(tree.engine.get_node(c)?.parent_id, Some(b));
    tree.assert_consistent();
    Ok(())
}

#[test]
fn insert_keeps_attributes() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let mut attrs = Attributes::new();
    attrs.insert("icon".into(), FieldValue::Text("folder".into()));
    let id = tree.engine.add_node(AddNode::root("Docs").with_attributes(attrs.clone()))?;

    let node = tree.engine.get_node(id)?;
    assert_eq!(node.title, "Docs");
    assert_eq!(node.attributes, attrs);
    Ok(())
}

#[test]
fn insert_under_missing_parent_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let ghost = NodeId::new(41).unwrap();
    match tree.add_child(ghost, "orphan") {
        Err(EngineError::ParentNotFound(id)) => assert_eq!(id, ghost),
        other => panic!("expected ParentNotFound, got {other:?}"),
    }
    assert!(tree.engine.store().scan_live()?.is_empty());
    Ok(())
}

#[test]
fn insert_under_soft_deleted_parent_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    tree.engine.delete_node(a)?;
    assert!(matches!(tree.add_child(a, "B"), Err(EngineError::ParentNotFound(_))));
    Ok(())
}

#[test]
fn insert_validation_happens_before_any_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    assert!(matches!(tree.add_root("   "), Err(EngineError::Validation(_))));
    assert!(tree.engine.store().scan_live()?.is_empty());
    assert_eq!(tree.discard_changes(), 0);
    Ok(())
}

#[test]
fn insert_publishes_after_commit() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    assert_eq!(tree.changes.try_next(), Some(ChangeEvent::inserted(a)));
    assert_eq!(tree.changes.try_next(), None);
    Ok(())
}

#[test]
fn failed_path_fill_leaves_no_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = faulty_engine(TreeConfig::default())?;
    let a = engine.add_node(AddNode::root("A"))?;

    engine.store_mut().arm(Fault::UpdatePath);
    let err = engine.add_node(AddNode::child(a, "B")).unwrap_err();
    assert!(matches!(err, EngineError::Storage(StorageError::InvalidArgument(_))));

    let rows = engine.store().inner().scan_live()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, a);
    Ok(())
}

// ============================================================================
// Move
// ============================================================================

#[test]
fn move_to_root_cascades_to_descendants() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;
    let c = tree.add_child(b, "C")?;

    tree.engine.move_node(b, None)?;

    assert_eq!(tree.path_of(a)?, "/1");
    assert_eq!(tree.path_of(b)?, "/2");
    assert_eq!(tree.path_of(c)?, "/2/3");
    assert_eq!(tree.engine.get_node(b)?.parent_id, None);
    tree.assert_consistent();

    assert_eq!(TestTree::ids(&tree.engine.get_subtree("/1")?), vec![a]);
    assert_eq!(TestTree::ids(&tree.engine.get_subtree("/2")?), vec![b, c]);
    Ok(())
}

#[test]
fn move_rewrites_exactly_the_moved_subtree() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let root = tree.add_root("root")?;
    let left = tree.add_child(root, "left")?;
    let right = tree.add_child(root, "right")?;
    let l1 = tree.add_child(left, "l1")?;
    let l2 = tree.add_child(left, "l2")?;
    let l1a = tree.add_child(l1, "l1a")?;
    let r1 = tree.add_child(right, "r1")?;

    let before = tree.engine.store().scan_live()?;
    let old_prefix = tree.path_of(left)?;
    tree.engine.move_node(left, Some(r1))?;
    let new_prefix = tree.path_of(left)?;
    assert_eq!(new_prefix, format!("{}/{}", tree.path_of(r1)?, left));

    let codec = tree.engine.codec();
    let moved = [left, l1, l2, l1a];
    for old in &before {
        let now = tree.engine.get_node(old.id)?;
        if moved.contains(&old.id) {
            let expected = codec.rebase(&old.path, &old_prefix, &new_prefix).unwrap();
            assert_eq!(now.path, expected, "descendant {} not rebased", old.id);
        } else {
            assert_eq!(now.path, old.path, "node {} outside the subtree changed", old.id);
        }
    }
    tree.assert_consistent();
    Ok(())
}

#[test]
fn move_to_same_parent_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;
    tree.discard_changes();

    let before = tree.engine.store().scan_live()?;
    tree.engine.move_node(b, Some(a))?;
    assert_eq!(tree.engine.store().scan_live()?, before);
    assert_eq!(tree.changes.try_next(), Some(ChangeEvent::updated(b)));
    Ok(())
}

#[test]
fn move_under_own_descendant_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;
    let c = tree.add_child(b, "C")?;
    let before = tree.engine.store().scan_live()?;

    match tree.engine.move_node(a, Some(c)) {
        Err(EngineError::CycleDetected { node, new_parent }) => {
            assert_eq!(node, a);
            assert_eq!(new_parent, c);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    assert!(matches!(
        tree.engine.move_node(b, Some(b)),
        Err(EngineError::CycleDetected { .. })
    ));
    assert_eq!(tree.engine.store().scan_live()?, before);
    Ok(())
}

#[test]
fn move_next_to_a_lookalike_path_is_allowed() -> Result<(), Box<dyn std::error::Error>> {
    // "/1/30" shares a textual prefix with "/1/3" but is not inside it.
    let mut tree = TestTree::new()?;
    let root = tree.add_root("root")?;
    for i in 0..29 {
        tree.add_child(root, &format!("child {i}"))?;
    }
    let three = NodeId::new(3).unwrap();
    let thirty = NodeId::new(30).unwrap();
    assert_eq!(tree.path_of(thirty)?, "/1/30");

    tree.engine.move_node(three, Some(thirty))?;
    assert_eq!(tree.path_of(three)?, "/1/30/3");
    tree.assert_consistent();
    Ok(())
}

#[test]
fn move_of_missing_node_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let ghost = NodeId::new(77).unwrap();
    assert!(matches!(
        tree.engine.move_node(ghost, Some(a)),
        Err(EngineError::NodeNotFound(id)) if id == ghost
    ));
    Ok(())
}

#[test]
fn move_to_missing_parent_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;
    let gone = tree.add_root("gone")?;
    tree.engine.delete_node(gone)?;

    assert!(matches!(
        tree.engine.move_node(b, Some(gone)),
        Err(EngineError::ParentNotFound(id)) if id == gone
    ));
    let node = tree.engine.get_node(b)?;
    assert_eq!(node.parent_id, Some(a));
    assert_eq!(node.path, "/1/2");
    Ok(())
}

#[test]
fn failed_cascade_rolls_back_the_parent_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = faulty_engine(TreeConfig::default())?;
    let a = engine.add_node(AddNode::root("A"))?;
    let b = engine.add_node(AddNode::child(a, "B"))?;
    let c = engine.add_node(AddNode::child(b, "C"))?;
    let before = engine.store().inner().scan_live()?;

    engine.store_mut().arm(Fault::UpdatePathPrefix);
    assert!(engine.move_node(b, None).is_err());
    assert_eq!(engine.store().inner().scan_live()?, before);
    assert_eq!(engine.get_node(b)?.parent_id, Some(a));

    engine.store_mut().disarm();
    engine.move_node(b, None)?;
    assert_eq!(engine.get_node(c)?.path, "/2/3");
    Ok(())
}

// ============================================================================
// Path length limit
// ============================================================================

#[test]
fn insert_past_the_path_limit_leaves_no_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    // Ids 1..=539 stacked in one branch put the deepest path at exactly 2048 chars.
    let chain = tree.add_chain(None, 539)?;
    let deepest = *chain.last().unwrap();
    assert_eq!(tree.path_of(deepest)?.len(), MAX_PATH_CHARS);
    tree.discard_changes();

    match tree.add_child(deepest, "too deep") {
        Err(EngineError::PathTooLong { len, max }) => {
            assert_eq!(len, MAX_PATH_CHARS + 4);
            assert_eq!(max, MAX_PATH_CHARS);
        }
        other => panic!("expected PathTooLong, got {other:?}"),
    }
    assert_eq!(tree.engine.store().scan_live()?.len(), 539);
    assert_eq!(tree.discard_changes(), 0);
    tree.assert_consistent();
    Ok(())
}

#[test]
fn move_that_overflows_a_descendant_path_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    // Leaf paths: "/1/2/.../300" is 1092 chars, "/301/.../600" is 1200 chars.
    let left = tree.add_chain(None, 300)?;
    let right = tree.add_chain(None, 300)?;
    let before = tree.engine.store().scan_live()?;

    // The moved root alone would fit; its deepest descendant would not.
    match tree.engine.move_node(left[0], Some(right[299])) {
        Err(EngineError::PathTooLong { len, max }) => {
            assert_eq!(len, 1200 + 1092);
            assert_eq!(max, MAX_PATH_CHARS);
        }
        other => panic!("expected PathTooLong, got {other:?}"),
    }
    assert_eq!(tree.engine.store().scan_live()?, before);

    tree.engine.move_node(left[0], Some(right[0]))?;
    assert_eq!(tree.path_of(left[299])?.len(), "/301".len() + 1092);
    tree.assert_consistent();
    Ok(())
}

#[test]
fn engine_builds_paths_with_the_store_delimiter() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TreeConfig::default();
    config.delimiter = '.';
    let mut engine = faulty_engine(config)?;
    let a = engine.add_node(AddNode::root("A"))?;
    let b = engine.add_node(AddNode::child(a, "B"))?;

    assert_eq!(engine.codec().delimiter(), '.');
    assert_eq!(engine.get_node(b)?.path, ".1.2");
    assert_eq!(engine.get_subtree(".1")?.len(), 2);
    Ok(())
}

// ============================================================================
// Update / delete
// ============================================================================

#[test]
fn update_changes_title_but_not_structure() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_child(a, "B")?;

    tree.engine.update_node(UpdateNode::new(b).title("Renamed"))?;
    let node = tree.engine.get_node(b)?;
    assert_eq!(node.title, "Renamed");
    assert_eq!(node.path, "/1/2");
    assert_eq!(node.parent_id, Some(a));

    let ghost = NodeId::new(9).unwrap();
    assert!(matches!(
        tree.engine.update_node(UpdateNode::new(ghost).title("x")),
        Err(EngineError::NodeNotFound(_))
    ));
    Ok(())
}

#[test]
fn delete_hides_the_node_and_keeps_its_id_retired() -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = TestTree::new()?;
    let a = tree.add_root("A")?;
    let b = tree.add_root("B")?;
    tree.engine.delete_node(b)?;

    assert!(matches!(tree.engine.get_node(b), Err(EngineError::NodeNotFound(_))));
    assert!(matches!(tree.engine.delete_node(b), Err(EngineError::NodeNotFound(_))));
    let c = tree.add_root("C")?;
    assert!(c > b, "ids must not be reused");
    assert_eq!(TestTree::ids(&tree.engine.get_subtree("")?), vec![a, c]);
    Ok(())
}

#[test]
fn file_backed_engine_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("tree.db");
    let (b, c) = {
        let mut engine = TreeEngine::open(&db, TreeConfig::default())?;
        let a = engine.add_node(AddNode::root("A"))?;
        let b = engine.add_node(AddNode::child(a, "B"))?;
        let c = engine.add_node(AddNode::child(b, "C"))?;
        engine.move_node(b, None)?;
        (b, c)
    };
    let engine = TreeEngine::open(&db, TreeConfig::default())?;
    assert_eq!(engine.get_node(b)?.path, "/2");
    assert_eq!(engine.get_node(c)?.path, "/2/3");
    Ok(())
}
