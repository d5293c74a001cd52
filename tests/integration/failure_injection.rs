#![allow(missing_docs)]

use nestree::{MemoryStore, NestedSet, NodeRow, Phase, Placement, StoreError, TreeError};

struct Fixture {
    tree: NestedSet<MemoryStore>,
    root: NodeRow,
    a: NodeRow,
    b: NodeRow,
    c: NodeRow,
}

// root > a > a1, b > b1, c
fn fixture() -> Fixture {
    let mut tree = NestedSet::new(MemoryStore::new());
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    tree.append_to(a.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    tree.append_to(b.id).unwrap();
    let c = tree.append_to(root.id).unwrap();
    Fixture { tree, root, a, b, c }
}

fn assert_injected(err: TreeError) {
    assert!(
        matches!(err, TreeError::Store(StoreError::Injected(_))),
        "unexpected error: {err}"
    );
    assert_eq!(err.code(), "StoreFailure");
}

#[test]
fn failed_insert_rolls_back_every_shift() {
    for budget in 0..3 {
        let Fixture { mut tree, b, .. } = fixture();
        let before = tree.store().rows();
        tree.store_mut().fail_after_writes(budget);

        let err = tree.append_to(b.id).unwrap_err();

        assert_injected(err);
        assert_eq!(tree.store().rows(), before, "budget {budget}");
        assert!(!tree.store().in_transaction());
        assert_eq!(tree.phase(), Phase::Idle);
    }
}

#[test]
fn failed_move_rolls_back_partial_renumbering() {
    // a same-tree move issues five writes: two shift updates, one relocate, two closing updates
    for budget in 0..5 {
        let Fixture { mut tree, a, c, .. } = fixture();
        let before = tree.store().rows();
        tree.store_mut().fail_after_writes(budget);

        let err = tree.move_node(a.id, Placement::AppendTo, c.id).unwrap_err();

        assert_injected(err);
        assert_eq!(tree.store().rows(), before, "budget {budget}");
        assert_eq!(tree.phase(), Phase::Idle);
    }
}

#[test]
fn failed_delete_restores_removed_rows() {
    for budget in 0..3 {
        let Fixture { mut tree, root, b, .. } = fixture();
        let before = tree.store().rows();
        tree.store_mut().fail_after_writes(budget);

        let err = tree.delete_with_descendants(b.id).unwrap_err();

        assert_injected(err);
        assert_eq!(tree.store().rows(), before, "budget {budget}");
        assert_eq!(tree.node(root.id).unwrap().right, 12);
    }
}

#[test]
fn failed_root_creation_leaves_no_row() {
    for budget in 0..2 {
        let Fixture { mut tree, .. } = fixture();
        let before = tree.store().len();
        tree.store_mut().fail_after_writes(budget);

        let err = tree.make_root().unwrap_err();

        assert_injected(err);
        assert_eq!(tree.store().len(), before);
        assert_eq!(tree.roots().unwrap().len(), 1);
    }
}

#[test]
fn operations_succeed_once_fault_clears() {
    let Fixture { mut tree, a, c, .. } = fixture();
    tree.store_mut().fail_after_writes(1);
    assert!(tree.move_node(a.id, Placement::AppendTo, c.id).is_err());

    tree.store_mut().clear_faults();
    let moved = tree.move_node(a.id, Placement::AppendTo, c.id).unwrap();
    assert_eq!(moved.depth, 2);
    assert!(tree.verify().unwrap().success);
}
