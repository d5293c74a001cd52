#![allow(missing_docs)]

use nestree::{
    MemoryStore, NestedSet, NodeId, NodeRow, Placement, TreeError, TreeId, Violation,
};

fn forest() -> NestedSet<MemoryStore> {
    NestedSet::new(MemoryStore::new())
}

fn bounds(tree: &NestedSet<MemoryStore>, id: NodeId) -> (i64, i64, i64) {
    let row = tree.node(id).expect("node exists");
    (row.left, row.right, row.depth)
}

fn ids(rows: Vec<NodeRow>) -> Vec<NodeId> {
    rows.into_iter().map(|row| row.id).collect()
}

fn assert_consistent(tree: &NestedSet<MemoryStore>) {
    let report = tree.verify().expect("verify");
    assert!(report.success, "findings: {:?}", report.findings);
}

#[test]
fn single_insert_under_root() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let b = tree.append_to(root.id).unwrap();

    assert_eq!(bounds(&tree, root.id), (1, 4, 0));
    assert_eq!(bounds(&tree, b.id), (2, 3, 1));
    assert_consistent(&tree);
}

#[test]
fn sibling_insert_before() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    assert_eq!(bounds(&tree, root.id), (1, 6, 0));

    let c = tree.insert_before(b.id).unwrap();

    assert_eq!(bounds(&tree, root.id), (1, 8, 0));
    assert_eq!(bounds(&tree, a.id), (2, 3, 1));
    assert_eq!(bounds(&tree, c.id), (4, 5, 1));
    assert_eq!(bounds(&tree, b.id), (6, 7, 1));
    assert_eq!(ids(tree.children(root.id).unwrap()), vec![a.id, c.id, b.id]);
    assert_consistent(&tree);
}

#[test]
fn prepend_and_insert_after() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let first = tree.prepend_to(root.id).unwrap();
    let after = tree.insert_after(first.id).unwrap();

    assert_eq!(
        ids(tree.children(root.id).unwrap()),
        vec![first.id, after.id, a.id]
    );
    assert_eq!(bounds(&tree, first.id), (2, 3, 1));
    assert_eq!(bounds(&tree, after.id), (4, 5, 1));
    assert_eq!(bounds(&tree, a.id), (6, 7, 1));
    assert_consistent(&tree);
}

#[test]
fn append_round_trip() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let child = tree.append_to(root.id).unwrap();

    let fresh = tree.node(child.id).unwrap();
    let root = tree.node(root.id).unwrap();
    assert!(fresh.is_leaf());
    assert_eq!(fresh.depth, root.depth + 1);
    assert!(fresh.is_descendant_of(&root));
    assert_eq!(fresh.tree, root.tree);
}

#[test]
fn subtree_delete_closes_its_width() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    tree.append_to(b.id).unwrap();
    tree.append_to(b.id).unwrap();
    let c = tree.append_to(root.id).unwrap();

    let before_root = tree.node(root.id).unwrap();
    let before_c = tree.node(c.id).unwrap();
    let b_row = tree.node(b.id).unwrap();
    let rows_before = tree.store().len();

    let removed = tree.delete_with_descendants(b.id).unwrap();

    assert_eq!(removed as i64, b_row.size());
    assert_eq!(tree.store().len(), rows_before - removed);
    assert_eq!(tree.node(root.id).unwrap().right, before_root.right - b_row.width());
    let c_row = tree.node(c.id).unwrap();
    assert_eq!(c_row.left, before_c.left - b_row.width());
    assert_eq!(c_row.right, before_c.right - b_row.width());
    assert_eq!(bounds(&tree, a.id), (2, 3, 1));
    assert_consistent(&tree);
}

#[test]
fn delete_promotes_children() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let a1 = tree.append_to(a.id).unwrap();
    let a2 = tree.append_to(a.id).unwrap();
    let a21 = tree.append_to(a2.id).unwrap();
    let b = tree.append_to(root.id).unwrap();

    assert_eq!(tree.delete(a.id).unwrap(), 1);

    assert!(matches!(tree.node(a.id), Err(TreeError::NotFound(_))));
    assert_eq!(
        ids(tree.children(root.id).unwrap()),
        vec![a1.id, a2.id, b.id]
    );
    assert_eq!(bounds(&tree, a1.id), (2, 3, 1));
    assert_eq!(bounds(&tree, a2.id), (4, 7, 1));
    assert_eq!(bounds(&tree, a21.id), (5, 6, 2));
    assert_eq!(bounds(&tree, b.id), (8, 9, 1));
    assert_eq!(tree.parent(a21.id).unwrap().map(|r| r.id), Some(a2.id));
    assert_consistent(&tree);
}

#[test]
fn cross_tree_move_retags_subtree() {
    let mut tree = forest();
    let t1 = tree.make_root().unwrap();
    let keep = tree.append_to(t1.id).unwrap();
    let x = tree.append_to(t1.id).unwrap();
    let x1 = tree.append_to(x.id).unwrap();
    let tail = tree.append_to(t1.id).unwrap();
    let t2 = tree.make_root().unwrap();
    let y = tree.append_to(t2.id).unwrap();

    let size_before = tree.node(x.id).unwrap().size();
    let moved = tree.move_node(x.id, Placement::AppendTo, y.id).unwrap();

    let t2_tree = Some(TreeId::from(t2.id));
    assert_eq!(moved.tree, t2_tree);
    assert_eq!(tree.node(x1.id).unwrap().tree, t2_tree);
    assert_eq!(moved.size(), size_before);
    assert_eq!((moved.left, moved.right, moved.depth), (3, 6, 2));
    assert_eq!(bounds(&tree, x1.id), (4, 5, 3));
    assert_eq!(bounds(&tree, y.id), (2, 7, 1));
    assert_eq!(bounds(&tree, t2.id), (1, 8, 0));

    assert_eq!(bounds(&tree, t1.id), (1, 6, 0));
    assert_eq!(bounds(&tree, keep.id), (2, 3, 1));
    assert_eq!(bounds(&tree, tail.id), (4, 5, 1));
    assert_consistent(&tree);
}

#[test]
fn moves_within_a_tree_conserve_size() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let a1 = tree.append_to(a.id).unwrap();
    tree.append_to(a1.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    let c = tree.append_to(root.id).unwrap();

    let size = tree.node(a.id).unwrap().size();
    let placements = [
        (Placement::AppendTo, c.id),
        (Placement::InsertBefore, b.id),
        (Placement::PrependTo, b.id),
        (Placement::InsertAfter, c.id),
        (Placement::PrependTo, root.id),
    ];
    for (placement, target) in placements {
        let moved = tree.move_node(a.id, placement, target).unwrap();
        assert_eq!(moved.size(), size, "{placement:?} {target}");
        assert_consistent(&tree);
    }
    assert_eq!(ids(tree.children(root.id).unwrap()), vec![a.id, b.id, c.id]);
}

#[test]
fn forward_and_backward_sibling_moves() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    let c = tree.append_to(root.id).unwrap();

    tree.move_node(a.id, Placement::InsertAfter, c.id).unwrap();
    assert_eq!(ids(tree.children(root.id).unwrap()), vec![b.id, c.id, a.id]);

    tree.move_node(a.id, Placement::InsertBefore, b.id).unwrap();
    assert_eq!(ids(tree.children(root.id).unwrap()), vec![a.id, b.id, c.id]);
    assert_eq!(bounds(&tree, a.id), (2, 3, 1));
    assert_eq!(bounds(&tree, c.id), (6, 7, 1));
    assert_consistent(&tree);
}

#[test]
fn move_into_descendant_never_mutates() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let a1 = tree.append_to(a.id).unwrap();
    let a11 = tree.append_to(a1.id).unwrap();
    let before = tree.store().rows();

    for placement in [
        Placement::AppendTo,
        Placement::PrependTo,
        Placement::InsertBefore,
        Placement::InsertAfter,
    ] {
        for target in [a1.id, a11.id] {
            let err = tree.move_node(a.id, placement, target).unwrap_err();
            assert!(
                matches!(
                    err,
                    TreeError::ConstraintViolation(Violation::TargetIsDescendant)
                ),
                "{placement:?} onto {target}: {err}"
            );
            assert_eq!(tree.store().rows(), before);
        }
    }
}

#[test]
fn parent_is_immediate_at_every_depth() {
    let mut tree = forest();
    let mut chain = vec![tree.make_root().unwrap().id];
    for _ in 0..5 {
        let parent = *chain.last().unwrap();
        tree.append_to(parent).unwrap();
        let child = tree.append_to(parent).unwrap();
        chain.push(child.id);
    }
    for pair in chain.windows(2) {
        let parent = tree.parent(pair[1]).unwrap().map(|row| row.id);
        assert_eq!(parent, Some(pair[0]));
    }
    assert!(tree.parent(chain[0]).unwrap().is_none());
    assert_eq!(
        ids(tree.ancestors(chain[5], None).unwrap()),
        chain[..5].to_vec()
    );
    assert_eq!(
        ids(tree.ancestors(chain[5], Some(2)).unwrap()),
        chain[3..5].to_vec()
    );
}

#[test]
fn single_tree_rejects_second_root_and_keeps_null_tree() {
    let mut tree = NestedSet::new(MemoryStore::single_tree());
    let root = tree.make_root().unwrap();
    let child = tree.append_to(root.id).unwrap();
    assert_eq!(child.tree, None);

    let err = tree.make_root().unwrap_err();
    assert!(matches!(
        err,
        TreeError::ConstraintViolation(Violation::SecondRoot)
    ));
    assert_eq!(tree.roots().unwrap().len(), 1);
    assert_consistent(&tree);
}

#[test]
fn roots_and_leaves_across_forest() {
    let mut tree = forest();
    let r1 = tree.make_root().unwrap();
    let l1 = tree.append_to(r1.id).unwrap();
    let r2 = tree.make_root().unwrap();
    let mid = tree.append_to(r2.id).unwrap();
    let l2 = tree.append_to(mid.id).unwrap();

    assert_eq!(ids(tree.roots().unwrap()), vec![r1.id, r2.id]);
    assert_eq!(ids(tree.leaves(r2.id).unwrap()), vec![l2.id]);
    let all = tree
        .find(&nestree::query::all_leaves(true))
        .unwrap();
    assert_eq!(ids(all), vec![l1.id, l2.id]);
}

#[test]
fn subtree_promoted_to_root_and_moved_back() {
    let mut tree = forest();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let a1 = tree.append_to(a.id).unwrap();
    let b = tree.append_to(root.id).unwrap();

    let promoted = tree.move_to_root(a.id).unwrap();
    assert_eq!((promoted.left, promoted.right, promoted.depth), (1, 4, 0));
    assert_eq!(tree.node(a1.id).unwrap().tree, Some(TreeId::from(a.id)));
    assert_eq!(bounds(&tree, b.id), (2, 3, 1));
    assert_consistent(&tree);

    let back = tree.move_node(a.id, Placement::InsertBefore, b.id).unwrap();
    assert_eq!((back.left, back.right, back.depth), (2, 5, 1));
    assert_eq!(back.tree, Some(TreeId::from(root.id)));
    assert_eq!(bounds(&tree, a1.id), (3, 4, 2));
    assert_eq!(bounds(&tree, root.id), (1, 8, 0));
    assert_consistent(&tree);
}
