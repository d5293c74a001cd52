#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use nestree::{NestedSet, NodeId, Placement, SqliteStore, TreeError, TreeId, TreeSchema, Violation};
use tempfile::TempDir;

fn setup_db(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.db"));
    (dir, path)
}

fn open(path: &Path, schema: TreeSchema) -> NestedSet<SqliteStore> {
    NestedSet::new(SqliteStore::open(path, schema).expect("open store"))
}

fn bounds(tree: &NestedSet<SqliteStore>, id: NodeId) -> (i64, i64, i64) {
    let row = tree.node(id).expect("node exists");
    (row.left, row.right, row.depth)
}

#[test]
fn state_survives_reopen() {
    let (_dir, path) = setup_db("reopen");
    let (root, a, b) = {
        let mut tree = open(&path, TreeSchema::default());
        let root = tree.make_root().unwrap();
        let a = tree.append_to(root.id).unwrap();
        let b = tree.insert_after(a.id).unwrap();
        (root.id, a.id, b.id)
    };

    let tree = open(&path, TreeSchema::default());
    assert_eq!(bounds(&tree, root), (1, 6, 0));
    assert_eq!(bounds(&tree, a), (2, 3, 1));
    assert_eq!(bounds(&tree, b), (4, 5, 1));
    assert_eq!(tree.node(b).unwrap().tree, Some(TreeId::from(root)));
    assert!(tree.verify().unwrap().success);
}

#[test]
fn custom_column_names_are_used() {
    let (_dir, path) = setup_db("custom");
    let schema = TreeSchema::new()
        .table("menu")
        .left("l")
        .right("r")
        .depth("lvl")
        .tree("root_id");
    let mut tree = open(&path, schema);
    let root = tree.make_root().unwrap();
    let child = tree.append_to(root.id).unwrap();

    let conn = tree.store().connection();
    let (l, r, lvl, root_id): (i64, i64, i64, i64) = conn
        .query_row(
            "SELECT l, r, lvl, root_id FROM menu WHERE id = ?1",
            [child.id.0],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!((l, r, lvl, root_id), (2, 3, 1, root.id.0));
}

#[test]
fn host_columns_are_left_alone() {
    let (_dir, path) = setup_db("host");
    let mut tree = open(&path, TreeSchema::default());
    tree.store()
        .connection()
        .execute_batch("ALTER TABLE \"tree\" ADD COLUMN name TEXT")
        .unwrap();
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    tree.store()
        .connection()
        .execute("UPDATE \"tree\" SET name = 'docs' WHERE id = ?1", [a.id.0])
        .unwrap();

    tree.prepend_to(root.id).unwrap();

    let name: String = tree
        .store()
        .connection()
        .query_row("SELECT name FROM \"tree\" WHERE id = ?1", [a.id.0], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "docs");
    assert_eq!(bounds(&tree, a.id), (4, 5, 1));
}

#[test]
fn cross_tree_move_in_sqlite() {
    let (_dir, path) = setup_db("cross");
    let mut tree = open(&path, TreeSchema::default());
    let t1 = tree.make_root().unwrap();
    let x = tree.append_to(t1.id).unwrap();
    let x1 = tree.append_to(x.id).unwrap();
    let t2 = tree.make_root().unwrap();

    tree.move_node(x.id, Placement::PrependTo, t2.id).unwrap();

    assert_eq!(bounds(&tree, t1.id), (1, 2, 0));
    assert_eq!(bounds(&tree, t2.id), (1, 6, 0));
    assert_eq!(bounds(&tree, x.id), (2, 5, 1));
    assert_eq!(bounds(&tree, x1.id), (3, 4, 2));
    assert_eq!(tree.node(x1.id).unwrap().tree, Some(TreeId::from(t2.id)));
    assert!(tree.verify().unwrap().success);
}

#[test]
fn rejected_move_leaves_file_untouched() {
    let (_dir, path) = setup_db("reject");
    let mut tree = open(&path, TreeSchema::default());
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    let a1 = tree.append_to(a.id).unwrap();

    let err = tree.move_node(a.id, Placement::AppendTo, a1.id).unwrap_err();
    assert!(matches!(
        err,
        TreeError::ConstraintViolation(Violation::TargetIsDescendant)
    ));
    assert!(tree.store().connection().is_autocommit());
    assert_eq!(bounds(&tree, a.id), (2, 5, 1));
    assert_eq!(bounds(&tree, a1.id), (3, 4, 2));
}

#[test]
fn single_tree_schema_in_sqlite() {
    let (_dir, path) = setup_db("single");
    let mut tree = open(&path, TreeSchema::default().single_tree());
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    tree.append_to(a.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    assert_eq!(root.tree, None);

    let err = tree.make_root().unwrap_err();
    assert!(matches!(
        err,
        TreeError::ConstraintViolation(Violation::SecondRoot)
    ));
    tree.move_node(b.id, Placement::PrependTo, a.id).unwrap();
    assert_eq!(bounds(&tree, b.id), (3, 4, 2));
    assert_eq!(tree.delete(a.id).unwrap(), 1);
    assert_eq!(tree.children(root.id).unwrap().len(), 2);
    assert!(tree.verify().unwrap().success);
}

#[test]
fn identities_are_not_reused_after_delete() {
    let (_dir, path) = setup_db("ids");
    let mut tree = open(&path, TreeSchema::default());
    let root = tree.make_root().unwrap();
    let a = tree.append_to(root.id).unwrap();
    tree.delete(a.id).unwrap();
    let b = tree.append_to(root.id).unwrap();
    assert!(b.id.0 > a.id.0);
}
