//! Interval arithmetic behind every structural change.
//!
//! Everything here is pure: functions take the current interval state of the
//! rows involved and return the new interval of the acting node plus the
//! ordered [`Step`]s that renumber the rest of the tree. Preconditions such as
//! cycle prevention are checked by the caller before a plan is built.
//!
//! Steps must run in the order returned. Later steps select rows by their
//! already-shifted positions, so reordering "make room", the subtree
//! relocation and "close gap" corrupts the tree.

use crate::filter::{Assignment, Column, Filter, Write};
use crate::types::{NodeId, NodeRow, Placement, TreeId};

/// Interval units taken by a freshly created leaf.
pub const LEAF_WIDTH: i64 = 2;

/// Future left bound of a placed node and its depth relative to the target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InsertionPoint {
    /// Left bound the placed node (or subtree) will start at.
    pub value: i64,
    /// Added to the target's depth to obtain the placed node's depth.
    pub depth_offset: i64,
}

/// Interval assigned to a node being created.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NewBounds {
    /// Left bound.
    pub left: i64,
    /// Right bound.
    pub right: i64,
    /// Depth.
    pub depth: i64,
    /// Owning tree, copied from the target.
    pub tree: Option<TreeId>,
}

/// One renumbering step, lowered to store writes by [`Step::writes`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Every `left >= from` and every `right >= from` moves by `delta`.
    Shift {
        /// First interval value affected.
        from: i64,
        /// Signed displacement.
        delta: i64,
        /// Tree the shift is confined to.
        tree: Option<TreeId>,
    },
    /// Every row with `lo <= left` and `right <= hi` is translated.
    Relocate {
        /// Lowest left bound of the range.
        lo: i64,
        /// Highest right bound of the range.
        hi: i64,
        /// Tree the range is read from.
        tree: Option<TreeId>,
        /// Added to both bounds.
        offset: i64,
        /// Added to depth.
        depth_delta: i64,
        /// New tree identifier for every translated row.
        retag: Option<TreeId>,
    },
    /// Rows strictly inside `(lo, hi)` move up one level and one unit left.
    Promote {
        /// Left bound of the removed ancestor.
        lo: i64,
        /// Right bound of the removed ancestor.
        hi: i64,
        /// Tree of the removed ancestor.
        tree: Option<TreeId>,
    },
    /// Removes a single row.
    RemoveNode(NodeId),
    /// Removes every row with `lo <= left` and `right <= hi`.
    RemoveRange {
        /// Left bound of the removed subtree.
        lo: i64,
        /// Right bound of the removed subtree.
        hi: i64,
        /// Tree of the removed subtree.
        tree: Option<TreeId>,
    },
}

impl Step {
    /// Builds the `shiftFrom` primitive.
    pub fn shift(from: i64, delta: i64, tree: Option<TreeId>) -> Self {
        Step::Shift { from, delta, tree }
    }

    /// Lowers the step to store writes, in execution order.
    pub fn writes(&self) -> Vec<Write> {
        match *self {
            Step::Shift { delta: 0, .. } => Vec::new(),
            Step::Shift { from, delta, tree } => [Column::Left, Column::Right]
                .into_iter()
                .map(|column| Write::Update {
                    assignments: vec![Assignment::add(column, delta)],
                    filter: Filter::all().ge(column, from).in_tree(tree),
                })
                .collect(),
            Step::Relocate {
                lo,
                hi,
                tree,
                offset,
                depth_delta,
                retag,
            } => {
                let mut assignments = vec![
                    Assignment::add(Column::Left, offset),
                    Assignment::add(Column::Right, offset),
                    Assignment::add(Column::Depth, depth_delta),
                ];
                if let Some(retag) = retag {
                    assignments.push(Assignment::set(Column::Tree, retag.0));
                }
                vec![Write::Update {
                    assignments,
                    filter: subtree(lo, hi, tree),
                }]
            }
            Step::Promote { lo, hi, tree } => vec![Write::Update {
                assignments: vec![
                    Assignment::add(Column::Left, -1),
                    Assignment::add(Column::Right, -1),
                    Assignment::add(Column::Depth, -1),
                ],
                filter: Filter::all()
                    .gt(Column::Left, lo)
                    .lt(Column::Right, hi)
                    .in_tree(tree),
            }],
            Step::RemoveNode(id) => vec![Write::Delete(Filter::id(id))],
            Step::RemoveRange { lo, hi, tree } => vec![Write::Delete(subtree(lo, hi, tree))],
        }
    }
}

fn subtree(lo: i64, hi: i64, tree: Option<TreeId>) -> Filter {
    Filter::all()
        .ge(Column::Left, lo)
        .le(Column::Right, hi)
        .in_tree(tree)
}

/// Where a node placed relative to `target` begins, and at which depth.
pub fn insertion_point(placement: Placement, target: &NodeRow) -> InsertionPoint {
    match placement {
        Placement::PrependTo => InsertionPoint {
            value: target.left + 1,
            depth_offset: 1,
        },
        Placement::AppendTo => InsertionPoint {
            value: target.right,
            depth_offset: 1,
        },
        Placement::InsertBefore => InsertionPoint {
            value: target.left,
            depth_offset: 0,
        },
        Placement::InsertAfter => InsertionPoint {
            value: target.right + 1,
            depth_offset: 0,
        },
    }
}

/// Bounds of a brand-new root. Its tree identifier is its own identity,
/// known only after the row is stored.
pub fn new_root() -> NewBounds {
    NewBounds {
        left: 1,
        right: LEAF_WIDTH,
        depth: 0,
        tree: None,
    }
}

/// Plans the creation of a leaf placed relative to `target`.
pub fn plan_insert(placement: Placement, target: &NodeRow) -> (Vec<Step>, NewBounds) {
    let point = insertion_point(placement, target);
    let bounds = NewBounds {
        left: point.value,
        right: point.value + 1,
        depth: target.depth + point.depth_offset,
        tree: target.tree,
    };
    (
        vec![Step::shift(point.value, LEAF_WIDTH, target.tree)],
        bounds,
    )
}

/// Plans moving the subtree rooted at `subject` next to or under `target`.
///
/// Within one tree the room is made first, the captured bounds follow that
/// shift when it happened in front of the subtree, the subtree is translated
/// and the hole it left is closed. Across trees the destination is widened,
/// the subtree is translated and retagged, and the source tree is compacted.
pub fn plan_move(subject: &NodeRow, placement: Placement, target: &NodeRow) -> Vec<Step> {
    let point = insertion_point(placement, target);
    let width = subject.width();
    let depth_delta = target.depth + point.depth_offset - subject.depth;

    if subject.tree == target.tree {
        let (mut lo, mut hi) = (subject.left, subject.right);
        if lo >= point.value {
            lo += width;
            hi += width;
        }
        vec![
            Step::shift(point.value, width, subject.tree),
            Step::Relocate {
                lo,
                hi,
                tree: subject.tree,
                offset: point.value - lo,
                depth_delta,
                retag: None,
            },
            Step::shift(hi + 1, -width, subject.tree),
        ]
    } else {
        vec![
            Step::shift(point.value, width, target.tree),
            Step::Relocate {
                lo: subject.left,
                hi: subject.right,
                tree: subject.tree,
                offset: point.value - subject.left,
                depth_delta,
                retag: target.tree,
            },
            Step::shift(subject.right + 1, -width, subject.tree),
        ]
    }
}

/// Plans detaching the subtree rooted at `subject` into a tree of its own.
pub fn plan_move_to_root(subject: &NodeRow) -> Vec<Step> {
    vec![
        Step::Relocate {
            lo: subject.left,
            hi: subject.right,
            tree: subject.tree,
            offset: 1 - subject.left,
            depth_delta: -subject.depth,
            retag: Some(subject.id.into()),
        },
        Step::shift(subject.right + 1, -subject.width(), subject.tree),
    ]
}

/// Plans removing `subject`, alone or with its subtree.
///
/// A leaf or a whole subtree leaves a gap of its own width. An internal node
/// removed alone hands its children to its parent: they move up a level and
/// one unit left, and the remaining two-unit gap is closed.
pub fn plan_delete(subject: &NodeRow, with_descendants: bool) -> Vec<Step> {
    if with_descendants {
        return vec![
            Step::RemoveRange {
                lo: subject.left,
                hi: subject.right,
                tree: subject.tree,
            },
            Step::shift(subject.right + 1, -subject.width(), subject.tree),
        ];
    }
    if subject.is_leaf() {
        return vec![
            Step::RemoveNode(subject.id),
            Step::shift(subject.right + 1, -LEAF_WIDTH, subject.tree),
        ];
    }
    vec![
        Step::RemoveNode(subject.id),
        Step::Promote {
            lo: subject.left,
            hi: subject.right,
            tree: subject.tree,
        },
        Step::shift(subject.right + 1, -LEAF_WIDTH, subject.tree),
    ]
}
