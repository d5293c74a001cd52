//! Read-side filters derived from a node's interval.
//!
//! Each constructor returns a [`Filter`] rather than rows so callers can add
//! conditions, change the limit, or hand it to any [`crate::IntervalStore`].
//! Every filter is confined to the node's tree when it has one.

use crate::filter::{CmpOp, Column, Direction, Filter};
use crate::types::NodeRow;

/// Nodes strictly inside `node`, at most `max_depth` levels below it.
pub fn descendants(node: &NodeRow, max_depth: Option<i64>) -> Filter {
    let filter = Filter::all()
        .gt(Column::Left, node.left)
        .lt(Column::Right, node.right);
    let filter = match max_depth {
        Some(levels) => filter.le(Column::Depth, node.depth + levels),
        None => filter,
    };
    filter
        .in_tree(node.tree)
        .order_by(Column::Left, Direction::Asc)
}

/// Direct children of `node`, in sibling order.
pub fn children(node: &NodeRow) -> Filter {
    descendants(node, Some(1))
}

/// Nodes enclosing `node`, at most `max_depth` levels above it, root first.
pub fn ancestors(node: &NodeRow, max_depth: Option<i64>) -> Filter {
    let filter = Filter::all()
        .lt(Column::Left, node.left)
        .gt(Column::Right, node.right);
    let filter = match max_depth {
        Some(levels) => filter.ge(Column::Depth, node.depth - levels),
        None => filter,
    };
    filter
        .in_tree(node.tree)
        .order_by(Column::Left, Direction::Asc)
}

/// The immediate parent of `node`.
///
/// Every ancestor's interval contains the parent's, so the parent has the
/// smallest right bound among them.
pub fn parent(node: &NodeRow) -> Filter {
    Filter::all()
        .lt(Column::Left, node.left)
        .gt(Column::Right, node.right)
        .in_tree(node.tree)
        .order_by(Column::Right, Direction::Asc)
        .limit(1)
}

/// The sibling ending right before `node` starts.
pub fn prev(node: &NodeRow) -> Filter {
    Filter::all()
        .eq(Column::Right, node.left - 1)
        .in_tree(node.tree)
}

/// The sibling starting right after `node` ends.
pub fn next(node: &NodeRow) -> Filter {
    Filter::all()
        .eq(Column::Left, node.right + 1)
        .in_tree(node.tree)
}

/// Leaf nodes inside `node`, in document order.
pub fn leaves(node: &NodeRow) -> Filter {
    descendants(node, None).and(leaf())
}

fn leaf() -> Filter {
    Filter::all().cmp_column(Column::Right, CmpOp::Eq, Column::Left, 1)
}

/// Every root in the store, by identity.
pub fn roots() -> Filter {
    Filter::all()
        .eq(Column::Left, 1)
        .order_by(Column::Id, Direction::Asc)
}

/// Every leaf in the store, grouped by tree and in document order.
pub fn all_leaves(forests: bool) -> Filter {
    let filter = leaf();
    let filter = if forests {
        filter.order_by(Column::Tree, Direction::Asc)
    } else {
        filter
    };
    filter.order_by(Column::Left, Direction::Asc)
}

/// Every row of the tree `node` belongs to, in document order.
pub fn whole_tree(node: &NodeRow) -> Filter {
    Filter::all()
        .in_tree(node.tree)
        .order_by(Column::Left, Direction::Asc)
}
