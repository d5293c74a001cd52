//! Composable row predicates shared by queries and bulk updates.
//!
//! A [`Filter`] is a conjunction of column comparisons plus an optional
//! ordering and limit. Stores either evaluate it directly ([`Filter::matches`])
//! or lower it to their own query language.

use std::cmp::Ordering;

use crate::types::{NodeId, NodeRow, TreeId};

/// Interval columns addressable by predicates and assignments.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Column {
    /// Store-assigned identity.
    Id,
    /// Left bound.
    Left,
    /// Right bound.
    Right,
    /// Depth.
    Depth,
    /// Tree identifier.
    Tree,
}

impl Column {
    /// Reads the column from a row; `None` stands for a null tree identifier.
    pub fn read(self, row: &NodeRow) -> Option<i64> {
        match self {
            Column::Id => Some(row.id.0),
            Column::Left => Some(row.left),
            Column::Right => Some(row.right),
            Column::Depth => Some(row.depth),
            Column::Tree => row.tree.map(|t| t.0),
        }
    }
}

/// Comparison operators supported by the store contract.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    /// SQL spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    /// Literal value.
    Value(i64),
    /// Another column of the same row plus a constant offset.
    Column {
        /// Column read from the row.
        column: Column,
        /// Constant added to the column value.
        offset: i64,
    },
}

/// One `column op operand` term of a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Condition {
    /// Column on the left-hand side.
    pub column: Column,
    /// Comparison operator.
    pub op: CmpOp,
    /// Right-hand side.
    pub operand: Operand,
}

impl Condition {
    /// Evaluates the condition with SQL null semantics: any null side is false.
    pub fn matches(&self, row: &NodeRow) -> bool {
        let Some(lhs) = self.column.read(row) else {
            return false;
        };
        let rhs = match self.operand {
            Operand::Value(value) => value,
            Operand::Column { column, offset } => match column.read(row) {
                Some(value) => value + offset,
                None => return false,
            },
        };
        self.op.holds(lhs, rhs)
    }
}

/// Sort direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// One ordering key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OrderBy {
    /// Column to sort on.
    pub column: Column,
    /// Direction of the sort.
    pub direction: Direction,
}

/// Conjunction of conditions with optional ordering and limit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
    order: Vec<OrderBy>,
    limit: Option<usize>,
}

impl Filter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching a single identity.
    pub fn id(id: NodeId) -> Self {
        Self::all().eq(Column::Id, id.0)
    }

    fn push(mut self, column: Column, op: CmpOp, operand: Operand) -> Self {
        self.conditions.push(Condition {
            column,
            op,
            operand,
        });
        self
    }

    /// Adds `column = value`.
    pub fn eq(self, column: Column, value: i64) -> Self {
        self.push(column, CmpOp::Eq, Operand::Value(value))
    }

    /// Adds `column < value`.
    pub fn lt(self, column: Column, value: i64) -> Self {
        self.push(column, CmpOp::Lt, Operand::Value(value))
    }

    /// Adds `column <= value`.
    pub fn le(self, column: Column, value: i64) -> Self {
        self.push(column, CmpOp::Le, Operand::Value(value))
    }

    /// Adds `column > value`.
    pub fn gt(self, column: Column, value: i64) -> Self {
        self.push(column, CmpOp::Gt, Operand::Value(value))
    }

    /// Adds `column >= value`.
    pub fn ge(self, column: Column, value: i64) -> Self {
        self.push(column, CmpOp::Ge, Operand::Value(value))
    }

    /// Adds `column op other + offset`.
    pub fn cmp_column(self, column: Column, op: CmpOp, other: Column, offset: i64) -> Self {
        self.push(
            column,
            op,
            Operand::Column {
                column: other,
                offset,
            },
        )
    }

    /// Restricts to one tree when a tree identifier is present.
    pub fn in_tree(self, tree: Option<TreeId>) -> Self {
        match tree {
            Some(tree) => self.eq(Column::Tree, tree.0),
            None => self,
        }
    }

    /// Appends an ordering key.
    pub fn order_by(mut self, column: Column, direction: Direction) -> Self {
        self.order.push(OrderBy { column, direction });
        self
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Conjoins another filter's conditions; its ordering and limit win when set.
    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        if !other.order.is_empty() {
            self.order = other.order;
        }
        if other.limit.is_some() {
            self.limit = other.limit;
        }
        self
    }

    /// Conditions in insertion order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Ordering keys in priority order.
    pub fn ordering(&self) -> &[OrderBy] {
        &self.order
    }

    /// Row cap, if any.
    pub fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true when every condition holds for the row.
    pub fn matches(&self, row: &NodeRow) -> bool {
        self.conditions.iter().all(|cond| cond.matches(row))
    }

    /// Compares two rows by the ordering keys, breaking ties by identity.
    pub fn compare(&self, a: &NodeRow, b: &NodeRow) -> Ordering {
        for key in &self.order {
            // Option ordering puts nulls first, as SQLite does for ascending sorts.
            let ord = key.column.read(a).cmp(&key.column.read(b));
            let ord = match key.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }

    /// Filters, sorts and truncates an in-memory row set.
    pub fn select<'a, I>(&self, rows: I) -> Vec<NodeRow>
    where
        I: IntoIterator<Item = &'a NodeRow>,
    {
        let mut out: Vec<NodeRow> = rows.into_iter().filter(|r| self.matches(r)).copied().collect();
        out.sort_by(|a, b| self.compare(a, b));
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Change applied to one column of every matched row.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Change {
    /// Add a signed delta to the current value.
    Add(i64),
    /// Overwrite with a literal.
    Set(i64),
}

/// `column = change` term of a bulk update.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Assignment {
    /// Column being written.
    pub column: Column,
    /// How the column changes.
    pub change: Change,
}

impl Assignment {
    /// `column = column + delta`.
    pub fn add(column: Column, delta: i64) -> Self {
        Self {
            column,
            change: Change::Add(delta),
        }
    }

    /// `column = value`.
    pub fn set(column: Column, value: i64) -> Self {
        Self {
            column,
            change: Change::Set(value),
        }
    }

    /// Applies the change to an in-memory row.
    pub fn apply(&self, row: &mut NodeRow) {
        let next = |current: i64| match self.change {
            Change::Add(delta) => current + delta,
            Change::Set(value) => value,
        };
        match self.column {
            // identity is never rewritten
            Column::Id => {}
            Column::Left => row.left = next(row.left),
            Column::Right => row.right = next(row.right),
            Column::Depth => row.depth = next(row.depth),
            Column::Tree => {
                row.tree = match (self.change, row.tree) {
                    (Change::Set(value), _) => Some(TreeId(value)),
                    (Change::Add(delta), Some(tree)) => Some(TreeId(tree.0 + delta)),
                    (Change::Add(_), None) => None,
                }
            }
        }
    }
}

/// One store write produced by the tree algebra.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Write {
    /// Bulk update of every row matching the filter.
    Update {
        /// Column changes, evaluated against the row's pre-update values.
        assignments: Vec<Assignment>,
        /// Rows to touch.
        filter: Filter,
    },
    /// Removal of every row matching the filter.
    Delete(Filter),
}
