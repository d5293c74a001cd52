//! Identifiers, row shapes and error types shared across the crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Stable identity of a stored node, assigned by the store on insert.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct NodeId(pub i64);

/// Identifier of one tree inside a forest; the identity of that tree's root.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct TreeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for TreeId {
    fn from(id: NodeId) -> Self {
        TreeId(id.0)
    }
}

/// Interval state of a single stored node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NodeRow {
    /// Store-assigned identity.
    pub id: NodeId,
    /// Left bound of the interval.
    pub left: i64,
    /// Right bound of the interval.
    pub right: i64,
    /// Number of ancestors.
    pub depth: i64,
    /// Owning tree; always `None` in single-tree mode.
    pub tree: Option<TreeId>,
}

impl NodeRow {
    /// Returns true when the node has no descendants.
    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Returns true when the node starts its tree.
    pub fn is_root(&self) -> bool {
        self.left == 1
    }

    /// Returns true when `self` lies strictly inside `other` within the same tree.
    pub fn is_descendant_of(&self, other: &NodeRow) -> bool {
        self.left > other.left && self.right < other.right && self.tree == other.tree
    }

    /// Number of interval units spanned by the subtree rooted here.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Number of nodes in the subtree rooted here, this node included.
    pub fn size(&self) -> i64 {
        self.width() / 2
    }
}

/// Where a node is placed relative to a target node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// First child of the target.
    PrependTo,
    /// Last child of the target.
    AppendTo,
    /// Sibling immediately before the target.
    InsertBefore,
    /// Sibling immediately after the target.
    InsertAfter,
}

impl Placement {
    /// Returns true when the placement makes the node a sibling of the target.
    pub fn is_sibling(self) -> bool {
        matches!(self, Placement::InsertBefore | Placement::InsertAfter)
    }

    /// Name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::PrependTo => "prepend_to",
            Placement::AppendTo => "append_to",
            Placement::InsertBefore => "insert_before",
            Placement::InsertAfter => "insert_after",
        }
    }
}

/// A single structural operation, threaded explicitly through the orchestrator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Start a new tree with the acting node as its root.
    MakeRoot,
    /// Make the acting node the first child of the target.
    PrependTo(NodeId),
    /// Make the acting node the last child of the target.
    AppendTo(NodeId),
    /// Place the acting node immediately before the target.
    InsertBefore(NodeId),
    /// Place the acting node immediately after the target.
    InsertAfter(NodeId),
    /// Remove the acting node alone, promoting its children.
    Delete,
    /// Remove the acting node together with its subtree.
    DeleteWithDescendants,
}

impl Operation {
    /// Builds the operation for a placement relative to `target`.
    pub fn place(placement: Placement, target: NodeId) -> Self {
        match placement {
            Placement::PrependTo => Operation::PrependTo(target),
            Placement::AppendTo => Operation::AppendTo(target),
            Placement::InsertBefore => Operation::InsertBefore(target),
            Placement::InsertAfter => Operation::InsertAfter(target),
        }
    }

    /// Splits a placement operation into its placement and target.
    pub fn placement(self) -> Option<(Placement, NodeId)> {
        match self {
            Operation::PrependTo(t) => Some((Placement::PrependTo, t)),
            Operation::AppendTo(t) => Some((Placement::AppendTo, t)),
            Operation::InsertBefore(t) => Some((Placement::InsertBefore, t)),
            Operation::InsertAfter(t) => Some((Placement::InsertAfter, t)),
            Operation::MakeRoot | Operation::Delete | Operation::DeleteWithDescendants => None,
        }
    }

    /// Name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::MakeRoot => "make_root",
            Operation::Delete => "delete",
            Operation::DeleteWithDescendants => "delete_with_descendants",
            other => other
                .placement()
                .map(|(placement, _)| placement.as_str())
                .unwrap_or("unknown"),
        }
    }
}

/// Which node an operation acts on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Subject {
    /// A node that has no stored state yet.
    New,
    /// A node already persisted in the store.
    Existing(NodeId),
}

/// Result of a committed structural operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The acting node after the operation.
    Node(NodeRow),
    /// Number of rows removed by a delete.
    Removed(usize),
}

/// Constraint that rejected an operation before any write happened.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Target node has never been persisted.
    #[error("target node is not persisted")]
    TransientTarget,
    /// Acting node has never been persisted.
    #[error("acting node is not persisted")]
    TransientNode,
    /// Target is the acting node itself.
    #[error("target node is the acting node")]
    TargetIsSelf,
    /// Target lies inside the acting node's subtree.
    #[error("target node is a descendant of the acting node")]
    TargetIsDescendant,
    /// Sibling placement requested next to a root.
    #[error("target node is a root and cannot have siblings")]
    TargetIsRoot,
    /// A second root was requested while forests are disabled.
    #[error("a root already exists and forests are disabled")]
    SecondRoot,
    /// Retargeting an existing node as root while forests are disabled.
    #[error("moving a node to the root requires forests")]
    RootMoveWithoutForest,
    /// Retargeting a node that is already a root.
    #[error("node is already a root")]
    AlreadyRoot,
    /// The store returned no usable identity for a new row.
    #[error("store did not assign a usable identity")]
    MissingIdentity,
}

/// Errors raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite backend failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Commit or rollback issued outside a transaction.
    #[error("no transaction is active")]
    NoTransaction,
    /// Begin issued while a transaction is already open.
    #[error("a transaction is already active")]
    TransactionActive,
    /// Schema descriptor cannot be used against the store.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Fault injected by a test store.
    #[error("injected failure: {0}")]
    Injected(&'static str),
}

/// Error kinds surfaced by every public operation.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The requested operation is not supported in this form.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    /// A precondition rejected the operation.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] Violation),
    /// A row expected to exist was missing on re-read.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The store failed; the transaction was rolled back.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl TreeError {
    /// Returns a machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            TreeError::InvalidOperation(_) => "InvalidOperation",
            TreeError::ConstraintViolation(_) => "ConstraintViolation",
            TreeError::NotFound(_) => "NotFound",
            TreeError::Store(_) => "StoreFailure",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TreeError>;
