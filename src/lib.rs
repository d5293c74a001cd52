//! Nested-set hierarchies over a relational interval table.
//!
//! Every node stores a `(left, right)` interval and a depth; a node's subtree
//! is exactly the set of rows whose intervals nest inside its own. Reads are
//! single range scans; structural writes renumber intervals with a handful of
//! bulk updates inside one transaction. With forests enabled, each row also
//! carries the identity of its tree's root and every write is confined to it.
//!
//! [`NestedSet`] orchestrates mutations over any [`IntervalStore`]. Two stores
//! ship with the crate: [`MemoryStore`] and the SQLite-backed [`SqliteStore`].

#![warn(missing_docs)]

pub mod algebra;
pub mod filter;
pub mod query;
pub mod schema;
pub mod store;
pub mod tree;
pub mod types;
pub mod verify;

pub use schema::TreeSchema;
pub use store::{IntervalStore, MemoryStore, SqliteStore};
pub use tree::{NestedSet, Phase};
pub use types::{
    NodeId, NodeRow, Operation, Outcome, Placement, Result, StoreError, Subject, TreeError,
    TreeId, Violation,
};
pub use verify::{VerifyFinding, VerifyReport};
