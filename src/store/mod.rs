#![forbid(unsafe_code)]

//! Storage collaborators for interval rows.
//!
//! The orchestrator only needs point reads, predicate-driven bulk updates and
//! deletes, and an all-or-nothing transaction. [`IntervalStore`] captures that
//! contract; [`MemoryStore`] and [`SqliteStore`] implement it.

/// In-memory table with snapshot transactions and fault injection.
pub mod memory;

/// SQLite-backed table driven through `rusqlite`.
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::algebra::NewBounds;
use crate::filter::{Assignment, Filter, Write};
use crate::types::{NodeId, NodeRow, StoreError};

/// Result alias for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Interval store contract required by [`crate::NestedSet`].
///
/// Writes issued between [`begin`](Self::begin) and [`commit`](Self::commit)
/// must become visible together or not at all. Implementations must
/// serialise concurrent writers to the same tree; reads may observe any
/// committed snapshot.
pub trait IntervalStore {
    /// Returns true when rows carry a tree identifier.
    fn forests(&self) -> bool;

    /// Point read of the latest state of a row.
    fn get(&self, id: NodeId) -> StoreResult<Option<NodeRow>>;

    /// Rows matching the filter, honouring its ordering and limit.
    fn select(&self, filter: &Filter) -> StoreResult<Vec<NodeRow>>;

    /// Stores a new row and returns the identity the store assigned.
    fn insert(&mut self, bounds: &NewBounds) -> StoreResult<NodeId>;

    /// Applies every assignment to each row matching the filter.
    ///
    /// Assignments read the row's values from before this update.
    fn update(&mut self, assignments: &[Assignment], filter: &Filter) -> StoreResult<usize>;

    /// Removes every row matching the filter.
    fn delete(&mut self, filter: &Filter) -> StoreResult<usize>;

    /// Opens a transaction.
    fn begin(&mut self) -> StoreResult<()>;

    /// Makes the transaction's writes durable and visible.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards every write of the open transaction.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Executes one algebra write and returns the affected row count.
    fn apply(&mut self, write: &Write) -> StoreResult<usize> {
        match write {
            Write::Update {
                assignments,
                filter,
            } => self.update(assignments, filter),
            Write::Delete(filter) => self.delete(filter),
        }
    }
}
