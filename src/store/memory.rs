use std::collections::BTreeMap;

use tracing::debug;

use super::{IntervalStore, StoreResult};
use crate::algebra::NewBounds;
use crate::filter::{Assignment, Filter};
use crate::types::{NodeId, NodeRow, StoreError};

#[derive(Clone, Debug)]
struct Table {
    rows: BTreeMap<NodeId, NodeRow>,
    next_id: i64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Interval table held in memory.
///
/// `begin` snapshots the table and `rollback` restores the snapshot, so a
/// failed operation leaves no trace. Identities are handed out from a counter
/// that is never reused, matching an autoincrement key.
#[derive(Debug)]
pub struct MemoryStore {
    table: Table,
    snapshot: Option<Table>,
    forests: bool,
    write_budget: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with forests enabled.
    pub fn new() -> Self {
        Self {
            table: Table::default(),
            snapshot: None,
            forests: true,
            write_budget: None,
        }
    }

    /// Empty store holding at most one tree.
    pub fn single_tree() -> Self {
        Self {
            forests: false,
            ..Self::new()
        }
    }

    /// Lets `writes` more writes succeed, then fails every later write.
    pub fn fail_after_writes(&mut self, writes: usize) {
        self.write_budget = Some(writes);
    }

    /// Removes any injected fault.
    pub fn clear_faults(&mut self) {
        self.write_budget = None;
    }

    /// Every row currently visible, ordered by identity.
    pub fn rows(&self) -> Vec<NodeRow> {
        self.table.rows.values().copied().collect()
    }

    /// Number of rows currently visible.
    pub fn len(&self) -> usize {
        self.table.rows.len()
    }

    /// Returns true when no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.table.rows.is_empty()
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn charge_write(&mut self) -> StoreResult<()> {
        match self.write_budget.as_mut() {
            Some(0) => {
                debug!("store.memory.injected_failure");
                Err(StoreError::Injected("write budget exhausted"))
            }
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl IntervalStore for MemoryStore {
    fn forests(&self) -> bool {
        self.forests
    }

    fn get(&self, id: NodeId) -> StoreResult<Option<NodeRow>> {
        Ok(self.table.rows.get(&id).copied())
    }

    fn select(&self, filter: &Filter) -> StoreResult<Vec<NodeRow>> {
        Ok(filter.select(self.table.rows.values()))
    }

    fn insert(&mut self, bounds: &NewBounds) -> StoreResult<NodeId> {
        self.charge_write()?;
        let id = NodeId(self.table.next_id);
        self.table.next_id += 1;
        let tree = if self.forests { bounds.tree } else { None };
        self.table.rows.insert(
            id,
            NodeRow {
                id,
                left: bounds.left,
                right: bounds.right,
                depth: bounds.depth,
                tree,
            },
        );
        Ok(id)
    }

    fn update(&mut self, assignments: &[Assignment], filter: &Filter) -> StoreResult<usize> {
        self.charge_write()?;
        let mut touched = 0;
        for row in self.table.rows.values_mut() {
            if !filter.matches(row) {
                continue;
            }
            // each assignment reads only its own column, so applying in
            // sequence sees the pre-update values
            for assignment in assignments {
                assignment.apply(row);
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn delete(&mut self, filter: &Filter) -> StoreResult<usize> {
        self.charge_write()?;
        let before = self.table.rows.len();
        self.table.rows.retain(|_, row| !filter.matches(row));
        Ok(before - self.table.rows.len())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionActive);
        }
        self.snapshot = Some(self.table.clone());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.table = snapshot;
        Ok(())
    }
}
