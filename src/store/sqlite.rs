use std::path::Path;

use rusqlite::{params_from_iter, Connection, Row};
use tracing::debug;

use super::{IntervalStore, StoreResult};
use crate::algebra::NewBounds;
use crate::filter::{Assignment, Change, Column, Direction, Filter, Operand};
use crate::schema::TreeSchema;
use crate::types::{NodeId, NodeRow, StoreError, TreeId};

/// Interval table stored in SQLite.
///
/// Column names come from the [`TreeSchema`] supplied at open time. Writers
/// take the database write lock up front (`BEGIN IMMEDIATE`), so two
/// structural changes never interleave their range updates.
pub struct SqliteStore {
    conn: Connection,
    schema: TreeSchema,
}

impl SqliteStore {
    /// Opens (or creates) a database file and ensures the table exists.
    pub fn open(path: impl AsRef<Path>, schema: TreeSchema) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Self::from_connection(conn, schema)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(schema: TreeSchema) -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, schema)
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection, schema: TreeSchema) -> StoreResult<Self> {
        schema.validate()?;
        let store = Self { conn, schema };
        store.ensure_table()?;
        Ok(store)
    }

    /// Schema this store was opened with.
    pub fn schema(&self) -> &TreeSchema {
        &self.schema
    }

    /// Underlying connection, for host columns the tree does not manage.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the table and its range indexes when missing.
    pub fn ensure_table(&self) -> StoreResult<()> {
        let s = &self.schema;
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                \"{left}\" INTEGER NOT NULL,
                \"{right}\" INTEGER NOT NULL,
                \"{depth}\" INTEGER NOT NULL",
            table = s.table,
            left = s.left,
            right = s.right,
            depth = s.depth,
        );
        match s.tree.as_deref() {
            Some(tree) => {
                sql.push_str(&format!(",\n                \"{tree}\" INTEGER\n            );"));
                for bound in [&s.left, &s.right] {
                    sql.push_str(&format!(
                        "\nCREATE INDEX IF NOT EXISTS \"{table}_{bound}_idx\" ON \"{table}\" (\"{tree}\", \"{bound}\");",
                        table = s.table,
                    ));
                }
            }
            None => {
                sql.push_str("\n            );");
                for bound in [&s.left, &s.right] {
                    sql.push_str(&format!(
                        "\nCREATE INDEX IF NOT EXISTS \"{table}_{bound}_idx\" ON \"{table}\" (\"{bound}\");",
                        table = s.table,
                    ));
                }
            }
        }
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    fn column(&self, column: Column) -> StoreResult<&str> {
        match column {
            Column::Id => Ok("id"),
            Column::Left => Ok(&self.schema.left),
            Column::Right => Ok(&self.schema.right),
            Column::Depth => Ok(&self.schema.depth),
            Column::Tree => self.schema.tree.as_deref().ok_or_else(|| {
                StoreError::InvalidSchema("tree column referenced in single-tree mode".into())
            }),
        }
    }

    fn render_where(&self, filter: &Filter, params: &mut Vec<i64>) -> StoreResult<String> {
        if filter.conditions().is_empty() {
            return Ok(String::new());
        }
        let mut terms = Vec::with_capacity(filter.conditions().len());
        for cond in filter.conditions() {
            let lhs = self.column(cond.column)?;
            let term = match cond.operand {
                Operand::Value(value) => {
                    params.push(value);
                    format!("\"{lhs}\" {} ?", cond.op.symbol())
                }
                Operand::Column { column, offset } => {
                    params.push(offset);
                    format!(
                        "\"{lhs}\" {} \"{}\" + ?",
                        cond.op.symbol(),
                        self.column(column)?
                    )
                }
            };
            terms.push(term);
        }
        Ok(format!(" WHERE {}", terms.join(" AND ")))
    }

    fn render_tail(&self, filter: &Filter) -> StoreResult<String> {
        let mut keys = Vec::with_capacity(filter.ordering().len() + 1);
        for key in filter.ordering() {
            let dir = match key.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            keys.push(format!("\"{}\" {dir}", self.column(key.column)?));
        }
        keys.push("id ASC".to_string());
        let mut tail = format!(" ORDER BY {}", keys.join(", "));
        if let Some(limit) = filter.row_limit() {
            tail.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(tail)
    }

    fn select_list(&self) -> String {
        let s = &self.schema;
        let tree = match s.tree.as_deref() {
            Some(tree) => format!("\"{tree}\""),
            None => "NULL".to_string(),
        };
        format!(
            "SELECT id, \"{}\", \"{}\", \"{}\", {tree} FROM \"{}\"",
            s.left, s.right, s.depth, s.table
        )
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: NodeId(row.get(0)?),
        left: row.get(1)?,
        right: row.get(2)?,
        depth: row.get(3)?,
        tree: row.get::<_, Option<i64>>(4)?.map(TreeId),
    })
}

impl IntervalStore for SqliteStore {
    fn forests(&self) -> bool {
        self.schema.forests()
    }

    fn get(&self, id: NodeId) -> StoreResult<Option<NodeRow>> {
        let rows = self.select(&Filter::id(id))?;
        Ok(rows.into_iter().next())
    }

    fn select(&self, filter: &Filter) -> StoreResult<Vec<NodeRow>> {
        let mut params = Vec::new();
        let sql = format!(
            "{}{}{}",
            self.select_list(),
            self.render_where(filter, &mut params)?,
            self.render_tail(filter)?
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn insert(&mut self, bounds: &NewBounds) -> StoreResult<NodeId> {
        let s = &self.schema;
        match s.tree.as_deref() {
            Some(tree) => {
                let sql = format!(
                    "INSERT INTO \"{}\" (\"{}\", \"{}\", \"{}\", \"{tree}\") VALUES (?1, ?2, ?3, ?4)",
                    s.table, s.left, s.right, s.depth
                );
                self.conn.execute(
                    &sql,
                    rusqlite::params![
                        bounds.left,
                        bounds.right,
                        bounds.depth,
                        bounds.tree.map(|t| t.0)
                    ],
                )?;
            }
            None => {
                let sql = format!(
                    "INSERT INTO \"{}\" (\"{}\", \"{}\", \"{}\") VALUES (?1, ?2, ?3)",
                    s.table, s.left, s.right, s.depth
                );
                self.conn.execute(
                    &sql,
                    rusqlite::params![bounds.left, bounds.right, bounds.depth],
                )?;
            }
        }
        Ok(NodeId(self.conn.last_insert_rowid()))
    }

    fn update(&mut self, assignments: &[Assignment], filter: &Filter) -> StoreResult<usize> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let mut params = Vec::new();
        let mut sets = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let column = self.column(assignment.column)?;
            match assignment.change {
                Change::Add(delta) => {
                    params.push(delta);
                    sets.push(format!("\"{column}\" = \"{column}\" + ?"));
                }
                Change::Set(value) => {
                    params.push(value);
                    sets.push(format!("\"{column}\" = ?"));
                }
            }
        }
        let sql = format!(
            "UPDATE \"{}\" SET {}{}",
            self.schema.table,
            sets.join(", "),
            self.render_where(filter, &mut params)?
        );
        let touched = self
            .conn
            .prepare_cached(&sql)?
            .execute(params_from_iter(params.iter()))?;
        debug!(rows = touched, "store.sqlite.update");
        Ok(touched)
    }

    fn delete(&mut self, filter: &Filter) -> StoreResult<usize> {
        let mut params = Vec::new();
        let sql = format!(
            "DELETE FROM \"{}\"{}",
            self.schema.table,
            self.render_where(filter, &mut params)?
        );
        let removed = self
            .conn
            .prepare_cached(&sql)?
            .execute(params_from_iter(params.iter()))?;
        Ok(removed)
    }

    fn begin(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            return Err(StoreError::TransactionActive);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
