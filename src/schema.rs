//! Table and column naming for the interval table.

use serde::{Deserialize, Serialize};

use crate::types::StoreError;

/// Default column holding the left bound.
pub const DEFAULT_LEFT: &str = "lft";
/// Default column holding the right bound.
pub const DEFAULT_RIGHT: &str = "rgt";
/// Default column holding the depth.
pub const DEFAULT_DEPTH: &str = "level";
/// Default column holding the tree identifier.
pub const DEFAULT_TREE: &str = "tree";
/// Default table name.
pub const DEFAULT_TABLE: &str = "tree";

/// Storage column identifiers for the interval attributes.
///
/// Passed once when a store is opened. Leaving `tree` unset selects
/// single-tree mode, where a second root is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeSchema {
    /// Table holding the node rows.
    pub table: String,
    /// Column for the left bound.
    pub left: String,
    /// Column for the right bound.
    pub right: String,
    /// Column for the depth.
    pub depth: String,
    /// Column for the tree identifier; `None` disables forests.
    pub tree: Option<String>,
}

impl Default for TreeSchema {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            left: DEFAULT_LEFT.to_string(),
            right: DEFAULT_RIGHT.to_string(),
            depth: DEFAULT_DEPTH.to_string(),
            tree: Some(DEFAULT_TREE.to_string()),
        }
    }
}

impl TreeSchema {
    /// Creates a schema with the default column names and forests enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table name.
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    /// Sets the left bound column.
    pub fn left(mut self, name: impl Into<String>) -> Self {
        self.left = name.into();
        self
    }

    /// Sets the right bound column.
    pub fn right(mut self, name: impl Into<String>) -> Self {
        self.right = name.into();
        self
    }

    /// Sets the depth column.
    pub fn depth(mut self, name: impl Into<String>) -> Self {
        self.depth = name.into();
        self
    }

    /// Sets the tree identifier column, enabling forests.
    pub fn tree(mut self, name: impl Into<String>) -> Self {
        self.tree = Some(name.into());
        self
    }

    /// Drops the tree identifier column; only one root may exist.
    pub fn single_tree(mut self) -> Self {
        self.tree = None;
        self
    }

    /// Returns true when several independent trees share the table.
    pub fn forests(&self) -> bool {
        self.tree.is_some()
    }

    /// Rejects empty, duplicate or non-identifier names.
    pub fn validate(&self) -> Result<(), StoreError> {
        let mut columns = vec![
            ("left", self.left.as_str()),
            ("right", self.right.as_str()),
            ("depth", self.depth.as_str()),
        ];
        if let Some(tree) = self.tree.as_deref() {
            columns.push(("tree", tree));
        }
        check_identifier("table", &self.table)?;
        for (role, name) in &columns {
            check_identifier(role, name)?;
            if name.eq_ignore_ascii_case("id") {
                return Err(StoreError::InvalidSchema(format!(
                    "{role} column cannot reuse the identity column 'id'"
                )));
            }
        }
        for (idx, (role, name)) in columns.iter().enumerate() {
            if let Some((other, _)) = columns[idx + 1..]
                .iter()
                .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
            {
                return Err(StoreError::InvalidSchema(format!(
                    "{role} and {other} columns share the name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

fn check_identifier(role: &str, name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSchema(format!(
            "{role} name '{name}' is not a plain identifier"
        )))
    }
}
