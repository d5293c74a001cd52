//! Consistency checks over stored intervals.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{NodeId, NodeRow, TreeId};

const MAX_FINDINGS: usize = 32;

/// A single inconsistency discovered in the stored intervals.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct VerifyFinding {
    /// Tree the finding belongs to, when forests are enabled.
    pub tree: Option<TreeId>,
    /// Offending node, when one can be named.
    pub node: Option<NodeId>,
    /// Human-readable description of the issue.
    pub message: String,
}

/// Statistics collected while verifying.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Number of distinct trees examined.
    pub trees: u64,
    /// Number of rows examined.
    pub nodes: u64,
}

/// Result of checking every nesting invariant.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Whether no finding was recorded.
    pub success: bool,
    /// Issues discovered, capped at a fixed number.
    pub findings: Vec<VerifyFinding>,
    /// What was examined.
    pub counts: VerifyCounts,
}

/// Checks the nested-set invariants over a full row dump.
///
/// Per tree: bounds form exactly `1..=2N`, a single root spans them at depth
/// zero, intervals nest without partial overlap, and every depth equals the
/// number of enclosing intervals. With forests enabled each row must carry a
/// tree identifier equal to its root's identity.
pub fn verify_rows(rows: &[NodeRow], forests: bool) -> VerifyReport {
    let mut findings = Vec::new();
    let mut trees: BTreeMap<Option<TreeId>, Vec<NodeRow>> = BTreeMap::new();
    for row in rows {
        if forests && row.tree.is_none() {
            push(&mut findings, None, Some(row.id), "row has no tree identifier");
        }
        if row.left >= row.right {
            push(
                &mut findings,
                row.tree,
                Some(row.id),
                format!("left {} is not below right {}", row.left, row.right),
            );
        }
        trees.entry(row.tree).or_default().push(*row);
    }

    let counts = VerifyCounts {
        trees: trees.len() as u64,
        nodes: rows.len() as u64,
    };
    for (tree, mut members) in trees {
        if findings.len() >= MAX_FINDINGS {
            break;
        }
        members.sort_by_key(|r| r.left);
        check_bounds(tree, &members, &mut findings);
        check_root(tree, &members, forests, &mut findings);
        check_nesting(tree, &members, &mut findings);
    }

    VerifyReport {
        success: findings.is_empty(),
        findings,
        counts,
    }
}

fn check_bounds(tree: Option<TreeId>, members: &[NodeRow], findings: &mut Vec<VerifyFinding>) {
    let mut values: Vec<i64> = members.iter().flat_map(|r| [r.left, r.right]).collect();
    values.sort_unstable();
    for (idx, value) in values.iter().enumerate() {
        let expected = idx as i64 + 1;
        if *value != expected {
            push(
                findings,
                tree,
                None,
                format!("bounds are not contiguous: expected {expected}, found {value}"),
            );
            return;
        }
    }
}

fn check_root(
    tree: Option<TreeId>,
    members: &[NodeRow],
    forests: bool,
    findings: &mut Vec<VerifyFinding>,
) {
    let roots: Vec<&NodeRow> = members.iter().filter(|r| r.is_root()).collect();
    let root = match roots.as_slice() {
        [root] => *root,
        [] => {
            push(findings, tree, None, "tree has no root");
            return;
        }
        many => {
            push(
                findings,
                tree,
                Some(many[1].id),
                format!("tree has {} roots", many.len()),
            );
            return;
        }
    };
    let span = 2 * members.len() as i64;
    if root.right != span {
        push(
            findings,
            tree,
            Some(root.id),
            format!("root right is {} but tree spans {span}", root.right),
        );
    }
    if forests && root.tree != Some(TreeId::from(root.id)) {
        push(
            findings,
            tree,
            Some(root.id),
            "root identity does not match its tree identifier",
        );
    }
}

fn check_nesting(tree: Option<TreeId>, members: &[NodeRow], findings: &mut Vec<VerifyFinding>) {
    let mut open: Vec<&NodeRow> = Vec::new();
    for row in members {
        while open.last().is_some_and(|top| top.right < row.left) {
            open.pop();
        }
        if let Some(top) = open.last() {
            if row.right > top.right {
                push(
                    findings,
                    tree,
                    Some(row.id),
                    format!(
                        "interval [{}, {}] overlaps [{}, {}] of node {}",
                        row.left, row.right, top.left, top.right, top.id
                    ),
                );
            }
        }
        if row.depth != open.len() as i64 {
            push(
                findings,
                tree,
                Some(row.id),
                format!("depth {} but {} enclosing nodes", row.depth, open.len()),
            );
        }
        open.push(row);
    }
}

fn push(
    findings: &mut Vec<VerifyFinding>,
    tree: Option<TreeId>,
    node: Option<NodeId>,
    message: impl Into<String>,
) {
    if findings.len() < MAX_FINDINGS {
        findings.push(VerifyFinding {
            tree,
            node,
            message: message.into(),
        });
    }
}
