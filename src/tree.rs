//! Mutation orchestrator: validates, plans and applies structural changes.
//!
//! Every public mutation runs inside one store transaction. Preconditions that
//! need no stored state are checked before the transaction opens; the rest are
//! checked against rows re-read inside it, before the first write. A failure at
//! any point rolls the transaction back, so either every renumbering write of
//! an operation is committed or none is.

use tracing::{debug, warn};

use crate::algebra::{self, Step};
use crate::filter::{Assignment, Column, Filter, Write};
use crate::query;
use crate::store::IntervalStore;
use crate::types::{
    NodeId, NodeRow, Operation, Outcome, Placement, Result, Subject, TreeError, TreeId, Violation,
};
use crate::verify::{self, VerifyReport};

/// Where the orchestrator is within a structural operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No operation in flight.
    Idle,
    /// An operation was accepted and is being dispatched.
    Preparing(Operation),
    /// Fresh rows are being read and preconditions checked.
    Validating,
    /// Renumbering writes are being applied.
    Shifting,
    /// The transaction is being committed.
    Committing,
    /// The operation failed and its writes were rolled back.
    Aborted,
}

/// A nested-set tree (or forest) maintained over an [`IntervalStore`].
///
/// `NestedSet` is the only writer of the interval columns. Taking `&mut self`
/// for every mutation keeps one structural change in flight per handle; across
/// handles the store's transaction serialises writers.
///
/// ```
/// use nestree::{MemoryStore, NestedSet};
///
/// let mut tree = NestedSet::new(MemoryStore::new());
/// let root = tree.make_root()?;
/// let child = tree.append_to(root.id)?;
/// assert_eq!((child.left, child.right, child.depth), (2, 3, 1));
/// assert_eq!(tree.node(root.id)?.right, 4);
/// # Ok::<(), nestree::TreeError>(())
/// ```
pub struct NestedSet<S> {
    store: S,
    phase: Phase,
}

impl<S: IntervalStore> NestedSet<S> {
    /// Wraps a store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            phase: Phase::Idle,
        }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the store, for columns the tree does not manage.
    ///
    /// Writing interval columns through this handle breaks the nesting.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Returns the store, ending this handle.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns true when the store holds several independent trees.
    pub fn forests(&self) -> bool {
        self.store.forests()
    }

    /// Current phase; always [`Phase::Idle`] between calls.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs one structural operation on `subject`.
    ///
    /// Creations and moves yield [`Outcome::Node`] with the acting node's new
    /// interval; deletes yield [`Outcome::Removed`].
    pub fn apply(&mut self, subject: Subject, op: Operation) -> Result<Outcome> {
        self.enter(Phase::Preparing(op));
        let result = self.dispatch(subject, op);
        match &result {
            Ok(outcome) => debug!(op = op.as_str(), outcome = ?outcome, "tree.op.completed"),
            Err(err) => {
                self.enter(Phase::Aborted);
                debug!(op = op.as_str(), code = err.code(), error = %err, "tree.op.aborted");
            }
        }
        self.phase = Phase::Idle;
        result
    }

    /// Creates a new root.
    pub fn make_root(&mut self) -> Result<NodeRow> {
        self.apply_node(Subject::New, Operation::MakeRoot)
    }

    /// Creates a new first child of `target`.
    pub fn prepend_to(&mut self, target: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::New, Operation::PrependTo(target))
    }

    /// Creates a new last child of `target`.
    pub fn append_to(&mut self, target: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::New, Operation::AppendTo(target))
    }

    /// Creates a new sibling right before `target`.
    pub fn insert_before(&mut self, target: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::New, Operation::InsertBefore(target))
    }

    /// Creates a new sibling right after `target`.
    pub fn insert_after(&mut self, target: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::New, Operation::InsertAfter(target))
    }

    /// Moves `node` and its subtree relative to `target`, possibly into another tree.
    pub fn move_node(&mut self, node: NodeId, placement: Placement, target: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::Existing(node), Operation::place(placement, target))
    }

    /// Detaches `node` and its subtree into a tree of their own.
    pub fn move_to_root(&mut self, node: NodeId) -> Result<NodeRow> {
        self.apply_node(Subject::Existing(node), Operation::MakeRoot)
    }

    /// Removes `node` alone; its children take its place under its parent.
    pub fn delete(&mut self, node: NodeId) -> Result<usize> {
        self.apply_removal(node, Operation::Delete)
    }

    /// Removes `node` together with every descendant.
    pub fn delete_with_descendants(&mut self, node: NodeId) -> Result<usize> {
        self.apply_removal(node, Operation::DeleteWithDescendants)
    }

    fn apply_node(&mut self, subject: Subject, op: Operation) -> Result<NodeRow> {
        match self.apply(subject, op)? {
            Outcome::Node(row) => Ok(row),
            Outcome::Removed(_) => Err(TreeError::InvalidOperation(
                "operation did not produce a node",
            )),
        }
    }

    fn apply_removal(&mut self, node: NodeId, op: Operation) -> Result<usize> {
        match self.apply(Subject::Existing(node), op)? {
            Outcome::Removed(count) => Ok(count),
            Outcome::Node(_) => Err(TreeError::InvalidOperation("operation did not remove rows")),
        }
    }

    fn dispatch(&mut self, subject: Subject, op: Operation) -> Result<Outcome> {
        match (subject, op) {
            (Subject::New, Operation::Delete | Operation::DeleteWithDescendants) => {
                Err(Violation::TransientNode.into())
            }
            (Subject::New, Operation::MakeRoot) => self.create_root().map(Outcome::Node),
            (Subject::Existing(id), Operation::MakeRoot) => {
                self.move_subtree_to_root(id).map(Outcome::Node)
            }
            (Subject::Existing(id), Operation::Delete) => {
                self.remove(id, false).map(Outcome::Removed)
            }
            (Subject::Existing(id), Operation::DeleteWithDescendants) => {
                self.remove(id, true).map(Outcome::Removed)
            }
            (subject, op) => {
                let Some((placement, target)) = op.placement() else {
                    return Err(TreeError::InvalidOperation("no operation selected"));
                };
                if !is_assigned(target) {
                    return Err(Violation::TransientTarget.into());
                }
                match subject {
                    Subject::New => self.create(op, placement, target).map(Outcome::Node),
                    Subject::Existing(id) => {
                        self.move_subtree(op, id, placement, target).map(Outcome::Node)
                    }
                }
            }
        }
    }

    fn create_root(&mut self) -> Result<NodeRow> {
        let forests = self.forests();
        self.transact(Operation::MakeRoot, |this| {
            this.enter(Phase::Validating);
            if !forests && !this.store.select(&query::roots().limit(1))?.is_empty() {
                return Err(Violation::SecondRoot.into());
            }

            this.enter(Phase::Shifting);
            let bounds = algebra::new_root();
            let id = this.store.insert(&bounds)?;
            if !is_assigned(id) {
                return Err(Violation::MissingIdentity.into());
            }
            let tree = if forests {
                // the tree is named after its root, known only now
                let tree = TreeId::from(id);
                this.store
                    .update(&[Assignment::set(Column::Tree, tree.0)], &Filter::id(id))?;
                Some(tree)
            } else {
                None
            };
            Ok(NodeRow {
                id,
                left: bounds.left,
                right: bounds.right,
                depth: bounds.depth,
                tree,
            })
        })
    }

    fn create(&mut self, op: Operation, placement: Placement, target: NodeId) -> Result<NodeRow> {
        let forests = self.forests();
        self.transact(op, |this| {
            this.enter(Phase::Validating);
            let target = this.fetch(target, "target node")?;
            if placement.is_sibling() && target.is_root() {
                return Err(Violation::TargetIsRoot.into());
            }
            if forests && target.tree.is_none() {
                return Err(TreeError::NotFound("destination tree"));
            }

            this.enter(Phase::Shifting);
            let (steps, bounds) = algebra::plan_insert(placement, &target);
            this.run(&steps)?;
            let id = this.store.insert(&bounds)?;
            if !is_assigned(id) {
                return Err(Violation::MissingIdentity.into());
            }
            debug!(
                op = op.as_str(),
                node = id.0,
                left = bounds.left,
                depth = bounds.depth,
                "tree.create"
            );
            Ok(NodeRow {
                id,
                left: bounds.left,
                right: bounds.right,
                depth: bounds.depth,
                tree: bounds.tree,
            })
        })
    }

    fn move_subtree(
        &mut self,
        op: Operation,
        node: NodeId,
        placement: Placement,
        target: NodeId,
    ) -> Result<NodeRow> {
        if !is_assigned(node) {
            return Err(Violation::TransientNode.into());
        }
        if node == target {
            return Err(Violation::TargetIsSelf.into());
        }
        let forests = self.forests();
        self.transact(op, |this| {
            this.enter(Phase::Validating);
            let target = this.fetch(target, "target node")?;
            let subject = this.fetch(node, "node")?;
            if placement.is_sibling() && target.is_root() {
                return Err(Violation::TargetIsRoot.into());
            }
            if target.is_descendant_of(&subject) {
                return Err(Violation::TargetIsDescendant.into());
            }
            if forests && target.tree.is_none() {
                return Err(TreeError::NotFound("destination tree"));
            }

            this.enter(Phase::Shifting);
            if subject.tree != target.tree {
                debug!(
                    node = node.0,
                    from = ?subject.tree,
                    to = ?target.tree,
                    width = subject.width(),
                    "tree.move.cross_tree"
                );
            } else {
                debug!(
                    op = op.as_str(),
                    node = node.0,
                    target = target.id.0,
                    width = subject.width(),
                    "tree.move"
                );
            }
            this.run(&algebra::plan_move(&subject, placement, &target))?;
            this.fetch(node, "node")
        })
    }

    fn move_subtree_to_root(&mut self, node: NodeId) -> Result<NodeRow> {
        if !self.forests() {
            return Err(Violation::RootMoveWithoutForest.into());
        }
        if !is_assigned(node) {
            return Err(Violation::TransientNode.into());
        }
        self.transact(Operation::MakeRoot, |this| {
            this.enter(Phase::Validating);
            let subject = this.fetch(node, "node")?;
            if subject.is_root() {
                return Err(Violation::AlreadyRoot.into());
            }

            this.enter(Phase::Shifting);
            debug!(node = node.0, width = subject.width(), "tree.move.to_root");
            this.run(&algebra::plan_move_to_root(&subject))?;
            this.fetch(node, "node")
        })
    }

    fn remove(&mut self, node: NodeId, with_descendants: bool) -> Result<usize> {
        if !is_assigned(node) {
            return Err(Violation::TransientNode.into());
        }
        let op = if with_descendants {
            Operation::DeleteWithDescendants
        } else {
            Operation::Delete
        };
        self.transact(op, |this| {
            this.enter(Phase::Validating);
            let subject = this.fetch(node, "node")?;
            if !with_descendants && subject.is_root() {
                return Err(TreeError::InvalidOperation(
                    "deleting a root requires delete_with_descendants",
                ));
            }

            this.enter(Phase::Shifting);
            if !with_descendants && !subject.is_leaf() {
                debug!(node = node.0, promoted = subject.size() - 1, "tree.delete.promote");
            }
            let removed = this.run(&algebra::plan_delete(&subject, with_descendants))?;
            debug!(node = node.0, removed, with_descendants, "tree.delete");
            Ok(removed)
        })
    }

    /// Applies steps in order and returns how many rows they deleted.
    fn run(&mut self, steps: &[Step]) -> Result<usize> {
        let mut removed = 0;
        for step in steps {
            for write in step.writes() {
                let rows = self.store.apply(&write)?;
                if matches!(write, Write::Delete(_)) {
                    removed += rows;
                }
                debug!(step = ?step, rows, "tree.step");
            }
        }
        Ok(removed)
    }

    fn transact<T>(&mut self, op: Operation, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.store.begin()?;
        match body(self) {
            Ok(value) => {
                self.enter(Phase::Committing);
                match self.store.commit() {
                    Ok(()) => Ok(value),
                    Err(err) => {
                        self.rollback_after_failure(op);
                        Err(err.into())
                    }
                }
            }
            Err(err) => {
                self.rollback_after_failure(op);
                Err(err)
            }
        }
    }

    fn rollback_after_failure(&mut self, op: Operation) {
        match self.store.rollback() {
            Ok(()) => debug!(op = op.as_str(), "tree.tx.rollback"),
            Err(err) => warn!(op = op.as_str(), error = %err, "tree.tx.rollback_failed"),
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        debug!(phase = ?phase, "tree.phase");
    }

    fn fetch(&self, id: NodeId, what: &'static str) -> Result<NodeRow> {
        self.store.get(id)?.ok_or(TreeError::NotFound(what))
    }

    /// Latest stored state of a node.
    pub fn node(&self, id: NodeId) -> Result<NodeRow> {
        self.fetch(id, "node")
    }

    /// Runs an arbitrary filter, typically one built by [`crate::query`].
    pub fn find(&self, filter: &Filter) -> Result<Vec<NodeRow>> {
        Ok(self.store.select(filter)?)
    }

    /// Descendants of `id`, at most `max_depth` levels down.
    pub fn descendants(&self, id: NodeId, max_depth: Option<i64>) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.find(&query::descendants(&node, max_depth))
    }

    /// Direct children of `id`.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.find(&query::children(&node))
    }

    /// Ancestors of `id`, root first, at most `max_depth` levels up.
    pub fn ancestors(&self, id: NodeId, max_depth: Option<i64>) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.find(&query::ancestors(&node, max_depth))
    }

    /// Immediate parent of `id`; `None` for a root.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeRow>> {
        let node = self.node(id)?;
        Ok(self.find(&query::parent(&node))?.into_iter().next())
    }

    /// Sibling directly before `id`.
    pub fn prev(&self, id: NodeId) -> Result<Option<NodeRow>> {
        let node = self.node(id)?;
        Ok(self.find(&query::prev(&node))?.into_iter().next())
    }

    /// Sibling directly after `id`.
    pub fn next(&self, id: NodeId) -> Result<Option<NodeRow>> {
        let node = self.node(id)?;
        Ok(self.find(&query::next(&node))?.into_iter().next())
    }

    /// Leaves below `id`.
    pub fn leaves(&self, id: NodeId) -> Result<Vec<NodeRow>> {
        let node = self.node(id)?;
        self.find(&query::leaves(&node))
    }

    /// Every root.
    pub fn roots(&self) -> Result<Vec<NodeRow>> {
        self.find(&query::roots())
    }

    /// Whether `id` lies inside `ancestor`'s subtree.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        let ancestor = self.node(ancestor)?;
        Ok(node.is_descendant_of(&ancestor))
    }

    /// Checks every nesting invariant over all stored rows.
    pub fn verify(&self) -> Result<VerifyReport> {
        let rows = self.find(&Filter::all())?;
        Ok(verify::verify_rows(&rows, self.forests()))
    }
}

fn is_assigned(id: NodeId) -> bool {
    id.0 > 0
}
