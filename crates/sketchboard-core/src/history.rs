//! Authoritative stroke history with a single, room-wide undo stack.

use crate::model::{Operation, OperationId};
use std::collections::HashSet;

/// Ordered log of committed operations plus the redo stack.
///
/// Undo and redo always act on the tail, regardless of who drew the stroke.
/// An operation lives in at most one of `history` and `undone`.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    /// Committed operations, oldest first.
    history: Vec<Operation>,
    /// Undone operations (LIFO).
    undone: Vec<Operation>,
    /// Ids present in `history` or `undone`.
    ids: HashSet<OperationId>,
}

impl OperationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed operation and invalidate the redo stack.
    ///
    /// The caller assigns a unique id and the timestamp beforehand.
    pub fn push(&mut self, op: Operation) {
        for discarded in self.undone.drain(..) {
            self.ids.remove(&discarded.id);
        }
        self.ids.insert(op.id.clone());
        self.history.push(op);
    }

    /// Move the most recent operation to the redo stack.
    ///
    /// Returns the id of the undone operation, or `None` if the history was
    /// empty.
    pub fn undo(&mut self) -> Option<OperationId> {
        let op = self.history.pop()?;
        let id = op.id.clone();
        self.undone.push(op);
        Some(id)
    }

    /// Restore the most recently undone operation.
    ///
    /// Returns the full operation since peers need its content to redraw it.
    pub fn redo(&mut self) -> Option<Operation> {
        let op = self.undone.pop()?;
        self.history.push(op.clone());
        Some(op)
    }

    /// Drop everything, including the redo stack.
    pub fn clear(&mut self) {
        self.history.clear();
        self.undone.clear();
        self.ids.clear();
    }

    /// Whether `id` is in the history or the redo stack.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn history(&self) -> &[Operation] {
        &self.history
    }

    pub fn undone(&self) -> &[Operation] {
        &self.undone
    }

    /// Copy of the history for a late joiner.
    pub fn snapshot(&self) -> Vec<Operation> {
        self.history.clone()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
