//! Undo/redo transaction log
//!
//! A transaction is the ordered list of `(before, after)` node states written
//! by one `apply`. Undo restores the `before` states in reverse order so that
//! repeated stages of one id unwind to the earliest state; redo replays the
//! `after` states in order. Ids that held an allocated placeholder before the
//! transaction get that placeholder back on undo.

use crate::core::types::{Node, NodeId};
use std::collections::HashSet;

/// One staged entry of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Committed state before the write (tombstone if absent)
    pub before: Node,
    /// State written
    pub after: Node,
    /// `before` was an allocated placeholder rather than an absent id
    pub reserved: bool,
}

/// Unit of undo/redo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Changes in staging order
    pub changes: Vec<Change>,
}

impl Transaction {
    /// States to write to undo this transaction
    pub fn undo_states(&self) -> Vec<Node> {
        self.changes.iter().rev().map(|change| change.before.clone()).collect()
    }

    /// Ids whose earliest `before` state was a placeholder
    pub fn reserved_ids(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .filter(|change| seen.insert(change.after.id))
            .filter(|change| change.reserved)
            .map(|change| change.after.id)
            .collect()
    }

    /// States to write to redo this transaction
    pub fn redo_states(&self) -> Vec<Node> {
        self.changes.iter().map(|change| change.after.clone()).collect()
    }
}

/// Done and undone stacks
#[derive(Debug, Default)]
pub struct TransactionLog {
    done: Vec<Transaction>,
    undone: Vec<Transaction>,
}

impl TransactionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly applied transaction; clears the redo stack
    pub fn record(&mut self, transaction: Transaction) {
        self.undone.clear();
        self.done.push(transaction);
    }

    /// Pop the most recent transaction for undoing
    pub fn take_undo(&mut self) -> Option<Transaction> {
        self.done.pop()
    }

    /// Pop the most recently undone transaction for redoing
    pub fn take_redo(&mut self) -> Option<Transaction> {
        self.undone.pop()
    }

    /// Push a transaction that was just undone
    pub fn push_undone(&mut self, transaction: Transaction) {
        self.undone.push(transaction);
    }

    /// Push a transaction that was just redone (or whose undo failed)
    pub fn push_done(&mut self, transaction: Transaction) {
        self.done.push(transaction);
    }

    /// Number of transactions that can be undone
    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    /// Number of transactions that can be redone
    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(id: u64, before: &str, after: &str) -> Change {
        Change {
            before: Node::new(id, before, vec![]),
            after: Node::new(id, after, vec![]),
            reserved: false,
        }
    }

    #[test]
    fn undo_states_unwind_in_reverse() {
        let txn = Transaction {
            changes: vec![change(1, "a", "b"), change(1, "b", "c")],
        };
        let undo = txn.undo_states();
        assert_eq!(undo.last().unwrap().text.as_deref(), Some("a"));
        let redo = txn.redo_states();
        assert_eq!(redo.last().unwrap().text.as_deref(), Some("c"));
    }

    #[test]
    fn recording_clears_redo() {
        let mut log = TransactionLog::new();
        log.record(Transaction::default());
        let txn = log.take_undo().unwrap();
        log.push_undone(txn);
        assert_eq!(log.redo_depth(), 1);
        log.record(Transaction::default());
        assert_eq!(log.redo_depth(), 0);
        assert_eq!(log.undo_depth(), 1);
    }

    #[test]
    fn earliest_state_decides_reservation() {
        let txn = Transaction {
            changes: vec![
                Change {
                    before: Node::tombstone(4),
                    after: Node::new(4, "a", vec![]),
                    reserved: true,
                },
                Change {
                    before: Node::new(4, "a", vec![]),
                    after: Node::tombstone(4),
                    reserved: false,
                },
                change(1, "x", "y"),
            ],
        };
        assert_eq!(txn.reserved_ids(), vec![4]);
    }
}
