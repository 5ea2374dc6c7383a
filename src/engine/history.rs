//! engine::history
//!
//! Bounded, branchable undo/redo log of full-state snapshots.
//!
//! # Model
//!
//! History is a list of snapshots plus a cursor naming the snapshot that
//! matches the live state. `None` means the log is empty.
//!
//! - Writing while the cursor is behind the tail discards every snapshot after
//!   the cursor (the redo branch) before appending.
//! - When the log exceeds its capacity the oldest snapshots are dropped and
//!   the cursor shifts by the same amount.
//! - Undo and redo move the cursor by one and hand back a copy of the snapshot
//!   it lands on.
//!
//! # Invariants
//!
//! - `cursor` is `None` iff the log is empty, else `< len`
//! - `len <= max_size`
//!
//! Calling [`HistoryManager::undo`] or [`HistoryManager::redo`] on a disabled
//! manager is a usage error and returns [`HistoryError::Disabled`].

use serde_json::Value;
use thiserror::Error;

use super::monitor::estimate_value_size;

/// Errors from history operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history is disabled")]
    Disabled,
}

/// Result of a cursor move.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMove {
    /// Copy of the snapshot at the new cursor.
    pub state: Value,
    /// The new cursor position.
    pub index: usize,
}

/// The undo/redo log.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    enabled: bool,
    max_size: usize,
    entries: Vec<Value>,
    cursor: Option<usize>,
}

impl HistoryManager {
    /// Create an empty manager. A zero capacity is treated as one.
    pub fn new(enabled: bool, max_size: usize) -> Self {
        Self {
            enabled,
            max_size: max_size.max(1),
            entries: Vec::new(),
            cursor: None,
        }
    }

    /// Reset the log to a single snapshot of `state`.
    pub fn initialize(&mut self, state: &Value) {
        self.entries.clear();
        self.cursor = None;
        self.add_state(state);
    }

    /// Append a snapshot of `state`, discarding any redo branch.
    pub fn add_state(&mut self, state: &Value) {
        if !self.enabled {
            return;
        }

        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(state.clone());

        let excess = self.entries.len().saturating_sub(self.max_size);
        if excess > 0 {
            self.entries.drain(..excess);
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Move one snapshot back.
    ///
    /// Returns `Ok(None)` at the oldest snapshot.
    pub fn undo(&mut self) -> Result<Option<HistoryMove>, HistoryError> {
        if !self.enabled {
            return Err(HistoryError::Disabled);
        }
        match self.cursor {
            Some(c) if c > 0 => Ok(Some(self.move_to(c - 1))),
            _ => Ok(None),
        }
    }

    /// Move one snapshot forward.
    ///
    /// Returns `Ok(None)` at the newest snapshot.
    pub fn redo(&mut self) -> Result<Option<HistoryMove>, HistoryError> {
        if !self.enabled {
            return Err(HistoryError::Disabled);
        }
        match self.cursor {
            Some(c) if c + 1 < self.entries.len() => Ok(Some(self.move_to(c + 1))),
            _ => Ok(None),
        }
    }

    fn move_to(&mut self, index: usize) -> HistoryMove {
        self.cursor = Some(index);
        HistoryMove {
            state: self.entries[index].clone(),
            index,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.enabled && self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.enabled && self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Estimated bytes held by all snapshots.
    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(estimate_value_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager(max: usize) -> HistoryManager {
        HistoryManager::new(true, max)
    }

    #[test]
    fn initialize_seeds_one_entry() {
        let mut history = manager(10);
        history.initialize(&json!({"score": 0}));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
        assert!(!history.can_undo());
    }

    #[test]
    fn initialize_when_disabled_records_nothing() {
        let mut history = HistoryManager::new(false, 10);
        history.initialize(&json!({}));
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
    }

    #[test]
    fn undo_then_redo() {
        let mut history = manager(10);
        let a = json!({"v": "A"});
        let b = json!({"v": "B"});
        history.add_state(&a);
        history.add_state(&b);

        let back = history.undo().unwrap().unwrap();
        assert_eq!(back.state, a);
        assert_eq!(back.index, 0);

        let forward = history.redo().unwrap().unwrap();
        assert_eq!(forward.state, b);
        assert_eq!(forward.index, 1);
    }

    #[test]
    fn boundaries_return_none() {
        let mut history = manager(10);
        history.add_state(&json!(1));
        assert_eq!(history.undo().unwrap(), None);
        assert_eq!(history.redo().unwrap(), None);

        let mut empty = manager(10);
        assert_eq!(empty.undo().unwrap(), None);
        assert_eq!(empty.redo().unwrap(), None);
    }

    #[test]
    fn write_after_undo_discards_branch() {
        let mut history = manager(10);
        history.add_state(&json!("A"));
        history.add_state(&json!("B"));
        history.undo().unwrap();
        history.add_state(&json!("C"));

        assert_eq!(history.redo().unwrap(), None);
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo().unwrap().unwrap().state, json!("A"));
    }

    #[test]
    fn capacity_trims_oldest() {
        let mut history = manager(3);
        for i in 0..5 {
            history.add_state(&json!(i));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.undo().unwrap().unwrap().state, json!(3));
        assert_eq!(history.undo().unwrap().unwrap().state, json!(2));
        assert_eq!(history.undo().unwrap(), None);
    }

    #[test]
    fn trimming_after_branch_keeps_cursor_valid() {
        let mut history = manager(2);
        history.add_state(&json!(1));
        history.add_state(&json!(2));
        history.undo().unwrap();
        history.add_state(&json!(3));
        history.add_state(&json!(4));
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(history.undo().unwrap().unwrap().state, json!(3));
    }

    #[test]
    fn disabled_undo_is_error() {
        let mut history = HistoryManager::new(false, 10);
        assert_eq!(history.undo(), Err(HistoryError::Disabled));
        assert_eq!(history.redo(), Err(HistoryError::Disabled));
    }

    #[test]
    fn returned_snapshots_are_copies() {
        let mut history = manager(10);
        history.add_state(&json!({"list": [1]}));
        history.add_state(&json!({"list": [1, 2]}));
        let mut back = history.undo().unwrap().unwrap();
        back.state["list"] = json!("mutated");
        history.redo().unwrap();
        assert_eq!(history.undo().unwrap().unwrap().state, json!({"list": [1]}));
    }

    #[test]
    fn memory_usage_grows_with_entries() {
        let mut history = manager(10);
        history.add_state(&json!({"name": "ace"}));
        let one = history.memory_usage();
        history.add_state(&json!({"name": "ace"}));
        assert_eq!(history.memory_usage(), one * 2);
    }
}
