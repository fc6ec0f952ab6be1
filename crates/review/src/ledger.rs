//! Bounded undo history.
//!
//! Oldest entries are evicted once the ledger is full; an evicted
//! operation can no longer be undone.

use std::collections::VecDeque;

use emend_core::Correction;
use serde::Serialize;

/// Default number of undoable operations.
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// One reversible review action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UndoEntry {
    /// A correction was applied to the document.
    Accept {
        /// Position the correction held in the set.
        index: usize,
        /// Byte offset of the splice.
        start: usize,
        old_text: String,
        new_text: String,
        /// `new_text.len() - old_text.len()`.
        length_diff: isize,
        correction: Correction,
    },
    /// A correction was dismissed without touching the document.
    Reject { index: usize, correction: Correction },
}

impl UndoEntry {
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Accept { index, .. } | Self::Reject { index, .. } => *index,
        }
    }

    #[must_use]
    pub const fn correction(&self) -> &Correction {
        match self {
            Self::Accept { correction, .. } | Self::Reject { correction, .. } => correction,
        }
    }
}

/// Most-recent-last stack of [`UndoEntry`] with a fixed capacity.
#[derive(Debug, Clone)]
pub struct UndoLedger {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
    evicted: usize,
}

impl Default for UndoLedger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }
}

impl UndoLedger {
    /// Create a ledger holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Record an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: UndoEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted = self.evicted.saturating_add(1);
        }
        self.entries.push_back(entry);
    }

    /// Take the most recent entry.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    /// Put an entry back on top without counting against eviction.
    pub(crate) fn restore(&mut self, entry: UndoEntry) {
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped by eviction since creation or the last clear.
    #[must_use]
    pub const fn evicted(&self) -> usize {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.evicted = 0;
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UndoEntry> {
        self.entries.iter()
    }
}
