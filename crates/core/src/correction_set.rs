//! The live, ordered set of corrections awaiting review.
//!
//! Invariants after every mutation:
//! - sorted ascending by `position.start`
//! - no two entries overlap
//! - every position lies within the current document

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Correction;

/// Ordered sequence of anchored corrections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionSet {
    items: Vec<Correction>,
}

impl CorrectionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a set from overlap-filtered corrections.
    ///
    /// Entries are stably sorted by start and comment entries normalized;
    /// overlap filtering is the caller's job.
    #[must_use]
    pub fn from_filtered(mut items: Vec<Correction>) -> Self {
        items.sort_by_key(|c| c.position.start);
        Self {
            items: items.into_iter().map(Correction::normalized).collect(),
        }
    }

    /// Number of corrections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set has no corrections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Correction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Correction> {
        self.items.get(index)
    }

    /// Iterate in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, Correction> {
        self.items.iter()
    }

    /// Borrow the corrections as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Correction] {
        &self.items
    }

    /// Consume the set.
    #[must_use]
    pub fn into_vec(self) -> Vec<Correction> {
        self.items
    }

    /// Remove and return the correction at `index`.
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` when `index >= len`.
    pub fn remove(&mut self, index: usize) -> Result<Correction> {
        if index >= self.items.len() {
            return Err(Error::index_out_of_range(index, self.items.len()));
        }
        Ok(self.items.remove(index))
    }

    /// Re-insert a correction at `index` (used by undo).
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` when `index > len`.
    pub fn insert(&mut self, index: usize, correction: Correction) -> Result<()> {
        if index > self.items.len() {
            return Err(Error::index_out_of_range(index, self.items.len()));
        }
        self.items.insert(index, correction);
        Ok(())
    }

    /// Shift every correction from `index` onward by `delta` bytes.
    ///
    /// Either every shifted span is updated or none is.
    ///
    /// # Errors
    /// Returns `ShiftOverflow` if any span would leave `usize` range.
    pub fn shift_from(&mut self, index: usize, delta: isize) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let tail = self.items.get(index..).unwrap_or_default();
        let shifted = tail
            .iter()
            .map(|c| {
                c.position.shifted(delta).ok_or(Error::ShiftOverflow {
                    start: c.position.start,
                    end: c.position.end,
                    delta,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if let Some(tail) = self.items.get_mut(index..) {
            for (correction, span) in tail.iter_mut().zip(shifted) {
                correction.position = span;
            }
        }
        Ok(())
    }

    /// Verify ordering, non-overlap, and bounds against a document length.
    ///
    /// # Errors
    /// Returns `InvariantViolation` describing the first broken rule.
    pub fn check_invariants(&self, document_len: usize) -> Result<()> {
        if let Some(c) = self
            .items
            .iter()
            .find(|c| c.position.start > c.position.end || c.position.end > document_len)
        {
            return Err(Error::invariant_violation(format!(
                "position {} outside document of length {document_len}",
                c.position
            )));
        }
        if let Some((a, b)) = self
            .items
            .iter()
            .tuple_windows()
            .find(|(a, b)| a.position.end > b.position.start)
        {
            return Err(Error::invariant_violation(format!(
                "position {} overlaps or precedes {}",
                b.position, a.position
            )));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a CorrectionSet {
    type Item = &'a Correction;
    type IntoIter = std::slice::Iter<'a, Correction>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
