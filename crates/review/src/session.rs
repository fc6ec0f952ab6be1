//! Live document review.
//!
//! A [`ReviewSession`] owns the document buffer, the baseline captured when
//! the session started, the pending corrections, and the undo ledger.
//! Accepting a correction splices its text into the document and shifts
//! every later correction by the length change; undo reverses that exactly.

use emend_core::{Correction, CorrectionSet};
use emend_diff::{DiffBlock, DiffStats, WordDiff, aligned_blocks, line_diff, word_diff};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ledger::{DEFAULT_LEDGER_CAPACITY, UndoEntry, UndoLedger};

/// Review settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Undoable operations kept.
    pub ledger_capacity: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

impl ReviewConfig {
    #[must_use]
    pub const fn with_ledger_capacity(ledger_capacity: usize) -> Self {
        Self { ledger_capacity }
    }

    /// Reject a zero capacity.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when `ledger_capacity` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.ledger_capacity == 0 {
            return Err(Error::invalid_config("ledger_capacity must be greater than zero"));
        }
        Ok(())
    }
}

/// What an [`ReviewSession::undo`] reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UndoneAction {
    Accept { index: usize },
    Reject { index: usize },
}

/// Document buffer plus pending corrections and undo history.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    document: String,
    baseline: String,
    corrections: CorrectionSet,
    ledger: UndoLedger,
}

impl ReviewSession {
    /// Start a session over `document`, which also becomes the baseline.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(document: impl Into<String>, config: ReviewConfig) -> Result<Self> {
        config.validate()?;
        let document = document.into();
        Ok(Self {
            baseline: document.clone(),
            document,
            corrections: CorrectionSet::new(),
            ledger: UndoLedger::with_capacity(config.ledger_capacity),
        })
    }

    /// Install corrections from a pipeline run and clear the undo history.
    ///
    /// Entries whose span no longer matches the document are skipped, as are
    /// empty spans, repeated spans, and spans that start before the previous
    /// installed one ends (earliest start wins). Returns how many were
    /// installed.
    ///
    /// # Errors
    /// Returns `Core(InvariantViolation)` if the surviving set is still
    /// inconsistent with the document; the session is left unchanged.
    pub fn load(&mut self, corrections: CorrectionSet) -> Result<usize> {
        let total = corrections.len();
        let mut last_end = 0;
        let mut valid: Vec<Correction> = Vec::with_capacity(total);

        let mut items = corrections.into_vec();
        items.sort_by_key(|c| c.position.start);
        for correction in items {
            let span = correction.position;
            let skip = if !correction.matches(&self.document) {
                Some("does not match the document")
            } else if span.start >= span.end {
                Some("is empty")
            } else if span.start < last_end {
                Some("overlaps an earlier correction")
            } else {
                None
            };

            match skip {
                Some(reason) => warn!(
                    start = span.start,
                    end = span.end,
                    reason,
                    "Skipping correction"
                ),
                None => {
                    last_end = span.end;
                    valid.push(correction);
                }
            }
        }

        let set = CorrectionSet::from_filtered(valid);
        set.check_invariants(self.document.len())?;

        debug!(loaded = set.len(), skipped = total - set.len(), "Loaded corrections");
        let loaded = set.len();
        self.corrections = set;
        self.ledger.clear();
        Ok(loaded)
    }

    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    #[must_use]
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    #[must_use]
    pub const fn corrections(&self) -> &CorrectionSet {
        &self.corrections
    }

    #[must_use]
    pub const fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    fn checked(&self, index: usize) -> Result<&Correction> {
        let correction = self
            .corrections
            .get(index)
            .ok_or(Error::NoSuchCorrection {
                index,
                len: self.corrections.len(),
            })?;
        if !correction.matches(&self.document) {
            return Err(Error::StaleSpan {
                index,
                start: correction.position.start,
                end: correction.position.end,
            });
        }
        Ok(correction)
    }

    /// Apply the correction at `index`, using `edited` in place of its
    /// `corrected` text when given. Comments are resolved without touching
    /// the document.
    ///
    /// # Errors
    /// Returns `NoSuchCorrection` for a bad index or `StaleSpan` if the
    /// document no longer holds the correction's original text.
    pub fn accept(&mut self, index: usize, edited: Option<&str>) -> Result<()> {
        let correction = self.checked(index)?;
        let span = correction.position;
        let old_text = correction.original.clone();
        let new_text = if correction.is_comment() {
            old_text.clone()
        } else {
            edited.unwrap_or(&correction.corrected).to_string()
        };
        let length_diff = new_text.len() as isize - old_text.len() as isize;

        let correction = self.corrections.remove(index)?;
        if let Err(err) = self.corrections.shift_from(index, length_diff) {
            self.corrections.insert(index, correction)?;
            return Err(err.into());
        }
        self.document.replace_range(span.start..span.end, &new_text);

        debug!(index, start = span.start, length_diff, "Accepted correction");
        self.ledger.push(UndoEntry::Accept {
            index,
            start: span.start,
            old_text,
            new_text,
            length_diff,
            correction,
        });
        Ok(())
    }

    /// Dismiss the correction at `index` without changing the document.
    ///
    /// # Errors
    /// Returns `NoSuchCorrection` for a bad index.
    pub fn reject(&mut self, index: usize) -> Result<()> {
        let correction = self.corrections.remove(index).map_err(|_| Error::NoSuchCorrection {
            index,
            len: self.corrections.len(),
        })?;
        debug!(index, "Rejected correction");
        self.ledger.push(UndoEntry::Reject { index, correction });
        Ok(())
    }

    /// Accept every pending correction in document order. Returns how many
    /// were applied.
    ///
    /// # Errors
    /// Stops at the first correction that cannot be applied.
    pub fn accept_all(&mut self) -> Result<usize> {
        let mut applied = 0;
        while !self.corrections.is_empty() {
            self.accept(0, None)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Reverse the most recent accept or reject. `Ok(None)` when there is
    /// nothing left to undo.
    ///
    /// # Errors
    /// Returns `Core` if the recorded splice cannot be reversed, which only
    /// happens if the document was changed outside this session; the entry
    /// stays on the ledger.
    pub fn undo(&mut self) -> Result<Option<UndoneAction>> {
        let Some(entry) = self.ledger.pop() else {
            debug!("Nothing to undo");
            return Ok(None);
        };
        match self.reverse(&entry) {
            Ok(action) => Ok(Some(action)),
            Err(err) => {
                self.ledger.restore(entry);
                Err(err)
            }
        }
    }

    fn reverse(&mut self, entry: &UndoEntry) -> Result<UndoneAction> {
        match entry {
            UndoEntry::Reject { index, correction } => {
                self.corrections.insert(*index, correction.clone())?;
                debug!(index, "Undid reject");
                Ok(UndoneAction::Reject { index: *index })
            }
            UndoEntry::Accept {
                index,
                start,
                old_text,
                new_text,
                length_diff,
                correction,
            } => {
                let (index, start) = (*index, *start);
                let end = start + new_text.len();
                if self.document.get(start..end) != Some(new_text.as_str()) {
                    return Err(
                        emend_core::Error::span_out_of_bounds(start, end, self.document.len())
                            .into(),
                    );
                }
                if index > self.corrections.len() {
                    return Err(
                        emend_core::Error::index_out_of_range(index, self.corrections.len())
                            .into(),
                    );
                }
                self.corrections.shift_from(index, -length_diff)?;
                self.document.replace_range(start..end, old_text);
                self.corrections.insert(index, correction.clone())?;
                debug!(index, start, length_diff, "Undid accept");
                Ok(UndoneAction::Accept { index })
            }
        }
    }

    /// Replace the document, re-capture the baseline, and drop all
    /// corrections and history.
    pub fn reset(&mut self, document: impl Into<String>) {
        self.document = document.into();
        self.baseline.clone_from(&self.document);
        self.corrections = CorrectionSet::new();
        self.ledger.clear();
        debug!(document_len = self.document.len(), "Review session reset");
    }

    /// Baseline versus current document, as aligned blocks.
    #[must_use]
    pub fn document_diff(&self) -> Vec<DiffBlock> {
        aligned_blocks(&self.baseline, &self.document)
    }

    /// Line counts for the baseline versus current document.
    #[must_use]
    pub fn document_stats(&self) -> DiffStats {
        DiffStats::from_ops(&line_diff(&self.baseline, &self.document))
    }

    /// Word diff of one pending correction.
    ///
    /// # Errors
    /// Returns `NoSuchCorrection` for a bad index.
    pub fn correction_diff(&self, index: usize) -> Result<WordDiff> {
        let correction = self
            .corrections
            .get(index)
            .ok_or(Error::NoSuchCorrection {
                index,
                len: self.corrections.len(),
            })?;
        Ok(word_diff(&correction.original, &correction.corrected))
    }
}
