//! Overlap filtering for a merged correction list.
//!
//! Greedy earliest-start-wins: a correction is kept only if its span is
//! non-empty, has not been kept already, and starts at or after the end of
//! the last kept span.

use std::collections::HashSet;

use emend_core::Correction;
use serde::Serialize;
use tracing::{debug, warn};

/// Why a correction was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `start >= end`.
    Degenerate,
    /// Same `(start, end)` as a kept correction.
    Duplicate,
    /// Starts before the previous kept correction ends.
    Overlap,
}

/// A correction removed by [`filter_overlaps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedCorrection {
    pub correction: Correction,
    pub reason: DropReason,
}

/// Kept and dropped corrections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverlapOutcome {
    /// Sorted by start, pairwise non-overlapping.
    pub kept: Vec<Correction>,
    pub dropped: Vec<DroppedCorrection>,
}

/// Split `corrections` into a non-overlapping kept set and the rest.
///
/// Input is expected sorted by start; it is stably re-sorted first so an
/// unsorted list cannot produce overlapping output.
#[must_use]
pub fn filter_overlaps(mut corrections: Vec<Correction>) -> OverlapOutcome {
    corrections.sort_by_key(|c| c.position.start);

    let mut outcome = OverlapOutcome::default();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut last_end = 0;

    for correction in corrections {
        let span = correction.position;
        let reason = if span.start >= span.end {
            Some(DropReason::Degenerate)
        } else if seen.contains(&(span.start, span.end)) {
            Some(DropReason::Duplicate)
        } else if span.start < last_end {
            Some(DropReason::Overlap)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(
                    start = span.start,
                    end = span.end,
                    ?reason,
                    "Dropping correction"
                );
                outcome.dropped.push(DroppedCorrection { correction, reason });
            }
            None => {
                seen.insert((span.start, span.end));
                last_end = span.end;
                outcome.kept.push(correction);
            }
        }
    }

    if !outcome.dropped.is_empty() {
        warn!(
            kept = outcome.kept.len(),
            dropped = outcome.dropped.len(),
            "Overlapping or invalid corrections removed"
        );
    }
    outcome
}
