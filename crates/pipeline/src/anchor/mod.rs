//! Anchoring of service suggestions onto chunk offsets.
//!
//! The service returns plain `(original, corrected)` pairs. Resolution runs
//! two strategies over one chunk:
//!
//! 1. An ordered pass that walks a monotonic cursor through the text, so
//!    repeated phrases land on successive occurrences.
//! 2. A recovery pass for whatever the first pass missed, without the
//!    cursor, skipping text another suggestion already claimed.
//!
//! Exact substring search is always tried first. The edit-distance search
//! in [`fuzzy`] only runs on a miss, and a fuzzy hit adopts the document's
//! own text as the correction's `original` so the anchor stays sound.

pub mod fuzzy;

use emend_core::{Correction, MatchResult, RawSuggestion, Span};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use self::fuzzy::{FuzzyMatch, distance_within, find_fuzzy};

/// Edit distance accepted by the fuzzy search.
pub const DEFAULT_MAX_DISTANCE: usize = 2;

/// Tuning for [`AnchorResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Largest edit distance a fuzzy candidate may have.
    pub max_distance: usize,
    /// Bytes before the cursor included in the first fuzzy window.
    pub window_before: usize,
    /// Bytes after the cursor included in the first fuzzy window.
    pub window_after: usize,
    /// Shorter targets are only matched exactly.
    pub min_fuzzy_chars: usize,
    /// Longer targets are only matched exactly.
    pub max_fuzzy_chars: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
            window_before: 64,
            window_after: 1500,
            min_fuzzy_chars: 4,
            max_fuzzy_chars: 400,
        }
    }
}

impl AnchorConfig {
    /// Disable fuzzy matching entirely.
    #[must_use]
    pub const fn exact_only(mut self) -> Self {
        self.max_distance = 0;
        self
    }

    /// Set the edit-distance budget.
    #[must_use]
    pub const fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = max_distance;
        self
    }

    fn allows_fuzzy(&self, target: &str) -> bool {
        if self.max_distance == 0 {
            return false;
        }
        let chars = target.chars().count();
        chars >= self.min_fuzzy_chars && chars <= self.max_fuzzy_chars
    }
}

/// Where a suggestion landed, in chunk-local offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    input: usize,
    correction: Correction,
}

/// Result of the ordered pass.
#[derive(Debug, Default)]
struct OrderedOutcome {
    anchors: Vec<Anchor>,
    leftover: Vec<usize>,
}

/// Result of the recovery pass.
#[derive(Debug, Default)]
struct RecoveryOutcome {
    anchors: Vec<Anchor>,
    unmatched: Vec<usize>,
    duplicates: usize,
}

/// Maps raw suggestions onto exact offsets in a chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorResolver {
    config: AnchorConfig,
}

impl AnchorResolver {
    #[must_use]
    pub const fn new(config: AnchorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Anchor `suggestions` in `text`, shifting positions by `base_offset`
    /// into document coordinates.
    ///
    /// `mapped` comes back sorted by start. Unmatched suggestions keep their
    /// input order.
    #[must_use]
    pub fn resolve(
        &self,
        suggestions: &[RawSuggestion],
        text: &str,
        base_offset: usize,
    ) -> MatchResult {
        let ordered = self.ordered_pass(suggestions, text);
        let mut claimed: Vec<Span> = ordered
            .anchors
            .iter()
            .map(|a| a.correction.position)
            .collect();
        let recovered = self.recovery_pass(suggestions, &ordered.leftover, text, &mut claimed);

        debug!(
            suggestions = suggestions.len(),
            ordered = ordered.anchors.len(),
            recovered = recovered.anchors.len(),
            unmatched = recovered.unmatched.len(),
            duplicates = recovered.duplicates,
            base_offset,
            "Anchored chunk suggestions"
        );

        let mut mapped: Vec<Correction> = ordered
            .anchors
            .into_iter()
            .chain(recovered.anchors)
            .map(|anchor| {
                let mut correction = anchor.correction;
                correction.position = correction.position.offset_by(base_offset);
                correction
            })
            .collect();
        mapped.sort_by_key(|c| c.position.start);

        let unmatched = recovered
            .unmatched
            .into_iter()
            .filter_map(|index| suggestions.get(index).cloned())
            .collect();

        MatchResult {
            mapped,
            unmatched,
            duplicates: recovered.duplicates,
        }
    }

    /// Walk the suggestions in order with a cursor that never moves back.
    fn ordered_pass(&self, suggestions: &[RawSuggestion], text: &str) -> OrderedOutcome {
        let mut outcome = OrderedOutcome::default();
        let mut claimed: Vec<Span> = Vec::new();
        let mut cursor = 0;

        for (input, suggestion) in suggestions.iter().enumerate() {
            if !suggestion.is_anchorable() {
                outcome.leftover.push(input);
                continue;
            }
            let original = suggestion.original.as_str();

            let exact = text
                .get(cursor..)
                .and_then(|rest| rest.find(original))
                .map(|offset| Span::new(cursor + offset, cursor + offset + original.len()));

            let correction = exact
                .map(|span| Correction::exact(suggestion, span))
                .or_else(|| self.fuzzy_near(suggestion, text, cursor, &claimed));

            match correction {
                Some(correction) => {
                    trace!(
                        input,
                        start = correction.position.start,
                        fuzzy = correction.fuzzy,
                        "Ordered pass anchored suggestion"
                    );
                    cursor = cursor.max(correction.position.end);
                    claimed.push(correction.position);
                    outcome.anchors.push(Anchor { input, correction });
                }
                None => outcome.leftover.push(input),
            }
        }
        outcome
    }

    /// Retry leftovers anywhere in the text, avoiding claimed spans.
    fn recovery_pass(
        &self,
        suggestions: &[RawSuggestion],
        leftover: &[usize],
        text: &str,
        claimed: &mut Vec<Span>,
    ) -> RecoveryOutcome {
        let mut outcome = RecoveryOutcome::default();

        for &input in leftover {
            let Some(suggestion) = suggestions.get(input) else {
                continue;
            };
            if !suggestion.is_anchorable() {
                outcome.unmatched.push(input);
                continue;
            }
            let original = suggestion.original.as_str();

            let occurrences: Vec<Span> = text
                .match_indices(original)
                .map(|(start, found)| Span::new(start, start + found.len()))
                .collect();

            if let Some(&span) = occurrences.iter().find(|span| is_unclaimed(claimed, **span)) {
                claim(&mut outcome, claimed, input, Correction::exact(suggestion, span));
                continue;
            }
            if occurrences.iter().any(|span| claimed.contains(span)) {
                debug!(input, original, "Discarding suggestion for already anchored text");
                outcome.duplicates += 1;
                continue;
            }
            // Every occurrence straddles a claimed span. Emit it unclaimed so
            // the overlap filter reports it as dropped.
            if let Some(&span) = occurrences.first() {
                debug!(
                    input,
                    original,
                    start = span.start,
                    "Anchored suggestion overlaps claimed text"
                );
                outcome.anchors.push(Anchor {
                    input,
                    correction: Correction::exact(suggestion, span),
                });
                continue;
            }

            match self.fuzzy_anywhere(suggestion, text, claimed) {
                Some(correction) => claim(&mut outcome, claimed, input, correction),
                None => outcome.unmatched.push(input),
            }
        }
        outcome
    }

    /// Fuzzy search around the cursor, then across the whole text.
    fn fuzzy_near(
        &self,
        suggestion: &RawSuggestion,
        text: &str,
        cursor: usize,
        claimed: &[Span],
    ) -> Option<Correction> {
        let window =
            cursor.saturating_sub(self.config.window_before)..cursor.saturating_add(self.config.window_after);
        self.fuzzy_in(suggestion, text, window, claimed)
            .or_else(|| self.fuzzy_anywhere(suggestion, text, claimed))
    }

    fn fuzzy_anywhere(
        &self,
        suggestion: &RawSuggestion,
        text: &str,
        claimed: &[Span],
    ) -> Option<Correction> {
        self.fuzzy_in(suggestion, text, 0..text.len(), claimed)
    }

    fn fuzzy_in(
        &self,
        suggestion: &RawSuggestion,
        text: &str,
        range: std::ops::Range<usize>,
        claimed: &[Span],
    ) -> Option<Correction> {
        let original = suggestion.original.as_str();
        if !self.config.allows_fuzzy(original) {
            return None;
        }
        let budget = self.config.max_distance;
        let FuzzyMatch { span, distance } =
            find_fuzzy(text, original, range, budget, |span| is_unclaimed(claimed, span))?;

        // Re-check the chosen slice before adopting it.
        let actual = text.get(span.start..span.end)?;
        distance_within(original, actual, budget)?;

        if actual == original {
            return Some(Correction::exact(suggestion, span));
        }
        debug!(
            reported = original,
            actual,
            distance,
            start = span.start,
            "Fuzzy anchored suggestion"
        );
        Some(Correction::fuzzy(suggestion, span, actual))
    }
}

fn claim(outcome: &mut RecoveryOutcome, claimed: &mut Vec<Span>, input: usize, correction: Correction) {
    trace!(
        input,
        start = correction.position.start,
        fuzzy = correction.fuzzy,
        "Recovery pass anchored suggestion"
    );
    claimed.push(correction.position);
    outcome.anchors.push(Anchor { input, correction });
}

fn is_unclaimed(claimed: &[Span], span: Span) -> bool {
    !claimed.iter().any(|c| c.overlaps(&span))
}

/// Anchor with the default configuration.
#[must_use]
pub fn resolve_anchors(suggestions: &[RawSuggestion], text: &str, base_offset: usize) -> MatchResult {
    AnchorResolver::default().resolve(suggestions, text, base_offset)
}

#[cfg(test)]
mod tests {
    use emend_core::CorrectionKind;

    use super::*;

    fn positions(result: &MatchResult) -> Vec<(usize, usize)> {
        result
            .mapped
            .iter()
            .map(|c| (c.position.start, c.position.end))
            .collect()
    }

    #[test]
    fn test_exact_match_at_start() {
        let text = "Teh cat sat.";
        let result = resolve_anchors(&[RawSuggestion::new("Teh", "The")], text, 0);

        assert_eq!(positions(&result), vec![(0, 3)]);
        assert!(result.unmatched.is_empty());
        assert!(result.mapped.iter().all(|c| c.matches(text)));
    }

    #[test]
    fn test_repeated_original_maps_to_successive_occurrences() {
        let text = "the cat saw the dog";
        let suggestions = [RawSuggestion::new("the", "a"), RawSuggestion::new("the", "one")];
        let result = resolve_anchors(&suggestions, text, 0);

        assert_eq!(positions(&result), vec![(0, 3), (12, 15)]);
        let corrected: Vec<&str> = result.mapped.iter().map(|c| c.corrected.as_str()).collect();
        assert_eq!(corrected, vec!["a", "one"]);
    }

    #[test]
    fn test_one_char_noise_is_fuzzy_matched() -> Result<(), String> {
        let text = "The experiment yielded surprising results.";
        let result = resolve_anchors(&[RawSuggestion::new("experimant", "experiment")], text, 0);

        let Some(correction) = result.mapped.first() else {
            return Err("expected a fuzzy anchor".to_string());
        };
        assert_eq!((correction.position.start, correction.position.end), (4, 14));
        assert!(correction.fuzzy);
        assert_eq!(correction.original, "experiment");
        assert_eq!(correction.reported_original.as_deref(), Some("experimant"));
        assert!(correction.matches(text));
        Ok(())
    }

    #[test]
    fn test_five_char_noise_is_unmatched() {
        let text = "The experiment yielded surprising results.";
        let suggestion = RawSuggestion::new("exqxxxxnt", "experiment");
        let result = resolve_anchors(std::slice::from_ref(&suggestion), text, 0);

        assert!(result.mapped.is_empty());
        assert_eq!(result.unmatched, vec![suggestion]);
    }

    #[test]
    fn test_empty_original_is_unmatched() {
        let result = resolve_anchors(&[RawSuggestion::new("", "x")], "anything", 0);
        assert!(result.mapped.is_empty());
        assert_eq!(result.unmatched.len(), 1);
    }

    #[test]
    fn test_out_of_order_suggestions_are_recovered() {
        let text = "alpha beta gamma";
        let suggestions = [
            RawSuggestion::new("gamma", "GAMMA"),
            RawSuggestion::new("alpha", "ALPHA"),
        ];
        let resolver = AnchorResolver::new(AnchorConfig::default().exact_only());

        let ordered = resolver.ordered_pass(&suggestions, text);
        assert_eq!(ordered.anchors.len(), 1);
        assert_eq!(ordered.leftover, vec![1]);

        let result = resolver.resolve(&suggestions, text, 0);
        assert_eq!(positions(&result), vec![(0, 5), (11, 16)]);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_recovery_pass_skips_claimed_spans() {
        let text = "one two one";
        let suggestions = [RawSuggestion::new("one", "1")];
        let resolver = AnchorResolver::default();
        let mut claimed = vec![Span::new(0, 3)];

        let outcome = resolver.recovery_pass(&suggestions, &[0], text, &mut claimed);

        assert_eq!(outcome.anchors.len(), 1);
        assert_eq!(
            outcome.anchors.first().map(|a| a.correction.position),
            Some(Span::new(8, 11))
        );
        assert_eq!(claimed.len(), 2);
    }

    #[test]
    fn test_duplicate_of_claimed_text_is_discarded() {
        let text = "tail end";
        let suggestions = [
            RawSuggestion::new("end", "finish"),
            RawSuggestion::new("end", "stop"),
        ];
        let result = resolve_anchors(&suggestions, text, 0);

        assert_eq!(positions(&result), vec![(5, 8)]);
        assert_eq!(result.duplicates, 1);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_partially_overlapping_edit_is_kept_for_overlap_filter() {
        let text = "teh cat sat";
        let suggestions = [
            RawSuggestion::new("teh cat", "the cat"),
            RawSuggestion::new("cat sat", "cat sits"),
        ];
        let result = resolve_anchors(&suggestions, text, 0);

        assert_eq!(positions(&result), vec![(0, 7), (4, 11)]);
        assert_eq!(result.duplicates, 0);
        assert!(result.unmatched.is_empty());
        assert!(result.mapped.iter().all(|c| c.matches(text)));

        let outcome = crate::overlap::filter_overlaps(result.mapped);
        assert_eq!(outcome.kept.len(), 1);
        let dropped: Vec<(&str, crate::overlap::DropReason)> = outcome
            .dropped
            .iter()
            .map(|d| (d.correction.corrected.as_str(), d.reason))
            .collect();
        assert_eq!(dropped, vec![("cat sits", crate::overlap::DropReason::Overlap)]);
    }

    #[test]
    fn test_base_offset_shifts_into_document_coordinates() {
        let document = "prefix. Teh cat sat.";
        let chunk = &document[8..];
        let result = resolve_anchors(&[RawSuggestion::new("Teh", "The")], chunk, 8);

        assert_eq!(positions(&result), vec![(8, 11)]);
        assert!(result.mapped.iter().all(|c| c.matches(document)));
    }

    #[test]
    fn test_mapped_is_sorted_by_start() {
        let text = "a b c d e";
        let suggestions = [
            RawSuggestion::new("d", "D"),
            RawSuggestion::new("b", "B"),
            RawSuggestion::new("e", "E"),
        ];
        let result = resolve_anchors(&suggestions, text, 0);

        let starts: Vec<usize> = result.mapped.iter().map(|c| c.position.start).collect();
        assert_eq!(starts, vec![2, 6, 8]);
    }

    #[test]
    fn test_short_targets_are_exact_only() {
        let text = "cat hat";
        let result = resolve_anchors(&[RawSuggestion::new("cot", "cut")], text, 0);
        assert!(result.mapped.is_empty());
        assert_eq!(result.unmatched.len(), 1);
    }

    #[test]
    fn test_comment_keeps_original_text() {
        let text = "Consider rephrasing this sentence.";
        let suggestion = RawSuggestion::new("rephrasing", "anything")
            .with_kind(CorrectionKind::Comment);
        let result = resolve_anchors(&[suggestion], text, 0);

        assert_eq!(
            result.mapped.first().map(|c| c.corrected.as_str()),
            Some("rephrasing")
        );
    }
}
