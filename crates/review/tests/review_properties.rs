//! Property tests for the review session.

use emend_core::{Correction, CorrectionSet, RawSuggestion, Span};
use emend_review::{ReviewConfig, ReviewSession};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Accept { pick: usize, edited: Option<String> },
    Reject { pick: usize },
}

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::sample::select(vec!["teh", "cat", "sat", "on", "mat", "naïve", "x"]),
        1..20,
    )
    .prop_map(|w| w.into_iter().map(str::to_string).collect())
}

fn actions() -> impl Strategy<Value = Vec<Action>> {
    let action = prop_oneof![
        (
            0usize..32,
            prop::option::of(prop::sample::select(vec!["", "a", "longer text", "é"]))
        )
            .prop_map(|(pick, edited)| Action::Accept {
                pick,
                edited: edited.map(str::to_string),
            }),
        (0usize..32).prop_map(|pick| Action::Reject { pick }),
    ];
    prop::collection::vec(action, 0..16)
}

/// A document of space-separated words with a correction on every other word.
fn session_for(words: &[String]) -> Result<ReviewSession, emend_review::Error> {
    let document = words.join(" ");
    let mut corrections = Vec::new();
    let mut offset = 0;
    for (i, word) in words.iter().enumerate() {
        if i % 2 == 0 {
            corrections.push(Correction::exact(
                &RawSuggestion::new(word.as_str(), format!("{word}{word}")),
                Span::new(offset, offset + word.len()),
            ));
        }
        offset += word.len() + 1;
    }
    let mut session = ReviewSession::new(document, ReviewConfig::default())?;
    session.load(CorrectionSet::from_filtered(corrections))?;
    Ok(session)
}

proptest! {
    // Undoing every applied action restores document and corrections exactly.
    #[test]
    fn prop_undo_is_exact(words in words(), actions in actions()) {
        let mut session = session_for(&words).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let document_before = session.document().to_string();
        let corrections_before = session.corrections().clone();

        let mut applied = 0;
        for action in &actions {
            let len = session.corrections().len();
            if len == 0 {
                break;
            }
            let outcome = match action {
                Action::Accept { pick, edited } => session.accept(pick % len, edited.as_deref()),
                Action::Reject { pick } => session.reject(pick % len),
            };
            prop_assert!(outcome.is_ok());
            applied += 1;

            prop_assert!(session.corrections().check_invariants(session.document().len()).is_ok());
            prop_assert!(session.corrections().iter().all(|c| c.matches(session.document())));
        }

        for _ in 0..applied {
            let undone = session.undo().map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(undone.is_some());
        }

        prop_assert_eq!(session.document(), document_before.as_str());
        prop_assert_eq!(session.corrections(), &corrections_before);
        prop_assert_eq!(session.baseline(), document_before.as_str());
    }
}
