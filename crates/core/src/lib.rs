#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # emend-core
//!
//! Shared data model for the emend correction pipeline.
//!
//! - [`Chunk`]: offset-tagged slice of the document sent in one completion call
//! - [`RawSuggestion`]: what the completion service returns (bare text pairs)
//! - [`Correction`]: a suggestion anchored to exact document offsets
//! - [`CorrectionSet`]: the ordered, non-overlapping live set under review
//! - [`CancelToken`]: cooperative cancellation threaded through every await

pub mod cancel;
pub mod correction_set;
pub mod error;
pub mod types;

pub use cancel::CancelToken;
pub use correction_set::CorrectionSet;
pub use error::{Error, Result};
pub use types::{Chunk, Correction, CorrectionKind, MatchResult, RawSuggestion, Span};
