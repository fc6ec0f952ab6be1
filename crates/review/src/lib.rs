#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Emend Review - accept, reject, and undo corrections on a live document.
//!
//! [`ReviewSession`] is the only mutator of the document buffer and its
//! [`CorrectionSet`](emend_core::CorrectionSet). Every accept or reject is
//! recorded in a bounded [`UndoLedger`]; undo restores the document and the
//! set byte for byte.

pub mod error;
pub mod ledger;
pub mod session;

pub use error::{Error, Result};
pub use ledger::{DEFAULT_LEDGER_CAPACITY, UndoEntry, UndoLedger};
pub use session::{ReviewConfig, ReviewSession, UndoneAction};
