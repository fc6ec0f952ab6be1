//! Cooperative cancellation shared by the worker pool, retry delays, and
//! completion calls.
//!
//! A token is cheap to clone; every clone observes the same state. Once
//! cancelled it stays cancelled.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

/// Cancellation flag with an awaitable trigger.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a token that has not fired.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        let was_cancelled = self.state.send_replace(true);
        if !was_cancelled {
            debug!("Cancel token fired");
        }
    }

    /// Check whether the token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Return `Err(Cancelled)` if the token has fired.
    ///
    /// # Errors
    /// Returns `Error::Cancelled` once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the token fires. Resolves immediately if it already has.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
