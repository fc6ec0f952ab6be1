//! Bounded-concurrency worker pool.
//!
//! Runs at most `concurrency` worker futures at once on the calling task,
//! starting the next queued item as soon as one settles. Results come back
//! in input order. The pool fails as a whole on the first worker error or on
//! cancellation; workers that need partial-failure semantics encode failure
//! in their `Ok` value.

use std::fmt;
use std::future::Future;

use emend_core::CancelToken;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

/// Progress after each settled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolProgress {
    /// Items settled so far.
    pub completed: usize,
    /// Items submitted.
    pub total: usize,
}

/// Callback invoked with progress updates.
pub type ProgressFn<'a> = &'a (dyn Fn(PoolProgress) + Send + Sync);

/// Options for [`run_pool`].
#[derive(Clone)]
pub struct PoolOptions<'a> {
    /// Maximum items in flight; treated as at least 1.
    pub concurrency: usize,
    /// Stops the pool when fired.
    pub cancel: CancelToken,
    /// Called after each item settles.
    pub on_progress: Option<ProgressFn<'a>>,
}

impl<'a> PoolOptions<'a> {
    /// Options with no progress callback.
    #[must_use]
    pub const fn new(concurrency: usize, cancel: CancelToken) -> Self {
        Self {
            concurrency,
            cancel,
            on_progress: None,
        }
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressFn<'a>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

impl fmt::Debug for PoolOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("concurrency", &self.concurrency)
            .field("cancel", &self.cancel)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Why a pool run failed.
#[derive(Debug)]
pub enum PoolError<E> {
    /// The cancel token fired. No new items were started after it did.
    Cancelled,
    /// A worker returned an error.
    Worker { index: usize, source: E },
}

impl<E: fmt::Display> fmt::Display for PoolError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("worker pool cancelled"),
            Self::Worker { index, source } => write!(f, "item {index} failed: {source}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for PoolError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cancelled => None,
            Self::Worker { source, .. } => Some(source),
        }
    }
}

async fn indexed<F: Future>(index: usize, future: F) -> (usize, F::Output) {
    (index, future.await)
}

/// Run `worker` over `items` with bounded concurrency.
///
/// `worker` receives each item with its input index. The returned vector
/// lines up with `items`.
///
/// # Errors
/// Returns `PoolError::Cancelled` if the token fires before every item
/// settles, or `PoolError::Worker` for the first worker error. Settled
/// results are discarded in both cases.
pub async fn run_pool<T, R, E, F, Fut>(
    items: Vec<T>,
    worker: F,
    options: PoolOptions<'_>,
) -> Result<Vec<R>, PoolError<E>>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = items.len();
    let concurrency = options.concurrency.max(1);
    let cancel = &options.cancel;

    if cancel.is_cancelled() {
        return Err(PoolError::Cancelled);
    }

    let mut queue = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();
    for (index, item) in queue.by_ref().take(concurrency) {
        in_flight.push(indexed(index, worker(index, item)));
    }

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut completed = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(completed, total, "Worker pool cancelled");
                return Err(PoolError::Cancelled);
            }
            next = in_flight.next() => next,
        };
        let Some((index, outcome)) = next else {
            break;
        };

        let value = outcome.map_err(|source| PoolError::Worker { index, source })?;
        if let Some(slot) = results.get_mut(index) {
            *slot = Some(value);
        }
        completed += 1;
        if let Some(on_progress) = options.on_progress {
            on_progress(PoolProgress { completed, total });
        }

        if let Some((index, item)) = queue.next() {
            in_flight.push(indexed(index, worker(index, item)));
        }
    }

    Ok(results.into_iter().flatten().collect())
}
