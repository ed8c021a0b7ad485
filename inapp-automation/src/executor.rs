//! Retrying executor for pipeline stages.
//!
//! Stages are plain async operations returning an [`OperationResult`]; the
//! executor owns backoff and pausing. A retried stage is re-run on its own:
//! stages that already finished are not repeated.

use crate::config::AutomationConfig;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// Outcome of one attempt of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult<R> {
    /// The stage completed; move on to the next one.
    Finished,
    /// Run the stage again after backing off.
    Retry,
    /// Stop here and report `R`.
    Cancel(R),
}

/// Runs stages with exponential backoff.
#[derive(Debug)]
pub struct RetryingExecutor {
    initial_backoff: Duration,
    max_backoff: Duration,
    paused: watch::Sender<bool>,
}

impl RetryingExecutor {
    /// Creates an unpaused executor.
    #[must_use]
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            paused,
        }
    }

    /// Creates an executor with the configured backoff.
    #[must_use]
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self::new(config.initial_backoff, config.max_backoff)
    }

    /// Pauses or resumes. Paused executors start no new attempts; an
    /// attempt already running is not interrupted.
    pub fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Runs `operation` until it finishes or cancels.
    ///
    /// Returns `None` when the operation finished and `Some(r)` when it
    /// cancelled with `r`. Retries are unbounded.
    pub async fn execute<R, F, Fut>(&self, mut operation: F) -> Option<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OperationResult<R>>,
    {
        let mut backoff = self.initial_backoff;
        loop {
            self.wait_until_resumed().await;

            match operation().await {
                OperationResult::Finished => return None,
                OperationResult::Cancel(result) => return Some(result),
                OperationResult::Retry => {
                    trace!("Operation will retry in {:?}", backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }

    async fn wait_until_resumed(&self) {
        let mut paused = self.paused.subscribe();
        while *paused.borrow_and_update() {
            // The sender lives as long as `self`.
            if paused.changed().await.is_err() {
                return;
            }
        }
    }
}
