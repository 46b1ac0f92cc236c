//! # Convergence Poller
//!
//! The wait primitive behind every escalation phase: re-query a resource set
//! until it comes back empty or the [`Deadline`] passes.
//!
//! The loop is an explicit `Polling -> Converged | TimedOut` state machine. A
//! settling delay precedes the first query so that commands dispatched just
//! before the poll have time to take effect.
//!
//! ```rust
//! use cluster_shutdown::models::ResourceSet;
//! use cluster_shutdown::shutdown::ConvergencePoller;
//! use cluster_shutdown::timing::{Deadline, TokioClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let retry = Duration::from_secs(10);
//! let poller = ConvergencePoller::new(Arc::new(TokioClock), Duration::ZERO, retry);
//! let deadline = Deadline::after(&TokioClock, Duration::from_secs(60));
//! let outcome = poller
//!     .poll_until_empty("already stopped", deadline, || async { Ok(ResourceSet::empty()) })
//!     .await?;
//! assert!(outcome.converged());
//! # Ok::<(), cluster_shutdown::ShutdownError>(())
//! # }).unwrap();
//! ```

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::ResourceSet;
use crate::timing::{Clock, Deadline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Converged,
    TimedOut,
}

impl PollState {
    /// Next state after observing `remaining`
    pub fn advance(remaining: &ResourceSet, deadline_expired: bool) -> Self {
        if remaining.is_empty() {
            Self::Converged
        } else if deadline_expired {
            Self::TimedOut
        } else {
            Self::Polling
        }
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub state: PollState,
    /// Listing calls made
    pub attempts: u32,
    /// "Not yet converged" iterations, each followed by a retry sleep
    pub retries: u32,
    /// Resources still present at the final query
    pub remaining: usize,
    pub elapsed: Duration,
}

impl PollOutcome {
    pub fn converged(&self) -> bool {
        self.state == PollState::Converged
    }
}

#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    clock: Arc<dyn Clock>,
    settle_delay: Duration,
    retry_interval: Duration,
}

impl ConvergencePoller {
    pub fn new(clock: Arc<dyn Clock>, settle_delay: Duration, retry_interval: Duration) -> Self {
        Self {
            clock,
            settle_delay,
            retry_interval,
        }
    }

    /// Poll `list` until it returns an empty set or `deadline` passes.
    ///
    /// A timeout is reported through [`PollOutcome::state`], never as an error.
    /// Only a failing `list` call produces `Err`, since without authoritative
    /// resource state the procedure cannot continue.
    pub async fn poll_until_empty<F, Fut>(
        &self,
        label: &str,
        deadline: Deadline,
        mut list: F,
    ) -> Result<PollOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ResourceSet>>,
    {
        let clock = self.clock.as_ref();
        let mut attempts = 0u32;
        let mut retries = 0u32;

        debug!(
            label = %label,
            budget_secs = deadline.budget().as_secs(),
            settle_secs = self.settle_delay.as_secs(),
            "POLLER: settling before first check"
        );
        clock.sleep(self.settle_delay).await;

        loop {
            attempts += 1;
            let remaining = list().await?;

            match PollState::advance(&remaining, deadline.is_expired(clock)) {
                PollState::Polling => {
                    retries += 1;
                    info!(
                        label = %label,
                        outstanding = remaining.len(),
                        elapsed_secs = deadline.elapsed(clock).as_secs(),
                        budget_secs = deadline.budget().as_secs(),
                        "⏳ POLLER: not yet converged"
                    );
                    clock.sleep(self.retry_interval).await;
                }
                state => {
                    let outcome = PollOutcome {
                        state,
                        attempts,
                        retries,
                        remaining: remaining.len(),
                        elapsed: deadline.elapsed(clock),
                    };
                    if outcome.converged() {
                        info!(
                            label = %label,
                            attempts,
                            elapsed_secs = outcome.elapsed.as_secs(),
                            "✅ POLLER: converged"
                        );
                    } else {
                        info!(
                            label = %label,
                            attempts,
                            outstanding = outcome.remaining,
                            elapsed_secs = outcome.elapsed.as_secs(),
                            "⌛ POLLER: timed out with resources outstanding"
                        );
                    }
                    return Ok(outcome);
                }
            }
        }
    }
}
