//! # Timing Primitives
//!
//! Every wait in the procedure goes through a [`Clock`], and every budget is an
//! explicit [`Deadline`] value handed to the loop that honours it. Nothing keeps
//! timing state in globals.
//!
//! [`TokioClock`] is backed by `tokio::time`, so tests running on a paused
//! runtime (`#[tokio::test(start_paused = true)]`) drive every timeout boundary
//! deterministically without real sleeps.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Monotonic time source and sleeper
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Absolute wake-time for a bounded wait, measured from the step that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started_at: Instant,
    expires_at: Instant,
}

impl Deadline {
    /// Start a budget of `budget` at the clock's current instant
    pub fn after(clock: &dyn Clock, budget: Duration) -> Self {
        let started_at = clock.now();
        Self {
            started_at,
            expires_at: started_at + budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.expires_at - self.started_at
    }

    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_duration_since(self.started_at)
    }

    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.expires_at.saturating_duration_since(clock.now())
    }

    /// True once elapsed time has reached the budget
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.expires_at
    }
}
