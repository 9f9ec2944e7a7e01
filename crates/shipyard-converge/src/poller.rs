//! Generic convergence polling.
//!
//! `ConvergencePoller` repeatedly runs a check against remote state until
//! the check reports convergence, the time (or attempt) budget runs out, or
//! the caller cancels. The outcome always carries the last observed state so
//! that failures can say what the system looked like when we gave up.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::error::{OrchestrationError, OrchestrationResult};

/// Checks never run more often than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Interval and budget for one convergence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    timeout: Duration,
    max_attempts: Option<u32>,
}

impl PollConfig {
    /// Intervals below `MIN_POLL_INTERVAL` are raised to it.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            timeout,
            max_attempts: None,
        }
    }

    /// Also stop after this many checks, whichever budget runs out first.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(600))
    }
}

/// One check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceSample<S> {
    pub converged: bool,
    pub state: S,
}

impl<S> ConvergenceSample<S> {
    pub fn new(converged: bool, state: S) -> Self {
        Self { converged, state }
    }

    pub fn converged(state: S) -> Self {
        Self::new(true, state)
    }

    pub fn pending(state: S) -> Self {
        Self::new(false, state)
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Converged,
    TimedOut,
    Cancelled,
}

/// Result of a convergence wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceOutcome<S> {
    pub status: PollStatus,
    /// State reported by the final check. `None` only when cancelled before
    /// the first check ran.
    pub last_observed: Option<S>,
    pub elapsed: Duration,
    pub attempts: u32,
}

impl<S> ConvergenceOutcome<S> {
    pub fn succeeded(&self) -> bool {
        self.status == PollStatus::Converged
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> ConvergenceOutcome<T> {
        ConvergenceOutcome {
            status: self.status,
            last_observed: self.last_observed.map(f),
            elapsed: self.elapsed,
            attempts: self.attempts,
        }
    }
}

impl<S: fmt::Display> ConvergenceOutcome<S> {
    fn describe_last(&self) -> String {
        self.last_observed
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "nothing observed".to_string())
    }

    /// Turn a timed-out or cancelled outcome into the matching error.
    pub fn require(self, resource: &str, operation: &str) -> OrchestrationResult<Self> {
        match self.status {
            PollStatus::Converged => Ok(self),
            PollStatus::TimedOut => Err(OrchestrationError::ProvisioningTimeout {
                resource: resource.to_string(),
                operation: operation.to_string(),
                last_observed: self.describe_last(),
                elapsed: self.elapsed,
            }),
            PollStatus::Cancelled => Err(OrchestrationError::Cancelled {
                resource: resource.to_string(),
                operation: operation.to_string(),
                last_observed: self.describe_last(),
            }),
        }
    }
}

/// Runs checks until convergence, budget exhaustion, or cancellation.
#[derive(Debug, Clone, Default)]
pub struct ConvergencePoller {
    config: PollConfig,
    cancel: CancelSignal,
}

impl ConvergencePoller {
    pub fn new(config: PollConfig, cancel: CancelSignal) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `check` until it reports convergence.
    ///
    /// The first check runs immediately. Check errors end the wait and are
    /// returned as-is; timeouts and cancellation are reported through the
    /// outcome's status instead, so callers decide whether they are fatal.
    pub async fn await_convergence<S, E, F, Fut>(
        &self,
        what: &str,
        mut check: F,
    ) -> Result<ConvergenceOutcome<S>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ConvergenceSample<S>, E>>,
    {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut cancel = self.cancel.clone();
        let mut attempts = 0u32;
        let mut last_observed = None;

        let finish = |status, last_observed, attempts| ConvergenceOutcome {
            status,
            last_observed,
            elapsed: started.elapsed(),
            attempts,
        };

        loop {
            if cancel.is_cancelled() {
                debug!(%what, attempts, "wait cancelled");
                return Ok(finish(PollStatus::Cancelled, last_observed, attempts));
            }

            let sample = check().await?;
            attempts += 1;

            if sample.converged {
                debug!(%what, attempts, "converged");
                return Ok(finish(PollStatus::Converged, Some(sample.state), attempts));
            }
            last_observed = Some(sample.state);

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                debug!(%what, attempts, "attempt budget exhausted");
                return Ok(finish(PollStatus::TimedOut, last_observed, attempts));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(%what, attempts, "time budget exhausted");
                return Ok(finish(PollStatus::TimedOut, last_observed, attempts));
            }

            let pause = self.config.interval.min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => {
                    debug!(%what, attempts, "wait cancelled");
                    return Ok(finish(PollStatus::Cancelled, last_observed, attempts));
                }
            }
        }
    }
}
