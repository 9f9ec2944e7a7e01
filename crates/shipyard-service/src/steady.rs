//! Steady-state detection.
//!
//! A service is steady when exactly one deployment is active, every desired
//! task is running, and the platform has emitted a steady-state event no
//! older than that deployment's last update. The event match is a suffix
//! check on the message text, so it is kept here and nowhere else.

use std::fmt;

use serde::Serialize;

use shipyard_cloud::ServiceDescription;

/// Message suffix of the platform's steady-state event.
pub const STEADY_STATE_SUFFIX: &str = "has reached a steady state.";

pub fn is_steady_signal(message: &str) -> bool {
    message
        .trim_end()
        .to_ascii_lowercase()
        .ends_with(STEADY_STATE_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SteadyStateSnapshot {
    pub active_deployments: usize,
    pub running: u32,
    pub desired: u32,
    /// Last update of the sole active deployment.
    pub deployment_updated_at_ms: Option<u64>,
    /// Newest steady-state event.
    pub last_steady_event_ms: Option<u64>,
}

impl SteadyStateSnapshot {
    pub fn assess(desc: &ServiceDescription) -> Self {
        let active: Vec<_> = desc
            .deployments
            .iter()
            .filter(|d| !d.status.eq_ignore_ascii_case("INACTIVE"))
            .collect();
        let deployment_updated_at_ms = match active.as_slice() {
            [only] => Some(only.updated_at_ms),
            _ => None,
        };
        let last_steady_event_ms = desc
            .events
            .iter()
            .filter(|e| is_steady_signal(&e.message))
            .map(|e| e.created_at_ms)
            .max();

        Self {
            active_deployments: active.len(),
            running: desc.running_count,
            desired: desc.desired_count,
            deployment_updated_at_ms,
            last_steady_event_ms,
        }
    }

    /// One active deployment and every desired task running. The steady
    /// signal is not consulted.
    pub fn is_settled(&self) -> bool {
        self.active_deployments == 1 && self.running == self.desired
    }

    pub fn is_steady(&self) -> bool {
        if !self.is_settled() {
            return false;
        }
        matches!(
            (self.deployment_updated_at_ms, self.last_steady_event_ms),
            (Some(updated), Some(signal)) if signal >= updated
        )
    }
}

impl fmt::Display for SteadyStateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signal = match (self.deployment_updated_at_ms, self.last_steady_event_ms) {
            (_, None) => "none",
            (Some(updated), Some(signal)) if signal >= updated => "current",
            _ => "stale",
        };
        write!(
            f,
            "{} active deployment(s), {}/{} running, steady signal {}",
            self.active_deployments, self.running, self.desired, signal
        )
    }
}
