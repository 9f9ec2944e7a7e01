//! Observed state while a service converges.

use std::fmt;

use serde::Serialize;

/// The service's reported desired count against the one we asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DesiredCountAck {
    pub observed: u32,
    pub requested: u32,
}

impl DesiredCountAck {
    pub fn is_acked(&self) -> bool {
        self.observed == self.requested
    }
}

impl fmt::Display for DesiredCountAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "desired count {} (requested {})", self.observed, self.requested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    pub running: u32,
    pub pending: u32,
    pub desired: u32,
}

impl TaskProgress {
    pub fn is_complete(&self) -> bool {
        self.running == self.desired
    }
}

impl fmt::Display for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} running", self.running, self.desired)?;
        if self.pending > 0 {
            write!(f, ", {} pending", self.pending)?;
        }
        Ok(())
    }
}
