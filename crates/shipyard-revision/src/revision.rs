//! The deployment revision record.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use shipyard_cloud::{DeploymentErrorInfo, DeploymentInfo, HostInstance, RevisionStatus};

/// A revision deployment as seen by this process.
///
/// Only `observe` changes the status, and it refuses to move backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRevision {
    pub id: String,
    pub application_id: String,
    pub deployment_group_id: String,
    pub status: RevisionStatus,
    pub participating_hosts: BTreeSet<String>,
    /// Metadata for each participating host, in id order.
    pub hosts: Vec<HostInstance>,
    /// Error reported with a failed or stopped deployment.
    pub failure: Option<DeploymentErrorInfo>,
    /// Every distinct status observed, oldest first.
    pub history: Vec<RevisionStatus>,
}

impl DeploymentRevision {
    pub fn new(id: &str, application_id: &str, deployment_group_id: &str) -> Self {
        Self {
            id: id.to_string(),
            application_id: application_id.to_string(),
            deployment_group_id: deployment_group_id.to_string(),
            status: RevisionStatus::Pending,
            participating_hosts: BTreeSet::new(),
            hosts: Vec::new(),
            failure: None,
            history: vec![RevisionStatus::Pending],
        }
    }

    /// Apply a polled status. Returns whether the status advanced.
    pub fn observe(&mut self, info: &DeploymentInfo) -> bool {
        let next = info.status;
        if next == self.status {
            self.absorb_error(info);
            return false;
        }
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            warn!(
                deployment = %self.id,
                current = %self.status,
                reported = %next,
                "ignoring backwards status transition"
            );
            return false;
        }
        self.status = next;
        self.history.push(next);
        self.absorb_error(info);
        true
    }

    fn absorb_error(&mut self, info: &DeploymentInfo) {
        if let Some(error) = &info.error {
            self.failure = Some(error.clone());
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.status == RevisionStatus::Succeeded
    }
}

impl fmt::Display for DeploymentRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deployment {} ({}/{}) {}",
            self.id, self.application_id, self.deployment_group_id, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: RevisionStatus) -> DeploymentInfo {
        DeploymentInfo {
            id: "d-1".into(),
            application: "shop".into(),
            deployment_group: "blue".into(),
            status,
            error: None,
        }
    }

    #[test]
    fn status_only_moves_forward() {
        let mut rev = DeploymentRevision::new("d-1", "shop", "blue");
        assert!(rev.observe(&info(RevisionStatus::InProgress)));
        assert!(!rev.observe(&info(RevisionStatus::Pending)));
        assert_eq!(rev.status, RevisionStatus::InProgress);
        assert!(rev.observe(&info(RevisionStatus::Failed)));
        assert!(!rev.observe(&info(RevisionStatus::InProgress)));
        assert!(!rev.observe(&info(RevisionStatus::Succeeded)));
        assert_eq!(rev.status, RevisionStatus::Failed);
        assert_eq!(
            rev.history,
            vec![
                RevisionStatus::Pending,
                RevisionStatus::InProgress,
                RevisionStatus::Failed
            ]
        );
    }

    #[test]
    fn pending_may_jump_straight_to_terminal() {
        let mut rev = DeploymentRevision::new("d-1", "shop", "blue");
        assert!(rev.observe(&info(RevisionStatus::Succeeded)));
        assert!(rev.is_terminal());
        assert!(rev.succeeded());
    }

    #[test]
    fn failure_details_are_kept() {
        let mut rev = DeploymentRevision::new("d-1", "shop", "blue");
        let mut failed = info(RevisionStatus::Failed);
        failed.error = Some(DeploymentErrorInfo {
            code: "HEALTH_CONSTRAINTS".into(),
            message: "too many unhealthy hosts".into(),
        });
        rev.observe(&failed);
        assert_eq!(rev.failure.as_ref().unwrap().code, "HEALTH_CONSTRAINTS");
        assert_eq!(rev.to_string(), "deployment d-1 (shop/blue) FAILED");
    }
}
