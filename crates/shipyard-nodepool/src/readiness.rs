//! Snapshots observed while waiting on a node pool.

use std::fmt;

use serde::Serialize;

use shipyard_cloud::NodeGroup;

/// Lifecycle progress of a node group's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeReadiness {
    pub in_service: u32,
    pub desired: u32,
}

impl NodeReadiness {
    /// A missing node group counts as zero members in service.
    pub fn observe(group: Option<&NodeGroup>, desired: u32) -> Self {
        Self {
            in_service: group.map(NodeGroup::in_service_count).unwrap_or(0),
            desired,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.in_service == self.desired
    }
}

impl fmt::Display for NodeReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} InService", self.in_service, self.desired)
    }
}

/// Registration progress of a cluster's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub registered: u32,
    pub desired: u32,
}

impl Registration {
    pub fn is_complete(&self) -> bool {
        self.registered == self.desired
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} registered", self.registered, self.desired)
    }
}
