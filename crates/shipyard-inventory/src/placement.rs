//! Placement models and the execution-unit descriptor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shipyard_cloud::{ContainerRecord, LaunchType, TaskRecord};

/// Task-definition tag naming the container that identifies a task.
pub const MAIN_CONTAINER_TAG: &str = "shipyard:main-container";

/// Where a task runs, which decides how its unit is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementMode {
    /// On a registered virtual machine with a reachable introspection endpoint.
    HostBound,
    /// On its own network interface; no host is visible.
    NetworkBound,
}

impl PlacementMode {
    pub fn of(task: &TaskRecord) -> Self {
        match (task.launch_type, &task.container_instance_arn) {
            (LaunchType::Fargate, _) | (_, None) => Self::NetworkBound,
            (_, Some(_)) => Self::HostBound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Success,
    Failed,
}

/// A running task resolved to something a caller can track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    /// Runtime container id (short form) when known, otherwise a fallback.
    pub id: String,
    pub task_id: String,
    pub task_arn: String,
    pub host_id: Option<String>,
    /// Private address of the backing host (host-bound only).
    pub host_address: Option<String>,
    /// Address the unit is reachable on.
    pub network_address: Option<String>,
    pub placement: PlacementMode,
    pub status: UnitStatus,
    /// Not part of the running set observed before the operation started.
    pub new_unit: bool,
    /// Why the unit is less precise than it could be.
    pub note: Option<String>,
}

impl ExecutionUnit {
    pub fn is_degraded(&self) -> bool {
        self.note.is_some() || self.status == UnitStatus::Failed
    }
}

/// The container that identifies a task.
///
/// Multi-container tasks may name it with the `MAIN_CONTAINER_TAG` tag on
/// their task definition; otherwise the first container wins.
pub fn main_container<'a>(
    task: &'a TaskRecord,
    tags: Option<&HashMap<String, String>>,
) -> Option<&'a ContainerRecord> {
    let tagged = tags
        .and_then(|t| t.get(MAIN_CONTAINER_TAG))
        .and_then(|name| task.containers.iter().find(|c| &c.name == name));
    tagged.or_else(|| task.containers.first())
}

/// First private address on the task's network interfaces, preferring the
/// given container's.
pub fn interface_address(task: &TaskRecord, preferred: Option<&ContainerRecord>) -> Option<String> {
    preferred
        .into_iter()
        .chain(task.containers.iter())
        .flat_map(|c| c.network_interfaces.iter())
        .find_map(|ni| ni.private_ipv4.clone())
}
