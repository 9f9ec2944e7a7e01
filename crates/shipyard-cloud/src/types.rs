//! Domain types exchanged with the cloud control plane.
//!
//! Request specs (`ClusterSpec`, `ServiceSpec`, `CreateDeploymentRequest`)
//! flow in from the caller; description records (`NodeGroup`,
//! `ServiceDescription`, `TaskRecord`, ...) flow back from the control plane.
//! All of them are plain data: no handles, no open connections.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a node-group member that is ready to take work.
pub const LIFECYCLE_IN_SERVICE: &str = "InService";

/// Length of the short form of a container runtime id.
pub const SHORT_RUNTIME_ID_LEN: usize = 12;

// ── Cluster ────────────────────────────────────────────────────────

/// Zones and subnets a node pool is spread across.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NetworkPlacement {
    pub zones: Vec<String>,
    pub subnets: Vec<String>,
}

/// Desired shape of a compute cluster and its backing node pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSpec {
    pub name: String,
    /// Node-group name. Defaults to `{name}-nodes`.
    pub node_group_name: Option<String>,
    pub desired_node_count: u32,
    /// Defaults to 50% of desired.
    pub min_node_count: Option<u32>,
    /// Defaults to 200% of desired.
    pub max_node_count: Option<u32>,
    pub launch_template_id: String,
    pub network: NetworkPlacement,
}

impl ClusterSpec {
    /// Name of the node group backing this cluster.
    pub fn node_group(&self) -> String {
        self.node_group_name
            .clone()
            .unwrap_or_else(|| format!("{}-nodes", self.name))
    }

    /// Effective minimum size (explicit, or 50% of desired).
    pub fn effective_min(&self) -> u32 {
        self.min_node_count.unwrap_or(self.desired_node_count / 2)
    }

    /// Effective maximum size (explicit, or 200% of desired).
    pub fn effective_max(&self) -> u32 {
        self.max_node_count
            .unwrap_or(self.desired_node_count.saturating_mul(2))
    }
}

/// Control-plane view of a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterDescription {
    pub name: String,
    pub status: String,
    /// Nodes registered as schedulable capacity.
    pub registered_node_count: u32,
    pub running_task_count: u32,
    pub active_service_count: u32,
}

// ── Node group ─────────────────────────────────────────────────────

/// Create/update request for a node group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeGroupRequest {
    pub name: String,
    pub cluster: String,
    pub launch_template_id: String,
    pub desired: u32,
    pub min: u32,
    pub max: u32,
    pub network: NetworkPlacement,
}

/// Control-plane view of a node group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeGroup {
    pub name: String,
    pub desired: u32,
    pub min: u32,
    pub max: u32,
    /// Launch template in use, when the provider reports it.
    pub launch_template_id: Option<String>,
    pub instances: Vec<NodeInstance>,
}

impl NodeGroup {
    /// Whether the group is already sized and templated as `request` asks.
    /// An unreported launch template never matches.
    pub fn matches(&self, request: &NodeGroupRequest) -> bool {
        self.desired == request.desired
            && self.min == request.min
            && self.max == request.max
            && self.launch_template_id.as_deref() == Some(request.launch_template_id.as_str())
    }

    /// Members whose lifecycle state is `InService`.
    pub fn in_service_count(&self) -> u32 {
        self.instances
            .iter()
            .filter(|i| i.lifecycle_state == LIFECYCLE_IN_SERVICE)
            .count() as u32
    }
}

/// A single node-group member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInstance {
    pub id: String,
    pub zone: String,
    /// e.g. "Pending", "InService", "Terminating".
    pub lifecycle_state: String,
}

// ── Service ────────────────────────────────────────────────────────

/// Identifies a service within a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub cluster: String,
    pub service: String,
}

impl ServiceKey {
    pub fn new(cluster: &str, service: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            service: service.to_string(),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.service)
    }
}

/// Desired state of a long-running service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    pub cluster_name: String,
    pub service_name: String,
    /// Task definition family:revision or ARN.
    pub task_definition: String,
    pub desired_count: u32,
    /// Budget for the steady-state wait after scaling up.
    pub steady_state_timeout: Duration,
}

impl ServiceSpec {
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.cluster_name, &self.service_name)
    }
}

/// Create request for a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateServiceRequest {
    pub cluster: String,
    pub service_name: String,
    pub task_definition: String,
    pub desired_count: u32,
}

impl From<&ServiceSpec> for CreateServiceRequest {
    fn from(spec: &ServiceSpec) -> Self {
        Self {
            cluster: spec.cluster_name.clone(),
            service_name: spec.service_name.clone(),
            task_definition: spec.task_definition.clone(),
            desired_count: spec.desired_count,
        }
    }
}

/// Control-plane view of a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceDescription {
    pub cluster: String,
    pub name: String,
    pub status: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
    /// Active deployment records; more than one means a rollout is in flight.
    pub deployments: Vec<ServiceDeployment>,
    pub events: Vec<ServiceEvent>,
}

/// A deployment record attached to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceDeployment {
    pub id: String,
    pub status: String,
    pub desired_count: u32,
    pub running_count: u32,
    /// Epoch milliseconds of the last mutation.
    pub updated_at_ms: u64,
}

/// An event from the service's event feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEvent {
    pub id: String,
    /// Epoch milliseconds.
    pub created_at_ms: u64,
    pub message: String,
}

// ── Tasks ──────────────────────────────────────────────────────────

/// How a task was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchType {
    /// On a managed virtual machine registered with the cluster.
    Ec2,
    /// Serverless; the task owns its network interface, no host is visible.
    Fargate,
    /// On externally managed capacity.
    External,
}

/// Lifecycle status of a task as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Running,
    Stopping,
    Stopped,
}

/// A task as described by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRecord {
    pub arn: String,
    pub task_definition_arn: String,
    pub launch_type: LaunchType,
    pub last_status: TaskStatus,
    pub desired_status: TaskStatus,
    /// Present for tasks placed on a registered host.
    pub container_instance_arn: Option<String>,
    pub containers: Vec<ContainerRecord>,
}

/// A container inside a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerRecord {
    pub name: String,
    pub arn: String,
    /// Full runtime (docker) id, once the container has started.
    pub runtime_id: Option<String>,
    pub network_interfaces: Vec<NetworkInterface>,
}

/// A network interface attached to a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkInterface {
    pub attachment_id: String,
    pub private_ipv4: Option<String>,
}

/// Registration of a host with a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerInstance {
    pub arn: String,
    /// Id of the backing virtual machine.
    pub host_id: String,
}

/// Descriptive metadata for a virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostInstance {
    pub id: String,
    pub private_ip: Option<String>,
    pub private_dns: Option<String>,
    pub zone: Option<String>,
    pub state: String,
}

// ── Revision deployments ───────────────────────────────────────────

/// Where an application revision bundle lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevisionLocation {
    S3 {
        bucket: String,
        key: String,
        bundle_type: String,
        version: Option<String>,
        etag: Option<String>,
    },
    GitHub {
        repository: String,
        commit_id: String,
    },
}

/// Request to deploy a revision to a deployment group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDeploymentRequest {
    pub application: String,
    pub deployment_group: String,
    pub revision: RevisionLocation,
    pub deployment_config: Option<String>,
    pub description: Option<String>,
}

/// Status of a revision deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Stopped,
}

impl RevisionStatus {
    /// Position in the `Pending → InProgress → terminal` order.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Succeeded | Self::Failed | Self::Stopped => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Error attached to a failed or stopped deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentErrorInfo {
    pub code: String,
    pub message: String,
}

/// Control-plane view of a revision deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentInfo {
    pub id: String,
    pub application: String,
    pub deployment_group: String,
    pub status: RevisionStatus,
    pub error: Option<DeploymentErrorInfo>,
}

/// Control-plane view of a deployment group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentGroupInfo {
    pub application: String,
    pub name: String,
    pub deployment_config: Option<String>,
    /// Revision currently configured as the group's target.
    pub target_revision: Option<RevisionLocation>,
}

// ── Paging ─────────────────────────────────────────────────────────

/// One page of a paginated enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Last `/`-separated segment of an ARN (`arn:…:task/cluster/abc` → `abc`).
pub fn id_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Short form of a container runtime id.
pub fn short_runtime_id(runtime_id: &str) -> &str {
    match runtime_id.char_indices().nth(SHORT_RUNTIME_ID_LEN) {
        Some((idx, _)) => &runtime_id[..idx],
        None => runtime_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(desired: u32) -> ClusterSpec {
        ClusterSpec {
            name: "prod".to_string(),
            node_group_name: None,
            desired_node_count: desired,
            min_node_count: None,
            max_node_count: None,
            launch_template_id: "lt-1".to_string(),
            network: NetworkPlacement::default(),
        }
    }

    #[test]
    fn node_pool_headroom_defaults() {
        let spec = cluster(4);
        assert_eq!(spec.effective_min(), 2);
        assert_eq!(spec.effective_max(), 8);
        assert_eq!(spec.node_group(), "prod-nodes");
    }

    #[test]
    fn explicit_bounds_win() {
        let spec = ClusterSpec {
            min_node_count: Some(1),
            max_node_count: Some(5),
            node_group_name: Some("asg-prod".to_string()),
            ..cluster(4)
        };
        assert_eq!(spec.effective_min(), 1);
        assert_eq!(spec.effective_max(), 5);
        assert_eq!(spec.node_group(), "asg-prod");
    }

    #[test]
    fn node_group_matches_request_on_size_bounds_and_template() {
        let request = NodeGroupRequest {
            name: "prod-nodes".to_string(),
            cluster: "prod".to_string(),
            launch_template_id: "lt-1".to_string(),
            desired: 3,
            min: 1,
            max: 6,
            network: NetworkPlacement::default(),
        };
        let mut group = NodeGroup {
            name: "prod-nodes".to_string(),
            desired: 3,
            min: 1,
            max: 6,
            launch_template_id: Some("lt-1".to_string()),
            instances: Vec::new(),
        };
        assert!(group.matches(&request));

        group.max = 8;
        assert!(!group.matches(&request));

        group.max = 6;
        group.launch_template_id = None;
        assert!(!group.matches(&request));
    }

    #[test]
    fn in_service_count_ignores_other_states() {
        let group = NodeGroup {
            name: "g".to_string(),
            desired: 3,
            min: 1,
            max: 6,
            launch_template_id: None,
            instances: vec![
                NodeInstance {
                    id: "i-1".to_string(),
                    zone: "a".to_string(),
                    lifecycle_state: "InService".to_string(),
                },
                NodeInstance {
                    id: "i-2".to_string(),
                    zone: "a".to_string(),
                    lifecycle_state: "Pending".to_string(),
                },
            ],
        };
        assert_eq!(group.in_service_count(), 1);
    }

    #[test]
    fn revision_status_order() {
        assert!(RevisionStatus::Pending.rank() < RevisionStatus::InProgress.rank());
        assert!(RevisionStatus::Failed.is_terminal());
        assert!(RevisionStatus::Stopped.is_terminal());
        assert!(!RevisionStatus::InProgress.is_terminal());
        assert_eq!(RevisionStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn revision_location_wire_shape() {
        let loc = RevisionLocation::GitHub {
            repository: "org/app".to_string(),
            commit_id: "abc123".to_string(),
        };
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["type"], "git_hub");
        assert_eq!(json["commit_id"], "abc123");
    }

    #[test]
    fn arn_and_runtime_id_helpers() {
        assert_eq!(id_from_arn("arn:aws:ecs:us-east-1:1:task/prod/abc"), "abc");
        assert_eq!(id_from_arn("plain"), "plain");
        assert_eq!(short_runtime_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_runtime_id("short"), "short");
    }
}
