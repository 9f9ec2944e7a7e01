//! The control-plane client trait.
//!
//! Each method is exactly one remote request/response. Implementations hold
//! an already-authenticated connection context and must be safe to share
//! across concurrent orchestration calls.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CloudResult;
use crate::types::*;

/// Single-request façade over the provider's compute APIs.
#[async_trait]
pub trait CloudControlClient: Send + Sync {
    // ── Clusters ───────────────────────────────────────────────────

    /// Create an empty cluster. Returns `AlreadyExists` if the name is taken.
    async fn create_cluster(&self, name: &str) -> CloudResult<ClusterDescription>;

    async fn describe_cluster(&self, name: &str) -> CloudResult<ClusterDescription>;

    // ── Node groups ────────────────────────────────────────────────

    /// `Ok(None)` when no node group with this name exists.
    async fn describe_node_group(&self, name: &str) -> CloudResult<Option<NodeGroup>>;

    async fn create_node_group(&self, request: &NodeGroupRequest) -> CloudResult<()>;

    async fn update_node_group(&self, request: &NodeGroupRequest) -> CloudResult<()>;

    // ── Services ───────────────────────────────────────────────────

    /// `Ok(None)` when the service does not exist (or is inactive).
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> CloudResult<Option<ServiceDescription>>;

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>>;

    async fn create_service(&self, request: &CreateServiceRequest)
    -> CloudResult<ServiceDescription>;

    async fn update_service_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> CloudResult<ServiceDescription>;

    async fn delete_service(&self, cluster: &str, service: &str) -> CloudResult<()>;

    // ── Tasks ──────────────────────────────────────────────────────

    /// ARNs of tasks whose desired status is RUNNING.
    async fn list_running_tasks(&self, cluster: &str, service: &str) -> CloudResult<Vec<String>>;

    async fn describe_tasks(&self, cluster: &str, task_arns: &[String])
    -> CloudResult<Vec<TaskRecord>>;

    async fn describe_task_definition_tags(
        &self,
        task_definition_arn: &str,
    ) -> CloudResult<HashMap<String, String>>;

    /// At most 100 ARNs per call.
    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instance_arns: &[String],
    ) -> CloudResult<Vec<ContainerInstance>>;

    async fn describe_hosts(&self, host_ids: &[String]) -> CloudResult<Vec<HostInstance>>;

    // ── Revision deployments ───────────────────────────────────────

    async fn list_applications(&self, next_token: Option<&str>) -> CloudResult<Page<String>>;

    async fn list_deployment_groups(
        &self,
        application: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>>;

    async fn list_deployment_configs(&self, next_token: Option<&str>) -> CloudResult<Page<String>>;

    /// Submit a deployment; returns its id.
    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> CloudResult<String>;

    async fn get_deployment(&self, deployment_id: &str) -> CloudResult<DeploymentInfo>;

    /// Host ids that took part in a deployment.
    async fn list_deployment_instances(
        &self,
        deployment_id: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>>;

    async fn describe_host(&self, host_id: &str) -> CloudResult<HostInstance>;

    async fn get_deployment_group(
        &self,
        application: &str,
        deployment_group: &str,
    ) -> CloudResult<DeploymentGroupInfo>;
}
