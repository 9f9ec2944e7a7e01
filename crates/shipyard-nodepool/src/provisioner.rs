//! Cluster shell creation and node-group sizing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use shipyard_cloud::{
    CloudControlClient, CloudError, ClusterDescription, ClusterSpec, NodeGroupRequest,
};
use shipyard_converge::{
    CancelSignal, CloudResultExt, ConvergenceOutcome, ConvergencePoller, ConvergenceSample,
    OrchestrationError, OrchestrationResult, PollConfig,
};

use crate::readiness::{NodeReadiness, Registration};

/// Timing knobs for node-pool provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Interval between node-group and cluster checks.
    pub poll_interval: Duration,
    /// Budget for every member to reach `InService`.
    pub lifecycle_timeout: Duration,
    /// Budget for every member to register with the cluster.
    pub registration_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            lifecycle_timeout: Duration::from_secs(600),
            registration_timeout: Duration::from_secs(600),
        }
    }
}

/// The cluster resource a node pool belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterHandle {
    pub name: String,
    pub status: String,
    pub registered_node_count: u32,
    /// False when an existing cluster was reused.
    pub created: bool,
}

impl ClusterHandle {
    fn from_description(desc: ClusterDescription, created: bool) -> Self {
        Self {
            name: desc.name,
            status: desc.status,
            registered_node_count: desc.registered_node_count,
            created,
        }
    }
}

/// What happened to the node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeGroupAction {
    Created,
    Updated,
    /// Size, bounds and template already matched; no request was sent.
    Unchanged,
}

/// Outcome of sizing a node pool. Only built once both gates converged.
#[derive(Debug, Clone)]
pub struct NodePoolReport {
    pub node_group: String,
    pub action: NodeGroupAction,
    pub desired: u32,
    pub min: u32,
    pub max: u32,
    pub lifecycle: ConvergenceOutcome<NodeReadiness>,
    pub registration: ConvergenceOutcome<Registration>,
}

/// A cluster shell plus its sized node pool.
#[derive(Debug, Clone)]
pub struct ProvisionedCluster {
    pub cluster: ClusterHandle,
    pub node_pool: NodePoolReport,
}

/// Creates clusters and sizes their node pools.
pub struct NodePoolProvisioner {
    client: Arc<dyn CloudControlClient>,
    config: ProvisionerConfig,
}

impl NodePoolProvisioner {
    pub fn new(client: Arc<dyn CloudControlClient>, config: ProvisionerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Create the cluster, or return the existing one with the same name.
    pub async fn create_cluster_shell(
        &self,
        spec: &ClusterSpec,
    ) -> OrchestrationResult<ClusterHandle> {
        validate(spec)?;

        match self.client.create_cluster(&spec.name).await {
            Ok(desc) => {
                info!(cluster = %spec.name, "cluster created");
                Ok(ClusterHandle::from_description(desc, true))
            }
            Err(CloudError::AlreadyExists(_)) => {
                let desc = self
                    .client
                    .describe_cluster(&spec.name)
                    .await
                    .during("describe_cluster", &spec.name)?;
                info!(cluster = %spec.name, status = %desc.status, "reusing existing cluster");
                Ok(ClusterHandle::from_description(desc, false))
            }
            Err(e) => Err(OrchestrationError::from_cloud(e, "create_cluster", &spec.name)),
        }
    }

    /// Create or resize the node group, then wait for lifecycle and
    /// registration in that order.
    pub async fn scale_node_pool(
        &self,
        spec: &ClusterSpec,
        launch_template_id: &str,
        cancel: CancelSignal,
    ) -> OrchestrationResult<NodePoolReport> {
        validate(spec)?;

        let group = spec.node_group();
        let desired = spec.desired_node_count;
        let request = NodeGroupRequest {
            name: group.clone(),
            cluster: spec.name.clone(),
            launch_template_id: launch_template_id.to_string(),
            desired,
            min: spec.effective_min(),
            max: spec.effective_max(),
            network: spec.network.clone(),
        };

        let existing = self
            .client
            .describe_node_group(&group)
            .await
            .during("describe_node_group", &group)?;

        let action = match existing {
            None => {
                self.client
                    .create_node_group(&request)
                    .await
                    .during("create_node_group", &group)?;
                NodeGroupAction::Created
            }
            Some(current) if current.matches(&request) => NodeGroupAction::Unchanged,
            Some(_) => {
                self.client
                    .update_node_group(&request)
                    .await
                    .during("update_node_group", &group)?;
                NodeGroupAction::Updated
            }
        };
        info!(
            cluster = %spec.name,
            node_group = %group,
            desired,
            min = request.min,
            max = request.max,
            ?action,
            "node group submitted"
        );

        let lifecycle = self.await_lifecycle(&group, desired, cancel.clone()).await?;
        info!(node_group = %group, elapsed = ?lifecycle.elapsed, "all nodes in service");

        let registration = self
            .await_registration(&spec.name, desired, cancel)
            .await?;
        info!(cluster = %spec.name, elapsed = ?registration.elapsed, "all nodes registered");

        Ok(NodePoolReport {
            node_group: group,
            action,
            desired,
            min: request.min,
            max: request.max,
            lifecycle,
            registration,
        })
    }

    /// Cluster shell followed by node-pool sizing with its own launch template.
    pub async fn provision(
        &self,
        spec: &ClusterSpec,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ProvisionedCluster> {
        let mut cluster = self.create_cluster_shell(spec).await?;
        let node_pool = self
            .scale_node_pool(spec, &spec.launch_template_id, cancel)
            .await?;
        if let Some(registration) = &node_pool.registration.last_observed {
            cluster.registered_node_count = registration.registered;
        }
        Ok(ProvisionedCluster { cluster, node_pool })
    }

    async fn await_lifecycle(
        &self,
        group: &str,
        desired: u32,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ConvergenceOutcome<NodeReadiness>> {
        let poller = ConvergencePoller::new(
            PollConfig::new(self.config.poll_interval, self.config.lifecycle_timeout),
            cancel,
        );
        let client = self.client.as_ref();

        poller
            .await_convergence("node lifecycle", move || async move {
                let observed = client
                    .describe_node_group(group)
                    .await
                    .during("describe_node_group", group)?;
                let readiness = NodeReadiness::observe(observed.as_ref(), desired);
                debug!(node_group = group, %readiness, "lifecycle sample");
                Ok::<_, OrchestrationError>(ConvergenceSample::new(readiness.is_ready(), readiness))
            })
            .await?
            .require(group, "await node lifecycle")
    }

    async fn await_registration(
        &self,
        cluster: &str,
        desired: u32,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ConvergenceOutcome<Registration>> {
        let poller = ConvergencePoller::new(
            PollConfig::new(self.config.poll_interval, self.config.registration_timeout),
            cancel,
        );
        let client = self.client.as_ref();

        poller
            .await_convergence("node registration", move || async move {
                let desc = client
                    .describe_cluster(cluster)
                    .await
                    .during("describe_cluster", cluster)?;
                let registration = Registration {
                    registered: desc.registered_node_count,
                    desired,
                };
                debug!(cluster, %registration, "registration sample");
                Ok::<_, OrchestrationError>(ConvergenceSample::new(
                    registration.is_complete(),
                    registration,
                ))
            })
            .await?
            .require(cluster, "await node registration")
    }
}

fn validate(spec: &ClusterSpec) -> OrchestrationResult<()> {
    if spec.name.trim().is_empty() {
        return Err(OrchestrationError::InvalidSpec(
            "cluster name must not be empty".to_string(),
        ));
    }
    let (min, desired, max) = (spec.effective_min(), spec.desired_node_count, spec.effective_max());
    if min > desired || desired > max {
        return Err(OrchestrationError::InvalidSpec(format!(
            "cluster {}: node counts must satisfy min <= desired <= max \
             (got {min} <= {desired} <= {max})",
            spec.name
        )));
    }
    Ok(())
}
