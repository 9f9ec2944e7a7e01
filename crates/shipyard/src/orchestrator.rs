//! End-to-end orchestration over one control-plane client.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use shipyard_cloud::{CloudControlClient, ClusterSpec, RevisionLocation, ServiceSpec};
use shipyard_converge::{CancelSignal, OrchestrationError, OrchestrationResult};
use shipyard_inventory::{ExecutionUnit, HostIntrospector, TaskInventoryCollector};
use shipyard_nodepool::{ClusterHandle, NodePoolProvisioner, NodePoolReport};
use shipyard_revision::{DeploymentRevision, DeploymentRevisionOrchestrator};
use shipyard_service::{ScaleReport, ServiceScaler};

use crate::config::{ComponentConfigs, ConfigError, OrchestratorConfig};

/// Result of bringing a cluster and one of its services to size.
#[derive(Debug, Clone)]
pub struct RolloutReport {
    pub cluster: ClusterHandle,
    pub node_pool: NodePoolReport,
    pub service: ScaleReport,
}

impl RolloutReport {
    pub fn units(&self) -> &[ExecutionUnit] {
        &self.service.units
    }

    /// Plain-data summary for callers that forward results elsewhere.
    pub fn summary(&self) -> RolloutSummary {
        RolloutSummary {
            cluster: self.cluster.name.clone(),
            registered_nodes: self.cluster.registered_node_count,
            service: self.service.service.to_string(),
            desired_count: self.service.desired_count,
            phase: self.service.phase,
            units: self.service.units.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RolloutSummary {
    pub cluster: String,
    pub registered_nodes: u32,
    pub service: String,
    pub desired_count: u32,
    pub phase: shipyard_service::ScalePhase,
    pub units: Vec<ExecutionUnit>,
}

/// Provisioning, scaling, inventory and revision deployments sharing one
/// control-plane client.
pub struct Orchestrator {
    client: Arc<dyn CloudControlClient>,
    provisioner: NodePoolProvisioner,
    scaler: ServiceScaler,
    inventory: TaskInventoryCollector,
    revisions: DeploymentRevisionOrchestrator,
}

impl Orchestrator {
    /// Default timings and the HTTP host introspector.
    pub fn new(client: Arc<dyn CloudControlClient>) -> Self {
        let configs = ComponentConfigs::default();
        let introspector = Arc::new(configs.introspector.clone());
        Self::with_introspector(client, introspector, configs)
    }

    pub fn from_config(
        client: Arc<dyn CloudControlClient>,
        config: &OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        let configs = config.resolve()?;
        let introspector = Arc::new(configs.introspector.clone());
        Ok(Self::with_introspector(client, introspector, configs))
    }

    /// Use `introspector` instead of the configured HTTP one.
    pub fn with_introspector(
        client: Arc<dyn CloudControlClient>,
        introspector: Arc<dyn HostIntrospector>,
        configs: ComponentConfigs,
    ) -> Self {
        let inventory =
            TaskInventoryCollector::new(client.clone(), introspector, configs.collector);
        Self {
            provisioner: NodePoolProvisioner::new(client.clone(), configs.provisioner),
            scaler: ServiceScaler::new(client.clone(), inventory.clone(), configs.scaler),
            revisions: DeploymentRevisionOrchestrator::new(client.clone(), configs.revision),
            inventory,
            client,
        }
    }

    pub fn client(&self) -> &Arc<dyn CloudControlClient> {
        &self.client
    }

    pub fn provisioner(&self) -> &NodePoolProvisioner {
        &self.provisioner
    }

    pub fn scaler(&self) -> &ServiceScaler {
        &self.scaler
    }

    pub fn inventory(&self) -> &TaskInventoryCollector {
        &self.inventory
    }

    pub fn revisions(&self) -> &DeploymentRevisionOrchestrator {
        &self.revisions
    }

    /// Size the node pool, then scale the service onto it.
    ///
    /// The service must belong to the cluster being provisioned. Any fatal
    /// wait in either step aborts the rollout; the report is only built once
    /// both finished.
    pub async fn provision_and_scale(
        &self,
        cluster: &ClusterSpec,
        service: &ServiceSpec,
        cancel: CancelSignal,
    ) -> OrchestrationResult<RolloutReport> {
        if service.cluster_name != cluster.name {
            return Err(OrchestrationError::InvalidSpec(format!(
                "service {} targets cluster {}, not {}",
                service.service_name, service.cluster_name, cluster.name
            )));
        }

        info!(cluster = %cluster.name, nodes = cluster.desired_node_count, "provisioning cluster");
        let provisioned = self.provisioner.provision(cluster, cancel.clone()).await?;

        info!(service = %service.key(), desired = service.desired_count, "scaling service");
        let scaled = self.scaler.create_or_update(service, cancel).await?;

        info!(
            cluster = %cluster.name,
            service = %scaled.service,
            phase = ?scaled.phase,
            units = scaled.units.len(),
            "rollout complete"
        );
        Ok(RolloutReport {
            cluster: provisioned.cluster,
            node_pool: provisioned.node_pool,
            service: scaled,
        })
    }

    /// Scale a service on an already provisioned cluster.
    pub async fn scale(
        &self,
        service: &ServiceSpec,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ScaleReport> {
        self.scaler.create_or_update(service, cancel).await
    }

    pub async fn collect(
        &self,
        cluster: &str,
        service: &str,
    ) -> OrchestrationResult<Vec<ExecutionUnit>> {
        self.inventory.collect(cluster, service).await
    }

    pub async fn deploy_revision(
        &self,
        application: &str,
        deployment_group: &str,
        revision: &RevisionLocation,
        cancel: CancelSignal,
    ) -> OrchestrationResult<DeploymentRevision> {
        self.revisions
            .deploy(application, deployment_group, revision, cancel)
            .await
    }

    /// Whether the group's configured target differs from `revision`.
    pub async fn needs_deploy(
        &self,
        application: &str,
        deployment_group: &str,
        revision: &RevisionLocation,
    ) -> OrchestrationResult<bool> {
        let current = self
            .revisions
            .get_target_revision(application, deployment_group)
            .await?;
        Ok(current.as_ref() != Some(revision))
    }
}
