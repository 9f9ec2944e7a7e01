//! Revision deployment orchestration.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use shipyard_cloud::{paginate, CloudControlClient, CreateDeploymentRequest, RevisionLocation};
use shipyard_converge::{
    CancelSignal, CloudResultExt, ConvergencePoller, ConvergenceSample, OrchestrationError,
    OrchestrationResult, PollConfig,
};

use crate::revision::DeploymentRevision;

const OP_COMPLETION: &str = "await deployment completion";

/// Polling budget and submission defaults for revision deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Upper bound on status checks, applied alongside `timeout`.
    pub max_attempts: u32,
    /// Deployment configuration name passed on submission.
    pub deployment_config: Option<String>,
    pub description: Option<String>,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            max_attempts: 60,
            deployment_config: None,
            description: None,
        }
    }
}

impl RevisionConfig {
    fn poll(&self) -> PollConfig {
        PollConfig::new(self.poll_interval, self.timeout).with_max_attempts(self.max_attempts)
    }
}

/// Submits revision deployments and follows them to completion.
pub struct DeploymentRevisionOrchestrator {
    client: Arc<dyn CloudControlClient>,
    config: RevisionConfig,
}

impl DeploymentRevisionOrchestrator {
    pub fn new(client: Arc<dyn CloudControlClient>, config: RevisionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RevisionConfig {
        &self.config
    }

    pub async fn list_applications(&self) -> OrchestrationResult<Vec<String>> {
        let client = self.client.as_ref();
        paginate(move |token| async move { client.list_applications(token.as_deref()).await })
            .await
            .during("list_applications", "applications")
    }

    pub async fn list_deployment_groups(
        &self,
        application: &str,
    ) -> OrchestrationResult<Vec<String>> {
        let client = self.client.as_ref();
        paginate(move |token| async move {
            client
                .list_deployment_groups(application, token.as_deref())
                .await
        })
        .await
        .during("list_deployment_groups", application)
    }

    pub async fn list_deployment_configs(&self) -> OrchestrationResult<Vec<String>> {
        let client = self.client.as_ref();
        paginate(move |token| async move { client.list_deployment_configs(token.as_deref()).await })
            .await
            .during("list_deployment_configs", "deployment configs")
    }

    /// The revision a deployment group is currently configured to run.
    pub async fn get_target_revision(
        &self,
        application: &str,
        deployment_group: &str,
    ) -> OrchestrationResult<Option<RevisionLocation>> {
        let group = self
            .client
            .get_deployment_group(application, deployment_group)
            .await
            .during(
                "get_deployment_group",
                &format!("{application}/{deployment_group}"),
            )?;
        Ok(group.target_revision)
    }

    /// Deploy `revision` to a deployment group and wait for the outcome.
    ///
    /// A deployment that ends `FAILED` or `STOPPED` is returned, not raised;
    /// its `failure` carries the reported error. Exhausting the polling
    /// budget yields `ProvisioningTimeout` naming the deployment id. Every
    /// participating host is then described, and the first lookup failure
    /// aborts with `HostLookupFailed`.
    pub async fn deploy(
        &self,
        application: &str,
        deployment_group: &str,
        revision: &RevisionLocation,
        cancel: CancelSignal,
    ) -> OrchestrationResult<DeploymentRevision> {
        let request = CreateDeploymentRequest {
            application: application.to_string(),
            deployment_group: deployment_group.to_string(),
            revision: revision.clone(),
            deployment_config: self.config.deployment_config.clone(),
            description: self.config.description.clone(),
        };
        let id = self
            .client
            .create_deployment(&request)
            .await
            .during(
                "create_deployment",
                &format!("{application}/{deployment_group}"),
            )?;
        info!(deployment = %id, application, deployment_group, "deployment submitted");

        let tracked = Mutex::new(DeploymentRevision::new(&id, application, deployment_group));
        let client = self.client.as_ref();
        let (deployment_id, record) = (id.as_str(), &tracked);

        ConvergencePoller::new(self.config.poll(), cancel)
            .await_convergence("deployment status", move || async move {
                let info = client
                    .get_deployment(deployment_id)
                    .await
                    .during("get_deployment", deployment_id)?;
                let status = {
                    let mut rev = record.lock().unwrap_or_else(PoisonError::into_inner);
                    if rev.observe(&info) {
                        debug!(deployment = deployment_id, status = %rev.status, "status advanced");
                    }
                    rev.status
                };
                Ok::<_, OrchestrationError>(ConvergenceSample::new(status.is_terminal(), status))
            })
            .await?
            .require(&id, OP_COMPLETION)?;

        let mut revision = tracked.into_inner().unwrap_or_else(PoisonError::into_inner);

        let host_ids = paginate(move |token| async move {
            client
                .list_deployment_instances(deployment_id, token.as_deref())
                .await
        })
        .await
        .during("list_deployment_instances", &id)?;
        revision.participating_hosts = host_ids.into_iter().collect();

        for host_id in &revision.participating_hosts {
            let host = client.describe_host(host_id).await.map_err(|e| {
                OrchestrationError::HostLookupFailed {
                    deployment_id: id.clone(),
                    host_id: host_id.clone(),
                    code: e.code().to_string(),
                    message: e.message(),
                }
            })?;
            revision.hosts.push(host);
        }

        if revision.succeeded() {
            info!(deployment = %id, hosts = revision.hosts.len(), "deployment succeeded");
        } else {
            warn!(
                deployment = %id,
                status = %revision.status,
                error = ?revision.failure,
                "deployment finished unsuccessfully"
            );
        }
        Ok(revision)
    }
}
