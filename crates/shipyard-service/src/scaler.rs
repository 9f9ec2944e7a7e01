//! The service scaling state machine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use shipyard_cloud::{
    paginate, CloudControlClient, CreateServiceRequest, ServiceDescription, ServiceKey, ServiceSpec,
};
use shipyard_converge::{
    CancelSignal, CloudResultExt, ConvergenceOutcome, ConvergencePoller, ConvergenceSample,
    OrchestrationError, OrchestrationResult, PollConfig, PollStatus,
};
use shipyard_inventory::{ExecutionUnit, TaskInventoryCollector};

use crate::events::EventTail;
use crate::progress::{DesiredCountAck, TaskProgress};
use crate::steady::SteadyStateSnapshot;

const OP_ACK: &str = "await desired count acknowledgement";
const OP_RUNNING: &str = "await running tasks";
const OP_STEADY: &str = "await steady state";

/// Timing knobs for service scaling. The steady-state budget comes from
/// each `ServiceSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerConfig {
    /// Interval for the running-task and steady-state waits.
    pub poll_interval: Duration,
    pub ack_poll_interval: Duration,
    pub ack_timeout: Duration,
    pub running_timeout: Duration,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            ack_poll_interval: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(60),
            running_timeout: Duration::from_secs(600),
        }
    }
}

/// Furthest state reached by a scale call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalePhase {
    /// Submitted (or nothing to submit); no wait has completed.
    Requested,
    DesiredCountAcked,
    TasksRunning,
    /// Tasks did not settle in time during a downsize. Not an error.
    TasksRunningTimeout,
    Steady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScaleAction {
    Created,
    Updated,
    /// Desired count already matched; no request was sent.
    Unchanged,
}

/// Everything a scale call observed, plus the resulting inventory.
#[derive(Debug, Clone)]
pub struct ScaleReport {
    pub service: ServiceKey,
    pub action: ScaleAction,
    pub previous_count: u32,
    pub desired_count: u32,
    pub phase: ScalePhase,
    pub acknowledgement: Option<ConvergenceOutcome<DesiredCountAck>>,
    pub running: Option<ConvergenceOutcome<TaskProgress>>,
    pub steady_state: Option<ConvergenceOutcome<SteadyStateSnapshot>>,
    pub units: Vec<ExecutionUnit>,
}

impl ScaleReport {
    fn new(
        service: ServiceKey,
        action: ScaleAction,
        previous_count: u32,
        desired_count: u32,
    ) -> Self {
        Self {
            service,
            action,
            previous_count,
            desired_count,
            phase: ScalePhase::Requested,
            acknowledgement: None,
            running: None,
            steady_state: None,
            units: Vec::new(),
        }
    }

    pub fn is_upsize(&self) -> bool {
        self.desired_count > self.previous_count
    }
}

/// Creates, resizes and waits on long-running services.
pub struct ServiceScaler {
    client: Arc<dyn CloudControlClient>,
    inventory: TaskInventoryCollector,
    config: ScalerConfig,
}

impl ServiceScaler {
    pub fn new(
        client: Arc<dyn CloudControlClient>,
        inventory: TaskInventoryCollector,
        config: ScalerConfig,
    ) -> Self {
        Self {
            client,
            inventory,
            config,
        }
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    /// Bring the service to `spec.desired_count` and return its inventory.
    ///
    /// Callers serialize calls per service; nothing here guards against two
    /// concurrent scales of the same service.
    pub async fn create_or_update(
        &self,
        spec: &ServiceSpec,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ScaleReport> {
        validate(spec)?;
        let key = spec.key();
        let resource = key.to_string();

        let existing = self
            .client
            .describe_service(&key.cluster, &key.service)
            .await
            .during("describe_service", &resource)?;

        let tail = EventTail::new(&resource);
        let mut baseline = HashSet::new();
        if let Some(desc) = &existing {
            tail.prime(desc);
            baseline.extend(
                self.inventory
                    .running_task_arns(&key.cluster, &key.service)
                    .await?,
            );
        }

        let (action, previous) = match &existing {
            None => {
                self.client
                    .create_service(&CreateServiceRequest::from(spec))
                    .await
                    .during("create_service", &resource)?;
                (ScaleAction::Created, 0)
            }
            Some(desc) if desc.desired_count == spec.desired_count => {
                (ScaleAction::Unchanged, desc.desired_count)
            }
            Some(desc) => {
                self.client
                    .update_service_desired_count(&key.cluster, &key.service, spec.desired_count)
                    .await
                    .during("update_service", &resource)?;
                (ScaleAction::Updated, desc.desired_count)
            }
        };

        let mut report = ScaleReport::new(key.clone(), action, previous, spec.desired_count);
        info!(
            service = %resource,
            ?action,
            previous,
            desired = spec.desired_count,
            phase = ?report.phase,
            "scale requested"
        );

        if action == ScaleAction::Unchanged {
            let settled = existing
                .as_ref()
                .is_some_and(|desc| SteadyStateSnapshot::assess(desc).is_settled());
            if settled {
                info!(service = %resource, "desired count unchanged, skipping waits");
            } else {
                // An earlier call may have timed out after its update landed.
                warn!(
                    service = %resource,
                    "desired count unchanged but service not settled, resuming waits"
                );
                let running = self
                    .await_running(&key, spec.desired_count, &tail, cancel.clone())
                    .await?
                    .require(&resource, OP_RUNNING)?;
                report.running = Some(running);
                report.phase = ScalePhase::TasksRunning;

                let steady = self
                    .await_steady(&key, spec.steady_state_timeout, &tail, cancel)
                    .await?
                    .require(&resource, OP_STEADY)?;
                report.steady_state = Some(steady);
                report.phase = ScalePhase::Steady;
                info!(service = %resource, phase = ?report.phase, "service steady");
            }
            report.units = self
                .inventory
                .collect_since(&key.cluster, &key.service, Some(&baseline))
                .await?;
            return Ok(report);
        }

        let ack = self
            .await_ack(&key, spec.desired_count, &tail, cancel.clone())
            .await?
            .require(&resource, OP_ACK)?;
        report.acknowledgement = Some(ack);
        report.phase = ScalePhase::DesiredCountAcked;
        info!(service = %resource, phase = ?report.phase, "desired count acknowledged");

        let running = self
            .await_running(&key, spec.desired_count, &tail, cancel.clone())
            .await?;
        let downsize = spec.desired_count <= previous;
        let running = match running.status {
            PollStatus::TimedOut if downsize => {
                warn!(
                    service = %resource,
                    last_observed = ?running.last_observed,
                    "tasks did not settle during downsize, continuing"
                );
                report.phase = ScalePhase::TasksRunningTimeout;
                running
            }
            _ => {
                let running = running.require(&resource, OP_RUNNING)?;
                report.phase = ScalePhase::TasksRunning;
                running
            }
        };
        report.running = Some(running);
        info!(service = %resource, phase = ?report.phase, "task wait finished");

        if report.is_upsize() {
            let steady = self
                .await_steady(&key, spec.steady_state_timeout, &tail, cancel)
                .await?
                .require(&resource, OP_STEADY)?;
            report.steady_state = Some(steady);
            report.phase = ScalePhase::Steady;
            info!(service = %resource, phase = ?report.phase, "service steady");
        }

        report.units = self
            .inventory
            .collect_since(&key.cluster, &key.service, Some(&baseline))
            .await?;
        Ok(report)
    }

    /// Wait for a daemon service (desired count owned by the platform) to
    /// run everywhere and settle, then return its inventory.
    ///
    /// A running-task timeout is tolerated; the steady-state wait is not.
    pub async fn await_daemon_steady_state(
        &self,
        cluster: &str,
        service: &str,
        steady_state_timeout: Duration,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ScaleReport> {
        let key = ServiceKey::new(cluster, service);
        let resource = key.to_string();
        let desc = describe(self.client.as_ref(), &key, &resource).await?;
        let tail = EventTail::new(&resource);
        tail.prime(&desc);

        let desired = desc.desired_count;
        let mut report = ScaleReport::new(key.clone(), ScaleAction::Unchanged, desired, desired);

        let running = self
            .await_running(&key, desired, &tail, cancel.clone())
            .await?;
        let running = match running.status {
            PollStatus::TimedOut => {
                warn!(
                    service = %resource,
                    last_observed = ?running.last_observed,
                    "daemon tasks did not settle, continuing"
                );
                report.phase = ScalePhase::TasksRunningTimeout;
                running
            }
            _ => {
                let running = running.require(&resource, OP_RUNNING)?;
                report.phase = ScalePhase::TasksRunning;
                running
            }
        };
        report.running = Some(running);

        let steady = self
            .await_steady(&key, steady_state_timeout, &tail, cancel)
            .await?
            .require(&resource, OP_STEADY)?;
        report.steady_state = Some(steady);
        report.phase = ScalePhase::Steady;

        report.units = self.inventory.collect(cluster, service).await?;
        info!(service = %resource, units = report.units.len(), "daemon service steady");
        Ok(report)
    }

    /// Names of every service in a cluster.
    pub async fn list_services(&self, cluster: &str) -> OrchestrationResult<Vec<String>> {
        let client = self.client.as_ref();
        paginate(move |token| async move { client.list_services(cluster, token.as_deref()).await })
            .await
            .during("list_services", cluster)
    }

    pub async fn delete_service(&self, cluster: &str, service: &str) -> OrchestrationResult<()> {
        let resource = ServiceKey::new(cluster, service).to_string();
        self.client
            .delete_service(cluster, service)
            .await
            .during("delete_service", &resource)?;
        info!(service = %resource, "service deleted");
        Ok(())
    }

    async fn await_ack(
        &self,
        key: &ServiceKey,
        requested: u32,
        tail: &EventTail,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ConvergenceOutcome<DesiredCountAck>> {
        let poller = ConvergencePoller::new(
            PollConfig::new(self.config.ack_poll_interval, self.config.ack_timeout),
            cancel,
        );
        let client = self.client.as_ref();
        let resource = key.to_string();
        let resource = resource.as_str();

        poller
            .await_convergence(OP_ACK, move || async move {
                let desc = describe(client, key, resource).await?;
                tail.observe(&desc);
                let ack = DesiredCountAck {
                    observed: desc.desired_count,
                    requested,
                };
                Ok::<_, OrchestrationError>(ConvergenceSample::new(ack.is_acked(), ack))
            })
            .await
    }

    async fn await_running(
        &self,
        key: &ServiceKey,
        desired: u32,
        tail: &EventTail,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ConvergenceOutcome<TaskProgress>> {
        let poller = ConvergencePoller::new(
            PollConfig::new(self.config.poll_interval, self.config.running_timeout),
            cancel,
        );
        let client = self.client.as_ref();
        let resource = key.to_string();
        let resource = resource.as_str();

        poller
            .await_convergence(OP_RUNNING, move || async move {
                let desc = describe(client, key, resource).await?;
                tail.observe(&desc);
                let progress = TaskProgress {
                    running: desc.running_count,
                    pending: desc.pending_count,
                    desired,
                };
                let complete = progress.is_complete();
                Ok::<_, OrchestrationError>(ConvergenceSample::new(complete, progress))
            })
            .await
    }

    async fn await_steady(
        &self,
        key: &ServiceKey,
        timeout: Duration,
        tail: &EventTail,
        cancel: CancelSignal,
    ) -> OrchestrationResult<ConvergenceOutcome<SteadyStateSnapshot>> {
        let poller =
            ConvergencePoller::new(PollConfig::new(self.config.poll_interval, timeout), cancel);
        let client = self.client.as_ref();
        let resource = key.to_string();
        let resource = resource.as_str();

        poller
            .await_convergence(OP_STEADY, move || async move {
                let desc = describe(client, key, resource).await?;
                tail.observe(&desc);
                let snapshot = SteadyStateSnapshot::assess(&desc);
                Ok::<_, OrchestrationError>(ConvergenceSample::new(snapshot.is_steady(), snapshot))
            })
            .await
    }
}

/// Describe a service that must exist.
async fn describe(
    client: &dyn CloudControlClient,
    key: &ServiceKey,
    resource: &str,
) -> OrchestrationResult<ServiceDescription> {
    client
        .describe_service(&key.cluster, &key.service)
        .await
        .during("describe_service", resource)?
        .ok_or_else(|| OrchestrationError::NotFound {
            resource: resource.to_string(),
            operation: "describe_service".to_string(),
        })
}

fn validate(spec: &ServiceSpec) -> OrchestrationResult<()> {
    if spec.cluster_name.trim().is_empty() || spec.service_name.trim().is_empty() {
        return Err(OrchestrationError::InvalidSpec(
            "cluster and service names must not be empty".to_string(),
        ));
    }
    if spec.task_definition.trim().is_empty() {
        return Err(OrchestrationError::InvalidSpec(format!(
            "service {}: task definition must not be empty",
            spec.key()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use shipyard_cloud::sim::{AckBehavior, ServiceBehavior, SimulatedCloud, TaskBehavior};
    use shipyard_converge::cancel_pair;
    use shipyard_inventory::{
        CollectorConfig, HostIntrospector, IntrospectionError, IntrospectionResponse, UnitStatus,
    };

    use super::*;

    /// Every host refuses; host-bound units fall back to host addresses.
    struct Unreachable;

    #[async_trait]
    impl HostIntrospector for Unreachable {
        async fn tasks(&self, host: &str) -> Result<IntrospectionResponse, IntrospectionError> {
            Err(IntrospectionError::Connect {
                address: host.to_string(),
                message: "connection refused".into(),
            })
        }
    }

    fn spec(desired: u32) -> ServiceSpec {
        ServiceSpec {
            cluster_name: "prod".into(),
            service_name: "web".into(),
            task_definition: "web:1".into(),
            desired_count: desired,
            steady_state_timeout: Duration::from_secs(300),
        }
    }

    fn setup() -> (Arc<SimulatedCloud>, ServiceScaler) {
        let sim = Arc::new(SimulatedCloud::new());
        sim.seed_cluster("prod");
        let inventory = TaskInventoryCollector::new(
            sim.clone(),
            Arc::new(Unreachable),
            CollectorConfig::default(),
        );
        let scaler = ServiceScaler::new(sim.clone(), inventory, ScalerConfig::default());
        (sim, scaler)
    }

    fn stuck(running: u32) -> ServiceBehavior {
        ServiceBehavior {
            tasks: TaskBehavior::Stuck { running },
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn creates_missing_service_and_waits_for_steady_state() {
        let (sim, scaler) = setup();
        let report = scaler.create_or_update(&spec(3), CancelSignal::never()).await.unwrap();

        assert_eq!(report.action, ScaleAction::Created);
        assert_eq!(report.previous_count, 0);
        assert_eq!(report.phase, ScalePhase::Steady);
        assert!(report.steady_state.as_ref().unwrap().succeeded());
        assert_eq!(report.units.len(), 3);
        assert!(report.units.iter().all(|u| u.new_unit));
        assert_eq!(sim.calls("create_service"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_desired_count_is_a_no_op() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 2);

        let first = scaler.create_or_update(&spec(2), CancelSignal::never()).await.unwrap();
        let second = scaler.create_or_update(&spec(2), CancelSignal::never()).await.unwrap();

        assert_eq!(first.action, ScaleAction::Unchanged);
        assert_eq!(second.action, ScaleAction::Unchanged);
        assert_eq!(sim.calls("update_service_desired_count"), 0);
        assert_eq!(sim.calls("create_service"), 0);
        assert_eq!(first.units, second.units);
        assert_eq!(first.units.len(), 2);
        assert!(first.units.iter().all(|u| !u.new_unit));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_resize_issues_one_update() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 1);

        let first = scaler.create_or_update(&spec(3), CancelSignal::never()).await.unwrap();
        let second = scaler.create_or_update(&spec(3), CancelSignal::never()).await.unwrap();

        assert_eq!(first.action, ScaleAction::Updated);
        assert_eq!(second.action, ScaleAction::Unchanged);
        assert_eq!(sim.calls("update_service_desired_count"), 1);
        let ids = |r: &ScaleReport| r.units.iter().map(|u| u.task_arn.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn downsize_tolerates_tasks_that_never_settle() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 5);
        sim.set_service_behavior("prod", "web", stuck(5));
        sim.drain_tasks("prod", "web");

        let report = scaler.create_or_update(&spec(2), CancelSignal::never()).await.unwrap();

        assert_eq!(report.action, ScaleAction::Updated);
        assert_eq!(report.previous_count, 5);
        assert_eq!(report.phase, ScalePhase::TasksRunningTimeout);
        let running = report.running.as_ref().unwrap();
        assert_eq!(running.status, PollStatus::TimedOut);
        assert_eq!(running.elapsed, Duration::from_secs(600));
        assert!(report.steady_state.is_none());
        assert!(report.units.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_timed_out_upsize_still_waits() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 2);
        sim.set_service_behavior("prod", "web", stuck(2));

        let first = scaler
            .create_or_update(&spec(5), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(first.is_timeout());

        let err = scaler
            .create_or_update(&spec(5), CancelSignal::never())
            .await
            .unwrap_err();

        match err {
            OrchestrationError::ProvisioningTimeout {
                operation,
                last_observed,
                ..
            } => {
                assert_eq!(operation, OP_RUNNING);
                assert_eq!(last_observed, "2/5 running, 3 pending");
            }
            other => panic!("expected timeout, got {other}"),
        }
        assert_eq!(sim.calls("update_service_desired_count"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_once_tasks_catch_up() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 2);
        sim.set_service_behavior("prod", "web", stuck(2));
        assert!(
            scaler
                .create_or_update(&spec(5), CancelSignal::never())
                .await
                .is_err()
        );

        sim.set_service_behavior("prod", "web", ServiceBehavior::default());
        let report = scaler
            .create_or_update(&spec(5), CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(report.action, ScaleAction::Unchanged);
        assert_eq!(report.units.len(), 5);
        assert_eq!(sim.calls("update_service_desired_count"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn upsize_fails_when_tasks_never_settle() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 2);
        sim.set_service_behavior("prod", "web", stuck(2));

        let err = scaler
            .create_or_update(&spec(5), CancelSignal::never())
            .await
            .unwrap_err();

        match err {
            OrchestrationError::ProvisioningTimeout {
                resource,
                operation,
                last_observed,
                ..
            } => {
                assert_eq!(resource, "prod/web");
                assert_eq!(operation, OP_RUNNING);
                assert_eq!(last_observed, "2/5 running, 3 pending");
            }
            other => panic!("expected timeout, got {other}"),
        }
        assert_eq!(sim.calls("update_service_desired_count"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_desired_count_is_fatal() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 1);
        sim.set_service_behavior(
            "prod",
            "web",
            ServiceBehavior {
                ack: AckBehavior::Never,
                ..Default::default()
            },
        );

        let err = scaler
            .create_or_update(&spec(3), CancelSignal::never())
            .await
            .unwrap_err();
        match err {
            OrchestrationError::ProvisioningTimeout {
                operation, elapsed, ..
            } => {
                assert_eq!(operation, OP_ACK);
                assert_eq!(elapsed, Duration::from_secs(60));
            }
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_acknowledgement_is_waited_for() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 1);
        sim.set_service_behavior(
            "prod",
            "web",
            ServiceBehavior {
                ack: AckBehavior::AfterPolls(3),
                ..Default::default()
            },
        );

        let report = scaler.create_or_update(&spec(2), CancelSignal::never()).await.unwrap();
        let ack = report.acknowledgement.unwrap();
        assert_eq!(ack.attempts, 3);
        assert_eq!(ack.elapsed, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_steady_signal_times_out_without_rollback() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 1);
        sim.set_service_behavior(
            "prod",
            "web",
            ServiceBehavior {
                steady_events: false,
                ..Default::default()
            },
        );

        let err = scaler
            .create_or_update(&spec(3), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains(OP_STEADY));

        let desc = sim.describe_service("prod", "web").await.unwrap().unwrap();
        assert_eq!(desc.desired_count, 3);
        assert_eq!(sim.calls("update_service_desired_count"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_reported_as_cancelled() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 2);
        sim.set_service_behavior("prod", "web", stuck(2));
        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            handle.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = scaler.create_or_update(&spec(1), signal).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() <= Duration::from_secs(12));
    }

    #[tokio::test]
    async fn rejected_update_is_not_retried() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "web", "web:1", 1);
        sim.reject_next("update_service_desired_count", "InvalidParameterException", "bad count");

        let err = scaler
            .create_or_update(&spec(4), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::ControlPlaneRejected { .. }));
        assert_eq!(sim.calls("update_service_desired_count"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn daemon_service_waits_for_steady_state() {
        let (sim, scaler) = setup();
        sim.seed_service("prod", "agent", "agent:1", 2);

        let report = scaler
            .await_daemon_steady_state(
                "prod",
                "agent",
                Duration::from_secs(120),
                CancelSignal::never(),
            )
            .await
            .unwrap();
        assert_eq!(report.phase, ScalePhase::Steady);
        assert_eq!(report.units.len(), 2);
        assert!(report.units.iter().all(|u| u.status == UnitStatus::Success));
        assert_eq!(sim.calls("update_service_desired_count"), 0);
    }

    #[tokio::test]
    async fn lists_and_deletes_services() {
        let (sim, scaler) = setup();
        for name in ["a", "b", "c"] {
            sim.seed_service("prod", name, "x:1", 0);
        }

        let mut names = scaler.list_services("prod").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(sim.calls("list_services") >= 2);

        scaler.delete_service("prod", "b").await.unwrap();
        assert_eq!(scaler.list_services("prod").await.unwrap(), vec!["a", "c"]);

        let err = scaler.delete_service("prod", "b").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::NotFound { .. }));
    }
}
