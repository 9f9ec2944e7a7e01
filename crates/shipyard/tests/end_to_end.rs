//! Provision, scale and deploy against the simulated control plane.

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;

use shipyard::cloud::sim::{NodePoolBehavior, SimulatedCloud};
use shipyard::cloud::{ClusterSpec, NetworkPlacement, RevisionLocation, RevisionStatus, ServiceSpec};
use shipyard::inventory::{
    HostIntrospector, IntrospectedContainer, IntrospectedTask, IntrospectionError,
    IntrospectionResponse, PlacementMode, UnitStatus,
};
use shipyard::service::ScalePhase;
use shipyard::{
    CancelSignal, ComponentConfigs, OrchestrationError, Orchestrator, OrchestratorConfig,
    cancel_pair,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Every host reports the full task list of one service.
struct FleetIntrospector {
    sim: Arc<SimulatedCloud>,
    cluster: &'static str,
    service: &'static str,
}

#[async_trait]
impl HostIntrospector for FleetIntrospector {
    async fn tasks(&self, _host: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let tasks = self
            .sim
            .tasks_of(self.cluster, self.service)
            .into_iter()
            .map(|t| IntrospectedTask {
                arn: t.arn,
                known_status: Some("RUNNING".into()),
                containers: t
                    .containers
                    .into_iter()
                    .filter_map(|c| {
                        c.runtime_id.map(|id| IntrospectedContainer {
                            docker_id: id,
                            name: Some(c.name),
                        })
                    })
                    .collect(),
            })
            .collect();
        Ok(IntrospectionResponse { tasks })
    }
}

fn cluster_spec(nodes: u32) -> ClusterSpec {
    ClusterSpec {
        name: "prod".into(),
        node_group_name: None,
        desired_node_count: nodes,
        min_node_count: None,
        max_node_count: None,
        launch_template_id: "lt-0abc".into(),
        network: NetworkPlacement {
            zones: vec!["sim-1a".into()],
            subnets: vec!["subnet-1".into()],
        },
    }
}

fn service_spec(desired: u32) -> ServiceSpec {
    ServiceSpec {
        cluster_name: "prod".into(),
        service_name: "web".into(),
        task_definition: "web:7".into(),
        desired_count: desired,
        steady_state_timeout: Duration::from_secs(300),
    }
}

fn orchestrator(sim: &Arc<SimulatedCloud>) -> Orchestrator {
    let introspector = Arc::new(FleetIntrospector {
        sim: sim.clone(),
        cluster: "prod",
        service: "web",
    });
    Orchestrator::with_introspector(sim.clone(), introspector, ComponentConfigs::default())
}

#[tokio::test(start_paused = true)]
async fn provision_and_scale_yields_host_bound_inventory() {
    init_tracing();
    let sim = Arc::new(SimulatedCloud::new());
    let orchestrator = orchestrator(&sim);

    let report = orchestrator
        .provision_and_scale(&cluster_spec(3), &service_spec(3), CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(report.cluster.registered_node_count, 3);
    assert_eq!((report.node_pool.min, report.node_pool.max), (1, 6));
    assert_eq!(report.service.phase, ScalePhase::Steady);

    let units = report.units();
    assert_eq!(units.len(), 3);
    for unit in units {
        assert_eq!(unit.placement, PlacementMode::HostBound);
        assert_eq!(unit.status, UnitStatus::Success);
        assert_eq!(unit.id.len(), 12);
        assert!(unit.note.is_none());
        assert!(unit.new_unit);
    }
    let mut hosts: Vec<_> = units.iter().filter_map(|u| u.host_id.clone()).collect();
    hosts.sort();
    hosts.dedup();
    assert_eq!(hosts.len(), 3);

    let summary = report.summary();
    assert_eq!(summary.service, "prod/web");
    assert_eq!(summary.units.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_rollout_is_idempotent() {
    init_tracing();
    let sim = Arc::new(SimulatedCloud::new());
    let orchestrator = orchestrator(&sim);

    let first = orchestrator
        .provision_and_scale(&cluster_spec(2), &service_spec(2), CancelSignal::never())
        .await
        .unwrap();
    let second = orchestrator
        .provision_and_scale(&cluster_spec(2), &service_spec(2), CancelSignal::never())
        .await
        .unwrap();

    assert!(!second.cluster.created);
    assert_eq!(
        second.node_pool.action,
        shipyard::nodepool::NodeGroupAction::Unchanged
    );
    assert_eq!(sim.calls("update_node_group"), 0);
    assert_eq!(sim.calls("create_service"), 1);
    assert_eq!(sim.calls("update_service_desired_count"), 0);

    let ids = |r: &shipyard::RolloutReport| {
        let mut ids: Vec<_> = r.units().iter().map(|u| u.id.clone()).collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&first), ids(&second));
    assert!(second.units().iter().all(|u| !u.new_unit));
}

#[tokio::test(start_paused = true)]
async fn partial_registration_stops_before_the_service() {
    init_tracing();
    let sim = Arc::new(SimulatedCloud::new());
    sim.set_node_pool_behavior(
        "prod",
        NodePoolBehavior {
            in_service_cap: None,
            registration_cap: Some(4),
        },
    );
    let orchestrator = orchestrator(&sim);

    let err = orchestrator
        .provision_and_scale(&cluster_spec(5), &service_spec(2), CancelSignal::never())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("4/5 registered"));
    assert_eq!(sim.calls("create_service"), 0);
}

#[tokio::test(start_paused = true)]
async fn mismatched_cluster_is_rejected_up_front() {
    let sim = Arc::new(SimulatedCloud::new());
    let orchestrator = orchestrator(&sim);
    let mut service = service_spec(1);
    service.cluster_name = "staging".into();

    let err = orchestrator
        .provision_and_scale(&cluster_spec(1), &service, CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::InvalidSpec(_)));
    assert_eq!(sim.calls("create_cluster"), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_provisioning() {
    init_tracing();
    let sim = Arc::new(SimulatedCloud::new());
    sim.set_node_pool_behavior(
        "prod",
        NodePoolBehavior {
            in_service_cap: Some(1),
            registration_cap: None,
        },
    );
    let orchestrator = orchestrator(&sim);
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = orchestrator
        .provision_and_scale(&cluster_spec(3), &service_spec(3), signal)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(started.elapsed() <= Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn revision_deploy_through_configured_orchestrator() {
    init_tracing();
    let sim = Arc::new(SimulatedCloud::new());
    sim.add_application("shop", &["blue"]);
    sim.add_host("i-1", "10.0.0.1");
    sim.set_deployment_hosts(&["i-1"]);
    sim.script_next_deployment(&[
        RevisionStatus::InProgress,
        RevisionStatus::InProgress,
        RevisionStatus::Succeeded,
    ]);

    let config = OrchestratorConfig::from_toml_str(
        r#"
        [revision]
        poll_interval = "15s"
        deployment_config = "OneAtATime"
        "#,
    )
    .unwrap();
    let orchestrator = Orchestrator::from_config(sim.clone(), &config).unwrap();

    let revision = RevisionLocation::GitHub {
        repository: "acme/shop".into(),
        commit_id: "9f1c2d3".into(),
    };
    assert!(orchestrator.needs_deploy("shop", "blue", &revision).await.unwrap());

    let started = tokio::time::Instant::now();
    let deployed = orchestrator
        .deploy_revision("shop", "blue", &revision, CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(deployed.status, RevisionStatus::Succeeded);
    assert_eq!(deployed.hosts.len(), 1);
    assert_eq!(started.elapsed(), Duration::from_secs(30));

    sim.set_target_revision("shop", "blue", revision.clone());
    assert!(!orchestrator.needs_deploy("shop", "blue", &revision).await.unwrap());
}
