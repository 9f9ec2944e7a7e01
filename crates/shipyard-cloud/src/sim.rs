//! In-memory simulated control plane.
//!
//! `SimulatedCloud` implements `CloudControlClient` against plain maps and
//! a logical clock. Tests script its behaviour per cluster and per service
//! (slow acknowledgements, tasks that never converge, capped node
//! registration, rejected calls, deployment status sequences) and read back
//! call counters to assert on the requests that were actually issued.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::client::CloudControlClient;
use crate::error::{CloudError, CloudResult};
use crate::types::*;

/// Default page size for simulated enumerations.
const DEFAULT_PAGE_SIZE: usize = 2;

/// How a new desired count is acknowledged by the simulated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// Visible in the very next describe.
    #[default]
    Immediate,
    /// Visible after this many describes.
    AfterPolls(u32),
    /// Never visible.
    Never,
}

/// How running tasks follow the acknowledged desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskBehavior {
    /// Tasks are started/stopped until `running == desired`.
    #[default]
    Converge,
    /// `running_count` is pinned; the task list is left alone.
    Stuck { running: u32 },
}

/// Per-service behaviour script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceBehavior {
    pub ack: AckBehavior,
    pub tasks: TaskBehavior,
    pub launch_type: LaunchType,
    /// Emit "has reached a steady state." events after converging.
    pub steady_events: bool,
    /// Start an `envoy` sidecar ahead of the `app` container in every task.
    pub sidecar: bool,
}

impl Default for ServiceBehavior {
    fn default() -> Self {
        Self {
            ack: AckBehavior::Immediate,
            tasks: TaskBehavior::Converge,
            launch_type: LaunchType::Ec2,
            steady_events: true,
            sidecar: false,
        }
    }
}

/// Per-cluster node-pool behaviour script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodePoolBehavior {
    /// At most this many members ever reach `InService`.
    pub in_service_cap: Option<u32>,
    /// At most this many nodes ever register with the cluster.
    pub registration_cap: Option<u32>,
}

struct SimNodeGroup {
    cluster: String,
    desired: u32,
    min: u32,
    max: u32,
    launch_template_id: String,
    instance_ids: Vec<String>,
}

struct SimService {
    desc: ServiceDescription,
    requested: u32,
    polls_since_update: u32,
    tasks: Vec<TaskRecord>,
}

struct SimDeployment {
    info: DeploymentInfo,
    script: VecDeque<RevisionStatus>,
    instances: Vec<String>,
}

#[derive(Default)]
struct SimState {
    clock_ms: u64,
    seq: u64,
    page_size: usize,
    calls: HashMap<String, usize>,
    rejections: HashMap<String, VecDeque<CloudError>>,

    clusters: BTreeMap<String, ClusterDescription>,
    node_groups: BTreeMap<String, SimNodeGroup>,
    node_behavior: HashMap<String, NodePoolBehavior>,
    hosts: BTreeMap<String, HostInstance>,
    /// container-instance ARN → (cluster, host id)
    container_instances: BTreeMap<String, (String, String)>,
    placement_cursor: usize,

    services: BTreeMap<ServiceKey, SimService>,
    service_behavior: HashMap<ServiceKey, ServiceBehavior>,
    task_definition_tags: HashMap<String, HashMap<String, String>>,

    applications: Vec<String>,
    deployment_groups: BTreeMap<(String, String), DeploymentGroupInfo>,
    deployment_configs: Vec<String>,
    deployment_scripts: VecDeque<Vec<RevisionStatus>>,
    deployment_hosts: Vec<String>,
    deployment_error: Option<DeploymentErrorInfo>,
    deployments: BTreeMap<String, SimDeployment>,
    host_failures: HashMap<String, (String, String)>,
}

impl SimState {
    fn tick(&mut self) -> u64 {
        self.clock_ms += 1000;
        self.clock_ms
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Count the call and surface an injected rejection, if any.
    fn enter(&mut self, op: &str) -> CloudResult<()> {
        *self.calls.entry(op.to_string()).or_default() += 1;
        if let Some(queue) = self.rejections.get_mut(op)
            && let Some(err) = queue.pop_front()
        {
            debug!(op, "simulated rejection");
            return Err(err);
        }
        Ok(())
    }

    fn page(&self, items: &[String], token: Option<&str>) -> CloudResult<Page<String>> {
        let start = match token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| CloudError::rejected("InvalidNextTokenException", t))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let slice = items.get(start..end).unwrap_or_default().to_vec();
        let next_token = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: slice,
            next_token,
        })
    }

    fn behavior(&self, key: &ServiceKey) -> ServiceBehavior {
        self.service_behavior.get(key).copied().unwrap_or_default()
    }

    fn node_behavior(&self, cluster: &str) -> NodePoolBehavior {
        self.node_behavior.get(cluster).copied().unwrap_or_default()
    }

    fn in_service_ids(&self, group: &SimNodeGroup) -> Vec<String> {
        let cap = self
            .node_behavior(&group.cluster)
            .in_service_cap
            .map(|c| c as usize)
            .unwrap_or(usize::MAX);
        group.instance_ids.iter().take(cap).cloned().collect()
    }

    fn registered_count(&self, cluster: &str) -> u32 {
        let in_service: usize = self
            .node_groups
            .values()
            .filter(|g| g.cluster == cluster)
            .map(|g| self.in_service_ids(g).len())
            .sum();
        let cap = self
            .node_behavior(cluster)
            .registration_cap
            .map(|c| c as usize)
            .unwrap_or(usize::MAX);
        in_service.min(cap) as u32
    }

    fn register_host(&mut self, cluster: &str, host_id: &str) -> String {
        let n = self.hosts.len() as u64 + 1;
        self.hosts
            .entry(host_id.to_string())
            .or_insert_with(|| HostInstance {
                id: host_id.to_string(),
                private_ip: Some(format!("10.0.{}.{}", n / 250, n % 250 + 1)),
                private_dns: Some(format!("ip-10-0-{}-{}.sim.internal", n / 250, n % 250 + 1)),
                zone: Some("sim-1a".to_string()),
                state: "running".to_string(),
            });
        let arn = format!("arn:sim:ecs:container-instance/{cluster}/{host_id}");
        self.container_instances
            .insert(arn.clone(), (cluster.to_string(), host_id.to_string()));
        arn
    }

    fn reconcile_node_group(&mut self, name: &str) {
        let Some(group) = self.node_groups.get(name) else {
            return;
        };
        let cluster = group.cluster.clone();
        let target = group.desired as usize;
        let mut ids = group.instance_ids.clone();
        while ids.len() < target {
            let seq = self.next_seq();
            ids.push(format!("i-{seq:08x}"));
        }
        ids.truncate(target);
        for id in &ids {
            self.register_host(&cluster, id);
        }
        if let Some(group) = self.node_groups.get_mut(name) {
            group.instance_ids = ids;
        }
    }

    /// Pick a container instance in `cluster`, registering one if none exist.
    fn place(&mut self, cluster: &str) -> String {
        let candidates: Vec<String> = self
            .container_instances
            .iter()
            .filter(|(_, (c, _))| c == cluster)
            .map(|(arn, _)| arn.clone())
            .collect();
        if candidates.is_empty() {
            let seq = self.next_seq();
            return self.register_host(cluster, &format!("i-{seq:08x}"));
        }
        let arn = candidates[self.placement_cursor % candidates.len()].clone();
        self.placement_cursor += 1;
        arn
    }

    fn make_task(
        &mut self,
        key: &ServiceKey,
        behavior: ServiceBehavior,
        task_def: &str,
    ) -> TaskRecord {
        let seq = self.next_seq();
        let runtime_id = |base: u64| format!("{:012x}{}", base + seq, "0".repeat(52));
        let launch_type = behavior.launch_type;
        let (container_instance_arn, network_interfaces) = match launch_type {
            LaunchType::Fargate => (
                None,
                vec![NetworkInterface {
                    attachment_id: format!("eni-attach-{seq:06}"),
                    private_ipv4: Some(format!("10.1.{}.{}", seq / 250, seq % 250 + 1)),
                }],
            ),
            LaunchType::Ec2 | LaunchType::External => (Some(self.place(&key.cluster)), Vec::new()),
        };

        let mut containers = Vec::new();
        if behavior.sidecar {
            containers.push(ContainerRecord {
                name: "envoy".to_string(),
                arn: format!("arn:sim:ecs:container/{}/{seq:016x}-envoy", key.cluster),
                runtime_id: Some(runtime_id(0xe000_0000_0000)),
                network_interfaces: network_interfaces.clone(),
            });
        }
        containers.push(ContainerRecord {
            name: "app".to_string(),
            arn: format!("arn:sim:ecs:container/{}/{seq:016x}", key.cluster),
            runtime_id: Some(runtime_id(0xa1b2_0000_0000)),
            network_interfaces,
        });

        TaskRecord {
            arn: format!("arn:sim:ecs:task/{}/{seq:016x}", key.cluster),
            task_definition_arn: task_def.to_string(),
            launch_type,
            last_status: TaskStatus::Running,
            desired_status: TaskStatus::Running,
            container_instance_arn,
            containers,
        }
    }

    /// Move an acknowledged service towards its desired count.
    fn settle_tasks(&mut self, key: &ServiceKey) {
        let behavior = self.behavior(key);
        let Some(svc) = self.services.get(key) else {
            return;
        };
        let desired = svc.desc.desired_count;
        let have = svc.tasks.len() as u32;
        let task_def = svc.desc.task_definition.clone();

        match behavior.tasks {
            TaskBehavior::Stuck { running } => {
                if let Some(svc) = self.services.get_mut(key) {
                    svc.desc.running_count = running;
                    svc.desc.pending_count = desired.saturating_sub(running);
                }
            }
            TaskBehavior::Converge => {
                let converged_before = svc.desc.running_count == desired && have == desired;
                let mut new_tasks = Vec::new();
                for _ in have..desired {
                    new_tasks.push(self.make_task(key, behavior, &task_def));
                }
                let now = self.tick();
                let seq = self.next_seq();
                let Some(svc) = self.services.get_mut(key) else {
                    return;
                };
                svc.tasks.extend(new_tasks);
                svc.tasks.truncate(desired as usize);
                svc.desc.running_count = desired;
                svc.desc.pending_count = 0;
                if !converged_before {
                    svc.desc.deployments = vec![ServiceDeployment {
                        id: format!("deploy-{seq:06}"),
                        status: "PRIMARY".to_string(),
                        desired_count: desired,
                        running_count: desired,
                        updated_at_ms: now,
                    }];
                    if behavior.steady_events {
                        svc.desc.events.push(ServiceEvent {
                            id: format!("ev-{seq:06}"),
                            created_at_ms: now + 1,
                            message: format!(
                                "(service {}) has reached a steady state.",
                                key.service
                            ),
                        });
                    }
                }
            }
        }
    }
}

/// Scriptable in-memory control plane.
pub struct SimulatedCloud {
    state: Mutex<SimState>,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                page_size: DEFAULT_PAGE_SIZE,
                ..SimState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Scripting ──────────────────────────────────────────────────

    /// Number of times `op` (the trait method name) was called.
    pub fn calls(&self, op: &str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    /// Make the next call to `op` fail with a rejection.
    pub fn reject_next(&self, op: &str, code: &str, message: &str) {
        self.state()
            .rejections
            .entry(op.to_string())
            .or_default()
            .push_back(CloudError::rejected(code, message));
    }

    pub fn set_page_size(&self, size: usize) {
        self.state().page_size = size.max(1);
    }

    pub fn set_node_pool_behavior(&self, cluster: &str, behavior: NodePoolBehavior) {
        self.state()
            .node_behavior
            .insert(cluster.to_string(), behavior);
    }

    pub fn set_service_behavior(&self, cluster: &str, service: &str, behavior: ServiceBehavior) {
        self.state()
            .service_behavior
            .insert(ServiceKey::new(cluster, service), behavior);
    }

    /// Create a cluster without counting a call.
    pub fn seed_cluster(&self, name: &str) {
        self.state().clusters.insert(
            name.to_string(),
            ClusterDescription {
                name: name.to_string(),
                status: "ACTIVE".to_string(),
                registered_node_count: 0,
                running_task_count: 0,
                active_service_count: 0,
            },
        );
    }

    /// Register `count` fresh hosts with a cluster; tasks are placed on
    /// them round-robin. Returns the host ids.
    pub fn seed_hosts(&self, cluster: &str, count: u32) -> Vec<String> {
        let mut state = self.state();
        (0..count)
            .map(|_| {
                let seq = state.next_seq();
                let id = format!("i-{seq:08x}");
                state.register_host(cluster, &id);
                id
            })
            .collect()
    }

    /// Create a service that is already converged at `desired` tasks.
    pub fn seed_service(&self, cluster: &str, service: &str, task_definition: &str, desired: u32) {
        let key = ServiceKey::new(cluster, service);
        let mut state = self.state();
        state.services.insert(
            key.clone(),
            SimService {
                desc: ServiceDescription {
                    cluster: cluster.to_string(),
                    name: service.to_string(),
                    status: "ACTIVE".to_string(),
                    task_definition: task_definition.to_string(),
                    desired_count: desired,
                    running_count: 0,
                    pending_count: desired,
                    deployments: Vec::new(),
                    events: Vec::new(),
                },
                requested: desired,
                polls_since_update: 0,
                tasks: Vec::new(),
            },
        );
        state.settle_tasks(&key);
    }

    /// Drop every task of a service from the running list.
    pub fn drain_tasks(&self, cluster: &str, service: &str) {
        if let Some(svc) = self.state().services.get_mut(&ServiceKey::new(cluster, service)) {
            svc.tasks.clear();
        }
    }

    /// Override the reported status of the `index`-th task of a service.
    pub fn set_task_status(&self, cluster: &str, service: &str, index: usize, status: TaskStatus) {
        if let Some(task) = self
            .state()
            .services
            .get_mut(&ServiceKey::new(cluster, service))
            .and_then(|svc| svc.tasks.get_mut(index))
        {
            task.last_status = status;
        }
    }

    /// Snapshot of a service's current tasks.
    pub fn tasks_of(&self, cluster: &str, service: &str) -> Vec<TaskRecord> {
        self.state()
            .services
            .get(&ServiceKey::new(cluster, service))
            .map(|svc| svc.tasks.clone())
            .unwrap_or_default()
    }

    /// Forget a host so that lookups for it come back empty.
    pub fn forget_host(&self, host_id: &str) {
        self.state().hosts.remove(host_id);
    }

    pub fn set_task_definition_tags(&self, task_definition: &str, tags: &[(&str, &str)]) {
        self.state().task_definition_tags.insert(
            task_definition.to_string(),
            tags.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn add_host(&self, host_id: &str, private_ip: &str) {
        self.state().hosts.insert(
            host_id.to_string(),
            HostInstance {
                id: host_id.to_string(),
                private_ip: Some(private_ip.to_string()),
                private_dns: None,
                zone: Some("sim-1a".to_string()),
                state: "running".to_string(),
            },
        );
    }

    pub fn fail_host_lookup(&self, host_id: &str, code: &str, message: &str) {
        self.state()
            .host_failures
            .insert(host_id.to_string(), (code.to_string(), message.to_string()));
    }

    pub fn add_application(&self, name: &str, groups: &[&str]) {
        let mut state = self.state();
        state.applications.push(name.to_string());
        for group in groups {
            state.deployment_groups.insert(
                (name.to_string(), group.to_string()),
                DeploymentGroupInfo {
                    application: name.to_string(),
                    name: group.to_string(),
                    deployment_config: None,
                    target_revision: None,
                },
            );
        }
    }

    pub fn add_deployment_config(&self, name: &str) {
        self.state().deployment_configs.push(name.to_string());
    }

    pub fn set_target_revision(&self, application: &str, group: &str, revision: RevisionLocation) {
        if let Some(info) = self
            .state()
            .deployment_groups
            .get_mut(&(application.to_string(), group.to_string()))
        {
            info.target_revision = Some(revision);
        }
    }

    /// Status sequence returned by successive `get_deployment` calls for the
    /// next created deployment. The last status sticks.
    pub fn script_next_deployment(&self, statuses: &[RevisionStatus]) {
        self.state().deployment_scripts.push_back(statuses.to_vec());
    }

    /// Hosts reported as participants of subsequently created deployments.
    pub fn set_deployment_hosts(&self, host_ids: &[&str]) {
        self.state().deployment_hosts = host_ids.iter().map(|h| h.to_string()).collect();
    }

    pub fn set_deployment_error(&self, code: &str, message: &str) {
        self.state().deployment_error = Some(DeploymentErrorInfo {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
}

#[async_trait]
impl CloudControlClient for SimulatedCloud {
    async fn create_cluster(&self, name: &str) -> CloudResult<ClusterDescription> {
        let mut state = self.state();
        state.enter("create_cluster")?;
        if state.clusters.contains_key(name) {
            return Err(CloudError::AlreadyExists(format!("cluster {name}")));
        }
        let desc = ClusterDescription {
            name: name.to_string(),
            status: "ACTIVE".to_string(),
            registered_node_count: 0,
            running_task_count: 0,
            active_service_count: 0,
        };
        state.clusters.insert(name.to_string(), desc.clone());
        Ok(desc)
    }

    async fn describe_cluster(&self, name: &str) -> CloudResult<ClusterDescription> {
        let mut state = self.state();
        state.enter("describe_cluster")?;
        let mut desc = state
            .clusters
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("cluster {name}")))?;
        desc.registered_node_count = state.registered_count(name);
        let services: Vec<&SimService> = state
            .services
            .iter()
            .filter(|(k, _)| k.cluster == name)
            .map(|(_, s)| s)
            .collect();
        desc.active_service_count = services.len() as u32;
        desc.running_task_count = services.iter().map(|s| s.tasks.len() as u32).sum();
        Ok(desc)
    }

    async fn describe_node_group(&self, name: &str) -> CloudResult<Option<NodeGroup>> {
        let mut state = self.state();
        state.enter("describe_node_group")?;
        let Some(group) = state.node_groups.get(name) else {
            return Ok(None);
        };
        let in_service = state.in_service_ids(group);
        let instances = group
            .instance_ids
            .iter()
            .map(|id| NodeInstance {
                id: id.clone(),
                zone: "sim-1a".to_string(),
                lifecycle_state: if in_service.contains(id) {
                    LIFECYCLE_IN_SERVICE.to_string()
                } else {
                    "Pending".to_string()
                },
            })
            .collect();
        Ok(Some(NodeGroup {
            name: name.to_string(),
            desired: group.desired,
            min: group.min,
            max: group.max,
            launch_template_id: Some(group.launch_template_id.clone()),
            instances,
        }))
    }

    async fn create_node_group(&self, request: &NodeGroupRequest) -> CloudResult<()> {
        let mut state = self.state();
        state.enter("create_node_group")?;
        if state.node_groups.contains_key(&request.name) {
            return Err(CloudError::AlreadyExists(format!("node group {}", request.name)));
        }
        if request.desired > request.max || request.desired < request.min {
            return Err(CloudError::rejected(
                "ValidationError",
                format!(
                    "desired {} outside [{}, {}]",
                    request.desired, request.min, request.max
                ),
            ));
        }
        state.node_groups.insert(
            request.name.clone(),
            SimNodeGroup {
                cluster: request.cluster.clone(),
                desired: request.desired,
                min: request.min,
                max: request.max,
                launch_template_id: request.launch_template_id.clone(),
                instance_ids: Vec::new(),
            },
        );
        state.reconcile_node_group(&request.name);
        Ok(())
    }

    async fn update_node_group(&self, request: &NodeGroupRequest) -> CloudResult<()> {
        let mut state = self.state();
        state.enter("update_node_group")?;
        let group = state
            .node_groups
            .get_mut(&request.name)
            .ok_or_else(|| CloudError::NotFound(format!("node group {}", request.name)))?;
        group.desired = request.desired;
        group.min = request.min;
        group.max = request.max;
        group.launch_template_id = request.launch_template_id.clone();
        state.reconcile_node_group(&request.name);
        Ok(())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> CloudResult<Option<ServiceDescription>> {
        let mut state = self.state();
        state.enter("describe_service")?;
        let key = ServiceKey::new(cluster, service);
        let behavior = state.behavior(&key);
        let Some(svc) = state.services.get_mut(&key) else {
            return Ok(None);
        };
        if svc.desc.desired_count != svc.requested {
            svc.polls_since_update += 1;
            let acked = match behavior.ack {
                AckBehavior::Immediate => true,
                AckBehavior::AfterPolls(n) => svc.polls_since_update >= n,
                AckBehavior::Never => false,
            };
            if acked {
                svc.desc.desired_count = svc.requested;
            }
        }
        state.settle_tasks(&key);
        Ok(state.services.get(&key).map(|svc| svc.desc.clone()))
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>> {
        let mut state = self.state();
        state.enter("list_services")?;
        let names: Vec<String> = state
            .services
            .keys()
            .filter(|k| k.cluster == cluster)
            .map(|k| k.service.clone())
            .collect();
        state.page(&names, next_token)
    }

    async fn create_service(
        &self,
        request: &CreateServiceRequest,
    ) -> CloudResult<ServiceDescription> {
        let mut state = self.state();
        state.enter("create_service")?;
        if !state.clusters.contains_key(&request.cluster) {
            return Err(CloudError::rejected(
                "ClusterNotFoundException",
                format!("cluster {} not found", request.cluster),
            ));
        }
        let key = ServiceKey::new(&request.cluster, &request.service_name);
        if state.services.contains_key(&key) {
            return Err(CloudError::rejected(
                "InvalidParameterException",
                format!("service {key} already exists"),
            ));
        }
        let now = state.tick();
        let desc = ServiceDescription {
            cluster: request.cluster.clone(),
            name: request.service_name.clone(),
            status: "ACTIVE".to_string(),
            task_definition: request.task_definition.clone(),
            desired_count: request.desired_count,
            running_count: 0,
            pending_count: request.desired_count,
            deployments: vec![ServiceDeployment {
                id: format!("deploy-create-{now}"),
                status: "PRIMARY".to_string(),
                desired_count: request.desired_count,
                running_count: 0,
                updated_at_ms: now,
            }],
            events: Vec::new(),
        };
        state.services.insert(
            key,
            SimService {
                desc: desc.clone(),
                requested: request.desired_count,
                polls_since_update: 0,
                tasks: Vec::new(),
            },
        );
        Ok(desc)
    }

    async fn update_service_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> CloudResult<ServiceDescription> {
        let mut state = self.state();
        state.enter("update_service_desired_count")?;
        let key = ServiceKey::new(cluster, service);
        let behavior = state.behavior(&key);
        let now = state.tick();
        let svc = state
            .services
            .get_mut(&key)
            .ok_or_else(|| CloudError::NotFound(format!("service {key}")))?;
        svc.requested = desired_count;
        svc.polls_since_update = 0;
        if behavior.ack == AckBehavior::Immediate {
            svc.desc.desired_count = desired_count;
        }
        // A new deployment record rolls in next to the current one.
        svc.desc.deployments.push(ServiceDeployment {
            id: format!("deploy-update-{now}"),
            status: "PRIMARY".to_string(),
            desired_count,
            running_count: svc.desc.running_count,
            updated_at_ms: now,
        });
        Ok(svc.desc.clone())
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> CloudResult<()> {
        let mut state = self.state();
        state.enter("delete_service")?;
        let key = ServiceKey::new(cluster, service);
        state
            .services
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("service {key}")))
    }

    async fn list_running_tasks(&self, cluster: &str, service: &str) -> CloudResult<Vec<String>> {
        let mut state = self.state();
        state.enter("list_running_tasks")?;
        Ok(state
            .services
            .get(&ServiceKey::new(cluster, service))
            .map(|svc| svc.tasks.iter().map(|t| t.arn.clone()).collect())
            .unwrap_or_default())
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> CloudResult<Vec<TaskRecord>> {
        let mut state = self.state();
        state.enter("describe_tasks")?;
        Ok(state
            .services
            .iter()
            .filter(|(k, _)| k.cluster == cluster)
            .flat_map(|(_, svc)| svc.tasks.iter())
            .filter(|t| task_arns.contains(&t.arn))
            .cloned()
            .collect())
    }

    async fn describe_task_definition_tags(
        &self,
        task_definition_arn: &str,
    ) -> CloudResult<HashMap<String, String>> {
        let mut state = self.state();
        state.enter("describe_task_definition_tags")?;
        Ok(state
            .task_definition_tags
            .get(task_definition_arn)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instance_arns: &[String],
    ) -> CloudResult<Vec<ContainerInstance>> {
        let mut state = self.state();
        state.enter("describe_container_instances")?;
        if container_instance_arns.len() > 100 {
            return Err(CloudError::rejected(
                "InvalidParameterException",
                "at most 100 container instances per request",
            ));
        }
        Ok(container_instance_arns
            .iter()
            .filter_map(|arn| {
                state
                    .container_instances
                    .get(arn)
                    .filter(|(c, _)| c == cluster)
                    .map(|(_, host)| ContainerInstance {
                        arn: arn.clone(),
                        host_id: host.clone(),
                    })
            })
            .collect())
    }

    async fn describe_hosts(&self, host_ids: &[String]) -> CloudResult<Vec<HostInstance>> {
        let mut state = self.state();
        state.enter("describe_hosts")?;
        Ok(host_ids
            .iter()
            .filter_map(|id| state.hosts.get(id).cloned())
            .collect())
    }

    async fn list_applications(&self, next_token: Option<&str>) -> CloudResult<Page<String>> {
        let mut state = self.state();
        state.enter("list_applications")?;
        let apps = state.applications.clone();
        state.page(&apps, next_token)
    }

    async fn list_deployment_groups(
        &self,
        application: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>> {
        let mut state = self.state();
        state.enter("list_deployment_groups")?;
        let groups: Vec<String> = state
            .deployment_groups
            .keys()
            .filter(|(app, _)| app == application)
            .map(|(_, group)| group.clone())
            .collect();
        state.page(&groups, next_token)
    }

    async fn list_deployment_configs(&self, next_token: Option<&str>) -> CloudResult<Page<String>> {
        let mut state = self.state();
        state.enter("list_deployment_configs")?;
        let configs = state.deployment_configs.clone();
        state.page(&configs, next_token)
    }

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> CloudResult<String> {
        let mut state = self.state();
        state.enter("create_deployment")?;
        let group_key = (
            request.application.clone(),
            request.deployment_group.clone(),
        );
        if !state.deployment_groups.contains_key(&group_key) {
            return Err(CloudError::rejected(
                "DeploymentGroupDoesNotExistException",
                format!(
                    "{}/{} does not exist",
                    request.application, request.deployment_group
                ),
            ));
        }
        let seq = state.next_seq();
        let id = format!("d-{seq:08X}");
        let script = state
            .deployment_scripts
            .pop_front()
            .unwrap_or_else(|| vec![RevisionStatus::InProgress, RevisionStatus::Succeeded]);
        let instances = state.deployment_hosts.clone();
        state.deployments.insert(
            id.clone(),
            SimDeployment {
                info: DeploymentInfo {
                    id: id.clone(),
                    application: request.application.clone(),
                    deployment_group: request.deployment_group.clone(),
                    status: RevisionStatus::Pending,
                    error: None,
                },
                script: script.into(),
                instances,
            },
        );
        Ok(id)
    }

    async fn get_deployment(&self, deployment_id: &str) -> CloudResult<DeploymentInfo> {
        let mut state = self.state();
        state.enter("get_deployment")?;
        let error = state.deployment_error.clone();
        let deployment = state
            .deployments
            .get_mut(deployment_id)
            .ok_or_else(|| CloudError::NotFound(format!("deployment {deployment_id}")))?;
        if let Some(next) = deployment.script.pop_front() {
            deployment.info.status = next;
        }
        if matches!(
            deployment.info.status,
            RevisionStatus::Failed | RevisionStatus::Stopped
        ) {
            deployment.info.error = error;
        }
        Ok(deployment.info.clone())
    }

    async fn list_deployment_instances(
        &self,
        deployment_id: &str,
        next_token: Option<&str>,
    ) -> CloudResult<Page<String>> {
        let mut state = self.state();
        state.enter("list_deployment_instances")?;
        let instances = state
            .deployments
            .get(deployment_id)
            .map(|d| d.instances.clone())
            .ok_or_else(|| CloudError::NotFound(format!("deployment {deployment_id}")))?;
        state.page(&instances, next_token)
    }

    async fn describe_host(&self, host_id: &str) -> CloudResult<HostInstance> {
        let mut state = self.state();
        state.enter("describe_host")?;
        if let Some((code, message)) = state.host_failures.get(host_id) {
            return Err(CloudError::rejected(code.clone(), message.clone()));
        }
        state
            .hosts
            .get(host_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("host {host_id}")))
    }

    async fn get_deployment_group(
        &self,
        application: &str,
        deployment_group: &str,
    ) -> CloudResult<DeploymentGroupInfo> {
        let mut state = self.state();
        state.enter("get_deployment_group")?;
        state
            .deployment_groups
            .get(&(application.to_string(), deployment_group.to_string()))
            .cloned()
            .ok_or_else(|| {
                CloudError::NotFound(format!("deployment group {application}/{deployment_group}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_cluster_twice_reports_already_exists() {
        let sim = SimulatedCloud::new();
        sim.create_cluster("prod").await.unwrap();
        let err = sim.create_cluster("prod").await.unwrap_err();
        assert!(matches!(err, CloudError::AlreadyExists(_)));
        assert_eq!(sim.calls("create_cluster"), 2);
    }

    #[tokio::test]
    async fn registration_cap_limits_registered_nodes() {
        let sim = SimulatedCloud::new();
        sim.seed_cluster("prod");
        sim.set_node_pool_behavior(
            "prod",
            NodePoolBehavior {
                in_service_cap: None,
                registration_cap: Some(2),
            },
        );
        sim.create_node_group(&NodeGroupRequest {
            name: "prod-nodes".to_string(),
            cluster: "prod".to_string(),
            launch_template_id: "lt".to_string(),
            desired: 3,
            min: 1,
            max: 6,
            network: NetworkPlacement::default(),
        })
        .await
        .unwrap();

        let group = sim.describe_node_group("prod-nodes").await.unwrap().unwrap();
        assert_eq!(group.in_service_count(), 3);
        let cluster = sim.describe_cluster("prod").await.unwrap();
        assert_eq!(cluster.registered_node_count, 2);
    }

    #[tokio::test]
    async fn delayed_ack_becomes_visible_after_polls() {
        let sim = SimulatedCloud::new();
        sim.seed_service("prod", "web", "web:1", 1);
        sim.set_service_behavior(
            "prod",
            "web",
            ServiceBehavior {
                ack: AckBehavior::AfterPolls(2),
                ..Default::default()
            },
        );
        sim.update_service_desired_count("prod", "web", 3).await.unwrap();

        let first = sim.describe_service("prod", "web").await.unwrap().unwrap();
        assert_eq!(first.desired_count, 1);
        let second = sim.describe_service("prod", "web").await.unwrap().unwrap();
        assert_eq!(second.desired_count, 3);
        assert_eq!(second.running_count, 3);
        assert_eq!(sim.tasks_of("prod", "web").len(), 3);
    }

    #[tokio::test]
    async fn injected_rejection_is_one_shot() {
        let sim = SimulatedCloud::new();
        sim.reject_next("list_applications", "AccessDenied", "nope");
        assert!(sim.list_applications(None).await.is_err());
        assert!(sim.list_applications(None).await.is_ok());
    }

    #[tokio::test]
    async fn pages_carry_continuation_tokens() {
        let sim = SimulatedCloud::new();
        for app in ["a", "b", "c"] {
            sim.add_application(app, &[]);
        }
        let first = sim.list_applications(None).await.unwrap();
        assert_eq!(first.items, vec!["a", "b"]);
        let second = sim
            .list_applications(first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.items, vec!["c"]);
        assert!(second.next_token.is_none());
    }
}
