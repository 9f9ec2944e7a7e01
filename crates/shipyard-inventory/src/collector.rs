//! Running-task inventory collection.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use shipyard_cloud::{
    id_from_arn, short_runtime_id, CloudControlClient, HostInstance, ServiceKey, TaskRecord,
    TaskStatus,
};
use shipyard_converge::{CloudResultExt, OrchestrationResult};

use crate::introspect::{HostIntrospector, HttpIntrospector};
use crate::placement::{
    interface_address, main_container, ExecutionUnit, PlacementMode, UnitStatus,
};

/// Ids per container-instance / task description request.
const DESCRIBE_CHUNK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Upper bound on concurrent host introspection calls.
    pub max_concurrent_introspections: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_introspections: 8,
        }
    }
}

/// Everything needed to resolve one task, gathered up front.
#[derive(Debug, Clone)]
struct UnitContext {
    task: TaskRecord,
    placement: PlacementMode,
    host_id: Option<String>,
    host: Option<HostInstance>,
    main_container: Option<String>,
    new_unit: bool,
}

impl UnitContext {
    fn task_id(&self) -> String {
        id_from_arn(&self.task.arn).to_string()
    }

    fn host_address(&self) -> Option<String> {
        self.host.as_ref().and_then(|h| h.private_ip.clone())
    }

    fn unit(&self, id: String, status: UnitStatus, note: Option<String>) -> ExecutionUnit {
        let main = self
            .main_container
            .as_deref()
            .and_then(|name| self.task.containers.iter().find(|c| c.name == name));
        let host_address = self.host_address();
        let network_address = interface_address(&self.task, main).or_else(|| host_address.clone());
        ExecutionUnit {
            id,
            task_id: self.task_id(),
            task_arn: self.task.arn.clone(),
            host_id: self.host_id.clone(),
            host_address,
            network_address,
            placement: self.placement,
            status,
            new_unit: self.new_unit,
            note,
        }
    }

    /// Host address as the id, or the task id when no host is known.
    fn fallback(&self, note: String) -> ExecutionUnit {
        match self.host_address() {
            Some(address) => self.unit(address, UnitStatus::Success, Some(note)),
            None => self.unit(self.task_id(), UnitStatus::Failed, Some(note)),
        }
    }
}

/// Resolves a service's running tasks into execution units.
#[derive(Clone)]
pub struct TaskInventoryCollector {
    client: Arc<dyn CloudControlClient>,
    introspector: Arc<dyn HostIntrospector>,
    config: CollectorConfig,
}

impl TaskInventoryCollector {
    pub fn new(
        client: Arc<dyn CloudControlClient>,
        introspector: Arc<dyn HostIntrospector>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            client,
            introspector,
            config,
        }
    }

    /// Collector using the HTTP agent endpoint on its well-known port.
    pub fn with_http(client: Arc<dyn CloudControlClient>, config: CollectorConfig) -> Self {
        Self::new(client, Arc::new(HttpIntrospector::default()), config)
    }

    /// ARNs of the service's running tasks.
    pub async fn running_task_arns(
        &self,
        cluster: &str,
        service: &str,
    ) -> OrchestrationResult<Vec<String>> {
        let key = ServiceKey::new(cluster, service).to_string();
        self.client
            .list_running_tasks(cluster, service)
            .await
            .during("list_running_tasks", &key)
    }

    /// Current inventory of a service.
    pub async fn collect(
        &self,
        cluster: &str,
        service: &str,
    ) -> OrchestrationResult<Vec<ExecutionUnit>> {
        self.collect_since(cluster, service, None).await
    }

    /// Current inventory, flagging units whose task is not in `baseline`.
    ///
    /// Only control-plane failures while listing or describing tasks are
    /// errors. Everything after that degrades per unit.
    pub async fn collect_since(
        &self,
        cluster: &str,
        service: &str,
        baseline: Option<&HashSet<String>>,
    ) -> OrchestrationResult<Vec<ExecutionUnit>> {
        let key = ServiceKey::new(cluster, service).to_string();

        let arns = self.running_task_arns(cluster, service).await?;
        if arns.is_empty() {
            info!(service = %key, "no running tasks");
            return Ok(Vec::new());
        }

        let mut tasks = Vec::with_capacity(arns.len());
        for chunk in arns.chunks(DESCRIBE_CHUNK) {
            let described = self
                .client
                .describe_tasks(cluster, chunk)
                .await
                .during("describe_tasks", &key)?;
            tasks.extend(described);
        }

        let (running, skipped): (Vec<TaskRecord>, Vec<TaskRecord>) = tasks
            .into_iter()
            .partition(|t| t.last_status == TaskStatus::Running);
        for task in &skipped {
            debug!(
                service = %key,
                task = %task.arn,
                status = ?task.last_status,
                "skipping task that is not running"
            );
        }
        if running.is_empty() {
            info!(service = %key, listed = arns.len(), "no task reported as running");
            return Ok(Vec::new());
        }

        let tags = self.main_container_tags(&running).await;
        let hosts = self.resolve_hosts(cluster, &running).await;

        let contexts: Vec<UnitContext> = running
            .into_iter()
            .map(|task| {
                let placement = PlacementMode::of(&task);
                let host_id = task
                    .container_instance_arn
                    .as_ref()
                    .and_then(|ci| hosts.container_hosts.get(ci).cloned());
                let host = host_id.as_ref().and_then(|id| hosts.hosts.get(id).cloned());
                let main_container = main_container(&task, tags.get(&task.task_definition_arn))
                    .map(|c| c.name.clone());
                let new_unit = baseline.is_some_and(|b| !b.contains(&task.arn));
                UnitContext {
                    task,
                    placement,
                    host_id,
                    host,
                    main_container,
                    new_unit,
                }
            })
            .collect();

        let units = self.resolve_all(contexts).await;
        let degraded = units.iter().filter(|u| u.is_degraded()).count();
        info!(service = %key, units = units.len(), degraded, "inventory collected");
        Ok(units)
    }

    /// Task-definition tags for multi-container tasks. Failures degrade to
    /// "first container".
    async fn main_container_tags(
        &self,
        tasks: &[TaskRecord],
    ) -> HashMap<String, HashMap<String, String>> {
        let definitions: BTreeSet<&str> = tasks
            .iter()
            .filter(|t| t.containers.len() > 1)
            .map(|t| t.task_definition_arn.as_str())
            .collect();

        let mut tags = HashMap::new();
        for definition in definitions {
            match self.client.describe_task_definition_tags(definition).await {
                Ok(t) => {
                    tags.insert(definition.to_string(), t);
                }
                Err(e) => {
                    warn!(
                        task_definition = definition,
                        error = %e,
                        "task definition tags unavailable"
                    );
                }
            }
        }
        tags
    }

    /// Container instance → host id → host metadata, best effort.
    async fn resolve_hosts(&self, cluster: &str, tasks: &[TaskRecord]) -> HostIndex {
        let mut index = HostIndex::default();

        let container_instances: Vec<String> = tasks
            .iter()
            .filter(|t| PlacementMode::of(t) == PlacementMode::HostBound)
            .filter_map(|t| t.container_instance_arn.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if container_instances.is_empty() {
            return index;
        }

        for chunk in container_instances.chunks(DESCRIBE_CHUNK) {
            match self.client.describe_container_instances(cluster, chunk).await {
                Ok(found) => {
                    for ci in found {
                        index.container_hosts.insert(ci.arn, ci.host_id);
                    }
                }
                Err(e) => {
                    warn!(
                        cluster,
                        count = chunk.len(),
                        error = %e,
                        "container instances unavailable"
                    );
                }
            }
        }

        let host_ids: Vec<String> = index
            .container_hosts
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if host_ids.is_empty() {
            return index;
        }
        match self.client.describe_hosts(&host_ids).await {
            Ok(found) => {
                for host in found {
                    index.hosts.insert(host.id.clone(), host);
                }
            }
            Err(e) => {
                warn!(cluster, count = host_ids.len(), error = %e, "host metadata unavailable");
            }
        }
        index
    }

    /// Resolve every context with bounded concurrency, preserving order.
    async fn resolve_all(&self, contexts: Vec<UnitContext>) -> Vec<ExecutionUnit> {
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_introspections.max(1)));
        let fallbacks: Vec<ExecutionUnit> = contexts
            .iter()
            .map(|ctx| ctx.fallback("introspection task aborted; using host address".to_string()))
            .collect();

        let mut set = JoinSet::new();
        for (idx, ctx) in contexts.into_iter().enumerate() {
            let limit = limit.clone();
            let introspector = self.introspector.clone();
            set.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                (idx, resolve(ctx, introspector.as_ref()).await)
            });
        }

        let mut slots: Vec<Option<ExecutionUnit>> = vec![None; fallbacks.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, unit)) => slots[idx] = Some(unit),
                Err(e) => warn!(error = %e, "unit resolution task failed"),
            }
        }

        slots
            .into_iter()
            .zip(fallbacks)
            .map(|(slot, fallback)| slot.unwrap_or(fallback))
            .collect()
    }
}

#[derive(Default)]
struct HostIndex {
    container_hosts: HashMap<String, String>,
    hosts: HashMap<String, HostInstance>,
}

/// Dispatch on placement mode.
async fn resolve(ctx: UnitContext, introspector: &dyn HostIntrospector) -> ExecutionUnit {
    match ctx.placement {
        PlacementMode::NetworkBound => resolve_network_bound(&ctx),
        PlacementMode::HostBound => resolve_host_bound(&ctx, introspector).await,
    }
}

fn resolve_network_bound(ctx: &UnitContext) -> ExecutionUnit {
    let main = ctx
        .main_container
        .as_deref()
        .and_then(|name| ctx.task.containers.iter().find(|c| c.name == name));
    let id = main
        .and_then(|c| c.runtime_id.as_deref())
        .map(|rid| short_runtime_id(rid).to_string())
        .unwrap_or_else(|| ctx.task_id());

    if interface_address(&ctx.task, main).is_none() {
        warn!(task = %ctx.task.arn, "network-bound task has no interface address");
        return ctx.unit(
            id,
            UnitStatus::Failed,
            Some("network-bound task reports no interface address".to_string()),
        );
    }
    ctx.unit(
        id,
        UnitStatus::Success,
        Some(
            "network-bound placement: addressed by task interface, \
             per-process identification unavailable"
                .to_string(),
        ),
    )
}

async fn resolve_host_bound(
    ctx: &UnitContext,
    introspector: &dyn HostIntrospector,
) -> ExecutionUnit {
    let Some(host_address) = ctx.host_address() else {
        warn!(task = %ctx.task.arn, host = ?ctx.host_id, "backing host not resolved");
        return ctx.fallback("backing host could not be resolved".to_string());
    };

    match introspector.tasks(&host_address).await {
        Ok(listing) => {
            let container = listing
                .find(&ctx.task.arn)
                .and_then(|t| t.container(ctx.main_container.as_deref()));
            match container {
                Some(c) => ctx.unit(
                    short_runtime_id(&c.docker_id).to_string(),
                    UnitStatus::Success,
                    None,
                ),
                None => {
                    warn!(
                        task = %ctx.task.arn,
                        host = %host_address,
                        "task missing from host listing"
                    );
                    ctx.fallback(
                        "task not listed by host introspection; using host address".to_string(),
                    )
                }
            }
        }
        Err(e) => {
            warn!(
                task = %ctx.task.arn,
                host = %host_address,
                error = %e,
                "host introspection failed"
            );
            ctx.fallback(format!("host introspection failed ({e}); using host address"))
        }
    }
}
