//! shipyard: container-cluster provisioning and rolling-deployment orchestration.
//!
//! The `Orchestrator` wires the component crates together over one shared
//! control-plane client:
//!
//! ```text
//! ClusterSpec ─► NodePoolProvisioner ─► ServiceScaler ─► TaskInventoryCollector ─► RolloutReport
//!                (shell, size, gates)   (ack, running,    (host-bound /
//!                                        steady state)     network-bound units)
//!
//! RevisionLocation ─► DeploymentRevisionOrchestrator ─► DeploymentRevision
//! ```
//!
//! Every wait goes through `shipyard_converge::ConvergencePoller` and honours
//! the caller's `CancelSignal`. Timing knobs come from `OrchestratorConfig`,
//! which the embedding program may load from TOML.

pub mod config;
pub mod orchestrator;

pub use config::{parse_duration, ComponentConfigs, ConfigError, OrchestratorConfig};
pub use orchestrator::{Orchestrator, RolloutReport, RolloutSummary};

pub use shipyard_cloud as cloud;
pub use shipyard_converge as converge;
pub use shipyard_inventory as inventory;
pub use shipyard_nodepool as nodepool;
pub use shipyard_revision as revision;
pub use shipyard_service as service;

pub use shipyard_converge::{
    cancel_pair, CancelHandle, CancelSignal, OrchestrationError, OrchestrationResult,
};
