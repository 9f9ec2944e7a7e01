//! shipyard-revision: revision-based deployments to a host fleet.
//!
//! Independent of the service path. A deployment is submitted once, polled
//! until it reaches a terminal status, and then resolved into the set of
//! hosts that took part. Status only ever moves forward.

pub mod orchestrator;
pub mod revision;

pub use orchestrator::{DeploymentRevisionOrchestrator, RevisionConfig};
pub use revision::DeploymentRevision;
