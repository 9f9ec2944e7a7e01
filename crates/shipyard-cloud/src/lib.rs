//! shipyard-cloud: control-plane facade for Shipyard.
//!
//! A thin, call-per-request interface over the cloud provider's node-group,
//! cluster, service, task, and revision-deployment APIs. Nothing in this
//! crate waits or retries; convergence lives in `shipyard-converge` and the
//! components built on top of it.
//!
//! # Architecture
//!
//! ```text
//! CloudControlClient (Send + Sync, shared as Arc<dyn …>)
//!   ├── clusters      create / describe
//!   ├── node groups   create / update / describe
//!   ├── services      create / update desired count / describe / list / delete
//!   ├── tasks         list running / describe / container instances / hosts
//!   └── revisions     applications, groups, configs, deployments, instances
//! ```
//!
//! `sim::SimulatedCloud` is a scriptable in-memory implementation used by
//! the tests of every downstream crate. It is only built with the `sim`
//! feature, which those crates enable as a dev-dependency.

pub mod client;
pub mod error;
pub mod pagination;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod types;

pub use client::CloudControlClient;
pub use error::{CloudError, CloudResult};
pub use pagination::paginate;
pub use types::*;
