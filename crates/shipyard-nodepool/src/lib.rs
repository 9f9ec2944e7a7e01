//! shipyard-nodepool: brings a cluster's node pool to size.
//!
//! `NodePoolProvisioner` creates the cluster shell (idempotently), creates
//! or resizes the backing node group, and then gates on two independent
//! conditions in order:
//!
//! 1. every node-group member is `InService`
//! 2. the cluster reports every node as registered capacity
//!
//! Either gate timing out is fatal. A pool where all nodes are in service
//! but only some registered is not provisioned.

pub mod provisioner;
pub mod readiness;

pub use provisioner::{
    ClusterHandle, NodeGroupAction, NodePoolProvisioner, NodePoolReport, ProvisionedCluster,
    ProvisionerConfig,
};
pub use readiness::{NodeReadiness, Registration};
