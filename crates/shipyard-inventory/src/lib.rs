//! shipyard-inventory: turns running tasks into execution units.
//!
//! Tasks come in two placement models. Host-bound tasks run on a registered
//! virtual machine, so the collector resolves the host and asks its local
//! introspection endpoint which runtime container backs the task.
//! Network-bound tasks own a network interface and expose no host; their
//! address comes straight from the interface.
//!
//! Collection is best-effort per unit. An unreachable host, a task missing
//! from the introspection response, or an unresolvable host yields a unit
//! with a diagnostic note instead of an error, so one bad host never fails
//! the whole inventory.

pub mod collector;
pub mod introspect;
pub mod placement;

pub use collector::{CollectorConfig, TaskInventoryCollector};
pub use introspect::{
    HostIntrospector, HttpIntrospector, IntrospectedContainer, IntrospectedTask,
    IntrospectionError, IntrospectionResponse, INTROSPECTION_PATH, INTROSPECTION_PORT,
};
pub use placement::{ExecutionUnit, PlacementMode, UnitStatus, MAIN_CONTAINER_TAG};
