//! shipyard-service: scales long-running services and waits for them.
//!
//! One `ServiceScaler::create_or_update` call walks a small state machine:
//!
//! ```text
//! Requested ─▶ DesiredCountAcked ─▶ TasksRunning ─────────▶ Steady (upsize only)
//!                                 └▶ TasksRunningTimeout   (downsize only, non-fatal)
//! ```
//!
//! An unchanged desired count skips every wait. Whatever path is taken, the
//! caller gets the service's current execution-unit inventory back.

pub mod events;
pub mod progress;
pub mod scaler;
pub mod steady;

pub use events::EventTail;
pub use progress::{DesiredCountAck, TaskProgress};
pub use scaler::{ScaleAction, ScalePhase, ScaleReport, ScalerConfig, ServiceScaler};
pub use steady::{is_steady_signal, SteadyStateSnapshot, STEADY_STATE_SUFFIX};
