//! shipyard-converge: bounded waiting for remote state.
//!
//! Every long-running orchestration step in Shipyard reduces to "ask the
//! control plane, compare, sleep, ask again". This crate owns that loop
//! (`ConvergencePoller`), the cancellation signal threaded through it, and
//! the `OrchestrationError` taxonomy shared by all components.

pub mod cancel;
pub mod error;
pub mod poller;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use error::{CloudResultExt, OrchestrationError, OrchestrationResult};
pub use poller::{
    ConvergenceOutcome, ConvergencePoller, ConvergenceSample, PollConfig, PollStatus,
    MIN_POLL_INTERVAL,
};
