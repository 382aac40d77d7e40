//! Application layer: the bootstrap use case and the services it drives.
//!
//! Modules here import only from `crate::domain`, `bootchain_common` and
//! `crate::application::ports`, never from `crate::infra`.

pub mod bootstrap;
pub mod executor;
pub mod files;
pub mod ports;
pub mod shutdown;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use bootstrap::{AgentOptions, AgentOutcome, AgentPorts, StoreStatusSink, run_agent};
pub use executor::ProcessGroupExecutor;
pub use shutdown::ShutdownSignal;
pub use tracker::{ReadinessTracker, WaitOutcome};
