//! Domain layer: pure bootstrap logic.
//!
//! Nothing here touches `tokio`, `std::fs`, `std::process` or the
//! coordination store. Functions take data in and return data out.

pub mod environment;
pub mod error;
pub mod process;
pub mod readiness;
pub mod substitution;

pub use environment::{EnvironmentMap, Resolution, UnresolvedAlias, resolve};
pub use error::{AgentError, ProcessError};
pub use process::{MainHandler, ProcessHandle, ProcessRole, ProcessState};
pub use readiness::{NodeChange, ReadinessSnapshot, ServiceNode};
pub use substitution::{Substitution, substitute};
