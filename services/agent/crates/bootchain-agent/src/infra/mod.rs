//! Infrastructure adapters for the agent's ports.

pub mod command_runner;
pub mod fs;
pub mod probe;

pub use command_runner::{TokioChild, TokioCommandRunner};
pub use fs::LocalFs;
pub use probe::SystemProbe;
