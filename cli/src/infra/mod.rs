//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, agent
//! launching and the coordination-store connection.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod launcher;
pub mod store;

pub use command_runner::TokioCommandRunner;
pub use launcher::{DockerLauncher, LocalLauncher};
pub use store::connect;
