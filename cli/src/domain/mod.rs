//! Domain layer: pure graph validation and its error types.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod error;
pub mod graph;

pub use error::{AppError, GraphError};
pub use graph::{find_cycle, find_duplicate, find_unknown_dependency, launch_order, validate};
