//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Graph errors ──────────────────────────────────────────────────────────────

/// Structural problems in the dependency graph of an application. Any of
/// these aborts a deployment before a single agent is launched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Container '{0}' is declared more than once.")]
    DuplicateContainer(String),

    #[error("Container '{container}' requires '{dependency}', which is not declared.")]
    UnknownDependency {
        container: String,
        dependency: String,
    },

    #[error("Dependency cycle through '{container}': {}", path.join(" -> "))]
    Cycle {
        container: String,
        path: Vec<String>,
    },
}

// ── Application errors ────────────────────────────────────────────────────────

/// Errors about the state of a deployed application in the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Application '{0}' is not deployed. Deploy it first: bootchain deploy <file>")]
    NotDeployed(String),

    #[error("Container '{0}' declares no image; the docker launcher needs one.")]
    MissingImage(String),

    #[error(
        "Application '{app}' is still running ({}). Stop it first: bootchain stop {app}",
        containers.join(", ")
    )]
    StillRunning { app: String, containers: Vec<String> },
}
