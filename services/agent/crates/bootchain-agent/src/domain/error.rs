//! Typed agent error enums.
//!
//! All variants convert to `anyhow::Error` through `?`; `main` prints the
//! chain and exits non-zero.

use thiserror::Error;

use crate::domain::process::{ProcessRole, ProcessState};

// ── Bootstrap errors ──────────────────────────────────────────────────────────

/// Reasons an agent stops without reaching a clean shutdown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("container '{container}' is not part of application '{app}'")]
    UnknownContainer { app: String, container: String },

    #[error("no application description published for '{0}'. Run 'bootchain deploy' first.")]
    NotDeployed(String),

    #[error("dependency '{0}' failed before this container could start")]
    DependencyFailed(String),

    #[error("process group of '{0}' failed to start")]
    GroupFailed(String),

    #[error("main process of '{0}' exited unexpectedly")]
    MainExited(String),
}

// ── Process errors ────────────────────────────────────────────────────────────

/// A lifecycle move the process state machine does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{role} process cannot move from {from} to {to}")]
pub struct ProcessError {
    pub role: ProcessRole,
    pub from: ProcessState,
    pub to: ProcessState,
}
