//! Port trait definitions for the application layer.
//!
//! Ports are the contracts infrastructure fulfils. This file imports only
//! from `crate::domain` and `bootchain_common`, never from `crate::infra`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bootchain_common::{ReadyProbe, RunStatus};

use crate::domain::EnvironmentMap;

// ── Value Types ───────────────────────────────────────────────────────────────

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    /// Non-zero exit; `None` when the process was killed by a signal.
    Failure(Option<i32>),
    /// Killed after exceeding its time limit.
    TimedOut,
}

impl Exit {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<std::process::ExitStatus> for Exit {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            Self::Success
        } else {
            Self::Failure(status.code())
        }
    }
}

impl std::fmt::Display for Exit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("exit 0"),
            Self::Failure(Some(code)) => write!(f, "exit {code}"),
            Self::Failure(None) => f.write_str("killed by signal"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

// ── Process Ports ─────────────────────────────────────────────────────────────

/// Starts container commands. Commands inherit the agent's stdio and
/// environment, overlaid with the given map.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    type Child: RunningProcess;

    /// Run `argv` to completion, killing it once `timeout` elapses.
    async fn run(
        &self,
        argv: &[String],
        env: &EnvironmentMap,
        timeout: Option<Duration>,
    ) -> Result<Exit>;

    /// Spawn `argv` without waiting for it.
    fn spawn(&self, argv: &[String], env: &EnvironmentMap) -> Result<Self::Child>;
}

/// A spawned main process.
#[allow(async_fn_in_trait)]
pub trait RunningProcess {
    /// Exit of the process if it has already ended.
    fn try_wait(&mut self) -> Result<Option<Exit>>;

    /// Wait for the process to end. Cancel-safe.
    async fn wait(&mut self) -> Result<Exit>;

    /// Forcibly terminate the process and reap it.
    async fn kill(&mut self) -> Result<()>;
}

/// Evaluates a main process's readiness probe once.
#[allow(async_fn_in_trait)]
pub trait ReadinessProbe {
    async fn check(&self, probe: &ReadyProbe, env: &EnvironmentMap) -> bool;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Access to the configuration files a container substitutes. Sync trait,
/// the files are small.
pub trait ConfigFiles {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

// ── Store-facing Ports ────────────────────────────────────────────────────────

/// Publishes this container's run state.
#[allow(async_fn_in_trait)]
pub trait StatusSink {
    async fn publish(&self, status: RunStatus) -> Result<()>;
}
