//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and shared types, never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use bootchain_common::ContainerSpec;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Everything a launcher needs to start the agent of one container.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// Application the container belongs to.
    pub app: &'a str,
    /// Container the agent will run.
    pub container: &'a ContainerSpec,
    /// Coordination store URL handed to the agent.
    pub store_url: &'a str,
}

/// A started agent, as reported by its launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedAgent {
    pub container: String,
    /// Launcher-specific handle: a process id or a docker container id.
    pub handle: String,
}

// ── Launcher Port ─────────────────────────────────────────────────────────────

/// Starts one bootchain agent per container. The agent takes over from
/// there; a launcher never waits for the container to become ready.
#[allow(async_fn_in_trait)]
pub trait ContainerLauncher {
    /// Check, before anything is published, that every container of the
    /// application can be launched. Launchers without requirements accept all.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first container that cannot be launched.
    fn preflight(&self, containers: &[ContainerSpec]) -> Result<()> {
        let _ = containers;
        Ok(())
    }

    /// Start the agent described by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent cannot be started.
    async fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchedAgent>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
