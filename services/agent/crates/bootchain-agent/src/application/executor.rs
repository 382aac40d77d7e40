//! Runs a container's process group: pre-main, main, post-main, and the
//! stop sequence on shutdown.
//!
//! Abort semantics:
//! - a failing pre-main command with `abort_on_failure` ends the group before
//!   main starts; without it the failure is logged and the phase continues;
//! - main failing to start or to become initialized ends the group;
//! - a failing post-main command with `abort_on_failure` ends the group and
//!   kills the already running main;
//! - stop commands are best-effort and all of them run.

use anyhow::Result;
use bootchain_common::{CommandSpec, ContainerSpec, ProcessGroupSpec, ReadyProbe, RunStatus};
use tokio::time::{Duration, Instant};

use crate::application::ports::{CommandRunner, Exit, ReadinessProbe, RunningProcess, StatusSink};
use crate::domain::{EnvironmentMap, MainHandler, ProcessHandle, ProcessRole, ProcessState};

pub struct ProcessGroupExecutor<'a, R: CommandRunner, P> {
    runner: &'a R,
    probe: &'a P,
    container: String,
    group: ProcessGroupSpec,
    handler: MainHandler,
    env: EnvironmentMap,
    handles: Vec<ProcessHandle>,
    main_handle: ProcessHandle,
    main: Option<R::Child>,
}

impl<'a, R, P> ProcessGroupExecutor<'a, R, P>
where
    R: CommandRunner,
    P: ReadinessProbe,
{
    pub fn new(runner: &'a R, probe: &'a P, spec: &ContainerSpec, env: EnvironmentMap) -> Self {
        Self {
            runner,
            probe,
            container: spec.name.clone(),
            group: spec.process.clone(),
            handler: MainHandler::for_container(spec),
            env,
            handles: Vec::new(),
            main_handle: ProcessHandle::main(&spec.process.main.command),
            main: None,
        }
    }

    /// Handles of every side command run so far, in execution order.
    #[must_use]
    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    #[must_use]
    pub fn main_handle(&self) -> &ProcessHandle {
        &self.main_handle
    }

    /// Run pre-main, main and post-main. Returns `Ok(false)` when the group
    /// aborted; the caller then publishes `failed` and runs [`Self::stop`].
    /// `Err` is reserved for faults of the agent itself.
    pub async fn run_group(&mut self, sink: &impl StatusSink) -> Result<bool> {
        if !self.run_phase(ProcessRole::PreMain).await? {
            tracing::error!(container = %self.container, "pre-main aborted, main not started");
            return Ok(false);
        }
        if !self.start_main(sink).await? {
            return Ok(false);
        }
        if !self.run_phase(ProcessRole::PostMain).await? {
            tracing::error!(container = %self.container, "post-main aborted, stopping main");
            self.kill_main().await;
            return Ok(false);
        }
        tracing::info!(container = %self.container, "process group started");
        Ok(true)
    }

    /// Run every stop command, then terminate main if it is still running.
    pub async fn stop(&mut self) {
        for (index, spec) in self.group.stop.clone().iter().enumerate() {
            if let Err(e) = self.run_side(ProcessRole::Stop, index + 1, spec).await {
                tracing::warn!(container = %self.container, error = %e, "stop command bookkeeping failed");
            }
        }
        self.kill_main().await;
    }

    /// Resolve when a running main process exits. Never resolves when there
    /// is no main process to supervise, such as after a task completed.
    pub async fn wait_main_exit(&mut self) -> Exit {
        let Some(child) = self.main.as_mut() else {
            return std::future::pending().await;
        };
        let exit = child.wait().await.unwrap_or(Exit::Failure(None));
        self.main = None;
        if !self.main_handle.state().is_terminal() {
            let _ = self.main_handle.advance(ProcessState::Failed);
        }
        exit
    }

    fn phase(&self, role: ProcessRole) -> Vec<CommandSpec> {
        match role {
            ProcessRole::PreMain => self.group.pre.clone(),
            ProcessRole::PostMain => self.group.post.clone(),
            ProcessRole::Stop => self.group.stop.clone(),
            ProcessRole::Main => Vec::new(),
        }
    }

    /// Returns `false` when an abort-on-failure command failed.
    async fn run_phase(&mut self, role: ProcessRole) -> Result<bool> {
        for (index, spec) in self.phase(role).iter().enumerate() {
            if !self.run_side(role, index + 1, spec).await? && spec.abort_on_failure {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn run_side(&mut self, role: ProcessRole, index: usize, spec: &CommandSpec) -> Result<bool> {
        let mut handle = ProcessHandle::side(role, index, spec);
        handle.advance(ProcessState::Initializing)?;
        tracing::info!(container = %self.container, phase = %role, index, command = %spec.command, "running");

        let ok = match self
            .runner
            .run(&spec.command.argv(), &self.env, spec.timeout())
            .await
        {
            Ok(exit) if exit.is_success() => true,
            Ok(exit) => {
                tracing::warn!(
                    container = %self.container, phase = %role, index, %exit,
                    abort = spec.abort_on_failure, "command failed"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    container = %self.container, phase = %role, index, error = %e,
                    abort = spec.abort_on_failure, "command could not run"
                );
                false
            }
        };
        handle.advance(if ok { ProcessState::Stopped } else { ProcessState::Failed })?;
        self.handles.push(handle);
        Ok(ok)
    }

    async fn start_main(&mut self, sink: &impl StatusSink) -> Result<bool> {
        let command = &self.group.main.command;
        self.main_handle.advance(ProcessState::Initializing)?;
        tracing::info!(container = %self.container, kind = ?self.handler, %command, "starting main");

        let mut child = match self.runner.spawn(&command.argv(), &self.env) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(container = %self.container, error = %e, "main failed to start");
                self.main_handle.advance(ProcessState::Failed)?;
                return Ok(false);
            }
        };
        sink.publish(RunStatus::Running).await?;

        let initialized = match self.handler.clone() {
            MainHandler::Service { probe: None, .. } => match child.try_wait()? {
                None => true,
                Some(exit) => {
                    tracing::error!(container = %self.container, %exit, "main exited right after start");
                    false
                }
            },
            MainHandler::Service {
                probe: Some(probe),
                timeout,
            } => self.await_probe(&mut child, &probe, timeout).await?,
            MainHandler::Task { timeout } => await_task(&self.container, &mut child, timeout).await,
        };

        if !initialized {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill().await;
            }
            self.main_handle.advance(ProcessState::Failed)?;
            return Ok(false);
        }

        self.main_handle.mark_initialized();
        match self.handler {
            MainHandler::Service { .. } => {
                self.main_handle.advance(ProcessState::Running)?;
                self.main = Some(child);
            }
            MainHandler::Task { .. } => self.main_handle.advance(ProcessState::Stopped)?,
        }
        sink.publish(RunStatus::Initialized).await?;
        tracing::info!(container = %self.container, "main initialized");
        Ok(true)
    }

    /// Poll `probe` until it passes, main exits, or `timeout` elapses.
    async fn await_probe(
        &self,
        child: &mut R::Child,
        probe: &ReadyProbe,
        timeout: Duration,
    ) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(exit) = child.try_wait()? {
                tracing::error!(container = %self.container, %exit, "main exited before becoming ready");
                return Ok(false);
            }
            if self.probe.check(probe, &self.env).await {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                tracing::error!(container = %self.container, ?timeout, "main not ready in time");
                return Ok(false);
            }
            tokio::time::sleep(probe.interval()).await;
        }
    }

    async fn kill_main(&mut self) {
        if let Some(mut child) = self.main.take() {
            if matches!(child.try_wait(), Ok(None)) {
                tracing::info!(container = %self.container, "terminating main");
                if let Err(e) = child.kill().await {
                    tracing::warn!(container = %self.container, error = %e, "failed to kill main");
                }
            }
        }
        if !self.main_handle.state().is_terminal() && self.main_handle.state() != ProcessState::Created {
            let _ = self.main_handle.advance(ProcessState::Stopped);
        }
    }
}

async fn await_task(container: &str, child: &mut impl RunningProcess, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(exit)) if exit.is_success() => true,
        Ok(Ok(exit)) => {
            tracing::error!(container, %exit, "task failed");
            false
        }
        Ok(Err(e)) => {
            tracing::error!(container, error = %e, "lost track of task");
            false
        }
        Err(_) => {
            tracing::error!(container, ?timeout, "task did not finish in time");
            false
        }
    }
}
