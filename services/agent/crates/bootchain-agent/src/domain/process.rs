//! Process lifecycle state machine and main-process handling by kind.

use std::fmt;
use std::time::Duration;

use bootchain_common::{CommandLine, CommandSpec, ContainerKind, ContainerSpec, ReadyProbe};

use crate::domain::error::ProcessError;

/// Where a command sits in the process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    PreMain,
    Main,
    PostMain,
    Stop,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreMain => "pre-main",
            Self::Main => "main",
            Self::PostMain => "post-main",
            Self::Stop => "stop",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Created,
    Initializing,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "CREATED",
            Self::Initializing => "INITIALIZING",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
        })
    }
}

impl ProcessState {
    fn can_move_to(self, next: Self) -> bool {
        use ProcessState::{Created, Failed, Initializing, Running, Stopped};
        matches!(
            (self, next),
            (Created, Initializing | Failed)
                | (Initializing, Running | Stopped | Failed)
                | (Running, Stopped | Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// One command of the group and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub role: ProcessRole,
    /// 1-based position within its phase; always 1 for main.
    pub index: usize,
    pub command: CommandLine,
    pub abort_on_failure: bool,
    state: ProcessState,
    initialized: bool,
}

impl ProcessHandle {
    #[must_use]
    pub fn side(role: ProcessRole, index: usize, spec: &CommandSpec) -> Self {
        Self {
            role,
            index,
            command: spec.command.clone(),
            abort_on_failure: spec.abort_on_failure,
            state: ProcessState::Created,
            initialized: false,
        }
    }

    #[must_use]
    pub fn main(command: &CommandLine) -> Self {
        Self {
            role: ProcessRole::Main,
            index: 1,
            command: command.clone(),
            abort_on_failure: true,
            state: ProcessState::Created,
            initialized: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether the main process has signalled readiness. Stays true after the
    /// process stops, so a completed task still counts as initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn advance(&mut self, next: ProcessState) -> Result<(), ProcessError> {
        if !self.state.can_move_to(next) {
            return Err(ProcessError {
                role: self.role,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }
}

/// How the main process proves it is initialized, chosen once from the
/// container's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainHandler {
    /// Long-running: initialized when the probe passes, or right after a
    /// successful spawn when there is no probe.
    Service {
        probe: Option<ReadyProbe>,
        timeout: Duration,
    },
    /// Run-to-completion: initialized when it exits with status 0.
    Task { timeout: Duration },
}

impl MainHandler {
    #[must_use]
    pub fn for_container(spec: &ContainerSpec) -> Self {
        let main = &spec.process.main;
        match spec.kind {
            ContainerKind::Service => Self::Service {
                probe: main.ready.clone(),
                timeout: main.ready_timeout(),
            },
            ContainerKind::Task => Self::Task {
                timeout: main.ready_timeout(),
            },
        }
    }
}
