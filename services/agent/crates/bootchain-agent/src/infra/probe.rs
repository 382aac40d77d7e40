//! Readiness probes: a command that must succeed, or a TCP port that must
//! accept connections.

use std::time::Duration;

use bootchain_common::ReadyProbe;
use tokio::net::TcpStream;

use crate::application::ports::{CommandRunner, ReadinessProbe};
use crate::domain::EnvironmentMap;

/// Upper bound for a single probe attempt.
pub const PROBE_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Production `ReadinessProbe`; command probes go through `runner`.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe<R> {
    runner: R,
}

impl<R: CommandRunner> SystemProbe<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> ReadinessProbe for SystemProbe<R> {
    async fn check(&self, probe: &ReadyProbe, env: &EnvironmentMap) -> bool {
        match probe {
            ReadyProbe::Command { command, .. } => {
                match self
                    .runner
                    .run(&command.argv(), env, Some(PROBE_ATTEMPT_TIMEOUT))
                    .await
                {
                    Ok(exit) => exit.is_success(),
                    Err(e) => {
                        tracing::debug!(error = %e, "probe command could not run");
                        false
                    }
                }
            }
            ReadyProbe::Tcp { host, port, .. } => matches!(
                tokio::time::timeout(
                    PROBE_ATTEMPT_TIMEOUT,
                    TcpStream::connect((host.as_str(), *port))
                )
                .await,
                Ok(Ok(_))
            ),
        }
    }
}
