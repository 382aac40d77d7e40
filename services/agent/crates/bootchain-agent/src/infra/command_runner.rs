//! Infrastructure implementation of the `CommandRunner` port.
//!
//! Commands inherit the agent's stdio, so their output lands in the
//! container log next to the agent's own. Timed-out commands are killed
//! explicitly with `tokio::select!` rather than by dropping the wait future.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, Exit, RunningProcess};
use crate::domain::EnvironmentMap;

/// Production `CommandRunner` backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

fn command(argv: &[String], env: &EnvironmentMap) -> Result<tokio::process::Command> {
    let (program, args) = argv.split_first().context("empty command line")?;
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args).envs(env.iter()).kill_on_drop(true);
    Ok(cmd)
}

impl CommandRunner for TokioCommandRunner {
    type Child = TokioChild;

    async fn run(
        &self,
        argv: &[String],
        env: &EnvironmentMap,
        timeout: Option<Duration>,
    ) -> Result<Exit> {
        let program = argv.first().map_or("", String::as_str);
        let mut child = command(argv, env)?
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let Some(limit) = timeout else {
            let status = child
                .wait()
                .await
                .with_context(|| format!("waiting for {program}"))?;
            return Ok(status.into());
        };

        tokio::select! {
            status = child.wait() => {
                Ok(status.with_context(|| format!("waiting for {program}"))?.into())
            }
            () = tokio::time::sleep(limit) => {
                let _ = child.kill().await;
                tracing::warn!(program, timeout_secs = limit.as_secs(), "command timed out, killed");
                Ok(Exit::TimedOut)
            }
        }
    }

    fn spawn(&self, argv: &[String], env: &EnvironmentMap) -> Result<TokioChild> {
        let program = argv.first().cloned().unwrap_or_default();
        let child = command(argv, env)?
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;
        tracing::debug!(%program, pid = ?child.id(), "spawned");
        Ok(TokioChild { child, program })
    }
}

/// A main process started by [`TokioCommandRunner`]. Killed when dropped.
#[derive(Debug)]
pub struct TokioChild {
    child: tokio::process::Child,
    program: String,
}

impl RunningProcess for TokioChild {
    fn try_wait(&mut self) -> Result<Option<Exit>> {
        let status = self
            .child
            .try_wait()
            .with_context(|| format!("polling {}", self.program))?;
        Ok(status.map(Exit::from))
    }

    async fn wait(&mut self) -> Result<Exit> {
        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("waiting for {}", self.program))?;
        Ok(status.into())
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .with_context(|| format!("killing {}", self.program))
    }
}
