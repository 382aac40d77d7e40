//! `ContainerLauncher` implementations.
//!
//! Both launchers hand the agent its identity through the `BOOTCHAIN_AGENT_*`
//! variables it reads at startup. `LocalLauncher` spawns agent processes on
//! this host; `DockerLauncher` starts one detached container per agent from
//! the container's image, whose entrypoint must be `bootchain-agent`.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use bootchain_common::ContainerSpec;

use crate::application::ports::{CommandRunner, ContainerLauncher, LaunchRequest, LaunchedAgent};
use crate::domain::AppError;

/// Agent configuration variables for `request`, in a stable order.
#[must_use]
pub fn agent_env(request: &LaunchRequest<'_>) -> Vec<(&'static str, String)> {
    vec![
        ("BOOTCHAIN_AGENT_APP", request.app.to_string()),
        ("BOOTCHAIN_AGENT_CONTAINER", request.container.name.clone()),
        ("BOOTCHAIN_AGENT_STORE_URL", request.store_url.to_string()),
    ]
}

// ── Local processes ───────────────────────────────────────────────────────────

/// Spawns `bootchain-agent` processes on this host. Each agent's output goes
/// to `<log_dir>/<app>-<container>.log`; agents outlive the CLI.
pub struct LocalLauncher {
    agent_bin: PathBuf,
    log_dir: PathBuf,
}

impl LocalLauncher {
    #[must_use]
    pub fn new(agent_bin: PathBuf, log_dir: PathBuf) -> Self {
        Self { agent_bin, log_dir }
    }

    #[must_use]
    pub fn log_path(&self, app: &str, container: &str) -> PathBuf {
        self.log_dir.join(format!("{app}-{container}.log"))
    }
}

impl ContainerLauncher for LocalLauncher {
    async fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchedAgent> {
        let name = &request.container.name;
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("creating log directory {}", self.log_dir.display()))?;
        let log_path = self.log_path(request.app, name);
        let stdout = std::fs::File::create(&log_path)
            .with_context(|| format!("creating {}", log_path.display()))?;
        let stderr = stdout.try_clone().context("duplicating log file handle")?;

        let child = tokio::process::Command::new(&self.agent_bin)
            .envs(agent_env(request))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.agent_bin.display()))?;

        let handle = child
            .id()
            .map_or_else(|| "exited".to_string(), |pid| format!("pid {pid}"));
        tracing::debug!(container = %name, %handle, log = %log_path.display(), "local agent spawned");
        Ok(LaunchedAgent {
            container: name.clone(),
            handle,
        })
    }
}

// ── Docker ────────────────────────────────────────────────────────────────────

/// Starts each agent as a detached docker container named `<app>-<container>`.
pub struct DockerLauncher<R: CommandRunner> {
    runner: R,
    network: Option<String>,
}

impl<R: CommandRunner> DockerLauncher<R> {
    #[must_use]
    pub fn new(runner: R, network: Option<String>) -> Self {
        Self { runner, network }
    }

    /// `docker` arguments that start the agent of `request` from `image`.
    #[must_use]
    pub fn run_args(&self, request: &LaunchRequest<'_>, image: &str) -> Vec<String> {
        let name = &request.container.name;
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            format!("{}-{name}", request.app),
            "--hostname".to_string(),
            name.clone(),
            "--label".to_string(),
            format!("bootchain.app={}", request.app),
        ];
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        for (key, value) in agent_env(request) {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push("-e".to_string());
        args.push(format!("BOOTCHAIN_AGENT_HOST={name}"));
        args.push(image.to_string());
        args
    }
}

fn image_of(container: &ContainerSpec) -> Result<&str, AppError> {
    container
        .image
        .as_deref()
        .ok_or_else(|| AppError::MissingImage(container.name.clone()))
}

impl<R: CommandRunner> ContainerLauncher for DockerLauncher<R> {
    fn preflight(&self, containers: &[ContainerSpec]) -> Result<()> {
        for container in containers {
            image_of(container)?;
        }
        Ok(())
    }

    async fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchedAgent> {
        let image = image_of(request.container)?;
        let args = self.run_args(request, image);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run("docker", &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("docker run failed: {}", stderr.trim());
        }
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(LaunchedAgent {
            container: request.container.name.clone(),
            handle: id.chars().take(12).collect(),
        })
    }
}
