//! `bootchain deploy`: publish an application and launch its agents.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use bootchain_common::{AppDescription, CoordinationStore};
use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::application::ports::ContainerLauncher;
use crate::application::services::app_deploy::{DeployOptions, DeployOutcome, deploy_app};
use crate::infra::{DockerLauncher, LocalLauncher, TokioCommandRunner};
use crate::output::{OutputContext, TerminalReporter, json};

/// Where agents run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LauncherKind {
    /// `bootchain-agent` processes on this host
    Local,
    /// One detached docker container per agent, from each container's image
    Docker,
}

/// Arguments for the deploy command.
#[derive(Args)]
pub struct DeployArgs {
    /// Application description (YAML)
    pub file: PathBuf,

    /// How agents are started
    #[arg(long, value_enum, default_value_t = LauncherKind::Local)]
    pub launcher: LauncherKind,

    /// Agent binary for the local launcher
    #[arg(long, env = "BOOTCHAIN_AGENT_BIN", default_value = "bootchain-agent")]
    pub agent_bin: PathBuf,

    /// Directory for local agent logs (default: <tmp>/bootchain)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Docker network to attach agent containers to
    #[arg(long)]
    pub network: Option<String>,

    /// Replace a previous deployment even if its agents still look alive
    #[arg(long)]
    pub force: bool,
}

impl DeployArgs {
    fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("bootchain"))
    }
}

#[derive(Serialize)]
struct DeployReport<'a> {
    app: &'a str,
    replaced_previous: bool,
    agents: Vec<AgentReport<'a>>,
}

#[derive(Serialize)]
struct AgentReport<'a> {
    container: &'a str,
    handle: &'a str,
}

/// Run `bootchain deploy`.
///
/// # Errors
///
/// Returns an error if the description is invalid, the store cannot be
/// written, or an agent cannot be launched.
pub async fn run(
    ctx: &OutputContext,
    store: &impl CoordinationStore,
    args: &DeployArgs,
    store_url: &str,
    json: bool,
) -> Result<ExitCode> {
    let app = AppDescription::load(&args.file)?;
    ctx.info(&format!("Deploying {}...", app.name));

    let outcome = match args.launcher {
        LauncherKind::Local => {
            let launcher = LocalLauncher::new(args.agent_bin.clone(), args.log_dir());
            deploy_with(ctx, store, &launcher, &app, store_url, args.force).await?
        }
        LauncherKind::Docker => {
            let launcher = DockerLauncher::new(TokioCommandRunner::default(), args.network.clone());
            deploy_with(ctx, store, &launcher, &app, store_url, args.force).await?
        }
    };

    if json {
        let report = DeployReport {
            app: &outcome.app,
            replaced_previous: outcome.replaced_previous,
            agents: outcome
                .agents
                .iter()
                .map(|a| AgentReport {
                    container: &a.container,
                    handle: &a.handle,
                })
                .collect(),
        };
        println!("{}", json::format_value(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    ctx.success(&format!(
        "{} deployed: {} agents launched.",
        outcome.app,
        outcome.agents.len()
    ));
    if args.launcher == LauncherKind::Local {
        ctx.kv("logs", &args.log_dir().display().to_string());
    }
    ctx.info(&format!("Follow progress: bootchain status {}", outcome.app));
    Ok(ExitCode::SUCCESS)
}

async fn deploy_with(
    ctx: &OutputContext,
    store: &impl CoordinationStore,
    launcher: &impl ContainerLauncher,
    app: &AppDescription,
    store_url: &str,
    force: bool,
) -> Result<DeployOutcome> {
    let reporter = TerminalReporter::new(ctx);
    let opts = DeployOptions {
        reporter: &reporter,
        store_url,
        force,
    };
    deploy_app(store, launcher, app, opts).await
}
