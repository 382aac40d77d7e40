//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::infra;
use crate::output::OutputContext;

/// Dependency-ordered bootstrap of multi-container applications
#[derive(Parser)]
#[command(
    name = "bootchain",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Coordination store URL
    #[arg(
        long,
        global = true,
        env = "BOOTCHAIN_STORE_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    pub store_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check an application description without deploying it
    Validate(commands::validate::ValidateArgs),

    /// Publish an application and launch one agent per container
    Deploy(commands::deploy::DeployArgs),

    /// Show the run state of every container of an application
    Status(commands::status::StatusArgs),

    /// Ask every agent of an application to run its stop sequence
    Stop(commands::stop::StopArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            store_url,
            command,
            ..
        } = self;
        // JSON mode keeps stdout for the document alone.
        let ctx = OutputContext::new(no_color, quiet || json);
        match command {
            Command::Validate(args) => commands::validate::run(&ctx, &args, json),
            Command::Deploy(args) => {
                let store = infra::connect(&store_url).await?;
                commands::deploy::run(&ctx, &store, &args, &store_url, json).await
            }
            Command::Status(args) => {
                let store = infra::connect(&store_url).await?;
                commands::status::run(&ctx, &store, &args, json).await
            }
            Command::Stop(args) => {
                let store = infra::connect(&store_url).await?;
                commands::stop::run(&ctx, &store, &args, json).await
            }
        }
    }
}
