//! `bootchain stop`: request shutdown of every agent of an application.

use std::process::ExitCode;

use anyhow::Result;
use bootchain_common::CoordinationStore;
use clap::Args;

use crate::application::services::app_stop::{StopOutcome, stop_app};
use crate::output::{OutputContext, json};

/// Arguments for the stop command.
#[derive(Args)]
pub struct StopArgs {
    /// Application name
    pub app: String,
}

/// Run `bootchain stop`.
///
/// # Errors
///
/// Returns an error if the application is not deployed or the store cannot
/// be written.
pub async fn run(
    ctx: &OutputContext,
    store: &impl CoordinationStore,
    args: &StopArgs,
    json: bool,
) -> Result<ExitCode> {
    let outcome = stop_app(store, &args.app).await?;

    if json {
        let doc = serde_json::json!({
            "app": args.app,
            "shutdown_requested": true,
            "already_requested": outcome == StopOutcome::AlreadyRequested,
        });
        println!("{}", json::format_value(&doc)?);
        return Ok(ExitCode::SUCCESS);
    }

    match outcome {
        StopOutcome::Requested => {
            ctx.success(&format!("Shutdown of {} requested.", args.app));
        }
        StopOutcome::AlreadyRequested => {
            ctx.info(&format!("Shutdown of {} was already requested.", args.app));
        }
    }
    ctx.info(&format!("Follow progress: bootchain status {}", args.app));
    Ok(ExitCode::SUCCESS)
}
