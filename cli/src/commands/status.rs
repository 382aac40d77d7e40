//! `bootchain status`: run state of every container of an application.

use std::process::ExitCode;

use anyhow::Result;
use bootchain_common::CoordinationStore;
use clap::Args;
use owo_colors::OwoColorize as _;

use crate::application::services::app_status::{AppStatus, ContainerStatus, gather_status};
use crate::output::{OutputContext, json};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Application name
    pub app: String,
}

/// Run `bootchain status`.
///
/// # Errors
///
/// Returns an error if the application is not deployed or the store cannot
/// be read.
pub async fn run(
    ctx: &OutputContext,
    store: &impl CoordinationStore,
    args: &StatusArgs,
    json: bool,
) -> Result<ExitCode> {
    let status = gather_status(store, &args.app).await?;

    if json {
        println!("{}", json::format_value(&status)?);
        return Ok(ExitCode::SUCCESS);
    }

    print_status(ctx, &status);
    Ok(ExitCode::SUCCESS)
}

fn print_status(ctx: &OutputContext, status: &AppStatus) {
    if ctx.quiet {
        return;
    }
    ctx.header(&status.app);
    let width = status
        .containers
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);
    for container in &status.containers {
        println!("  {}", format_row(ctx, container, width));
    }
    println!();

    if status.shutdown_requested {
        ctx.info("Shutdown requested.");
    }
    let failed: Vec<&str> = status.failed().map(|c| c.name.as_str()).collect();
    if !failed.is_empty() {
        ctx.warn(&format!("Failed: {}", failed.join(", ")));
    } else if status.all_initialized() {
        ctx.success("All containers initialized.");
    }
}

/// One table row: name, run state, host and dependencies.
#[must_use]
pub fn format_row(ctx: &OutputContext, container: &ContainerStatus, width: usize) -> String {
    let state = format!("{:<12}", container.status.as_str());
    let mut row = format!(
        "{:<width$}  {}",
        container.name,
        state.style(ctx.styles.run_status(container.status)),
    );
    if let Some(host) = &container.host {
        row.push_str(&format!("  {}", host.style(ctx.styles.dim)));
    }
    if !container.requires.is_empty() {
        let requires = format!("requires {}", container.requires.join(", "));
        row.push_str(&format!("  {}", requires.style(ctx.styles.dim)));
    }
    row.trim_end().to_string()
}
