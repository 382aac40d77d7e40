//! `bootchain validate`: check a description without touching the store.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bootchain_common::AppDescription;
use clap::Args;
use serde::Serialize;

use crate::domain::graph;
use crate::output::{OutputContext, json};

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Application description (YAML)
    pub file: PathBuf,
}

#[derive(Serialize)]
struct ValidateReport<'a> {
    app: &'a str,
    valid: bool,
    launch_order: Vec<&'a str>,
}

/// Run `bootchain validate`.
///
/// # Errors
///
/// Returns an error naming the offending container(s) if the description
/// cannot be loaded or its dependency graph is invalid.
pub fn run(ctx: &OutputContext, args: &ValidateArgs, json: bool) -> Result<ExitCode> {
    let app = AppDescription::load(&args.file)?;
    graph::validate(&app.containers)
        .with_context(|| format!("{} is not deployable", args.file.display()))?;

    let order: Vec<&str> = graph::launch_order(&app.containers)
        .into_iter()
        .map(|c| c.name.as_str())
        .collect();

    if json {
        let report = ValidateReport {
            app: &app.name,
            valid: true,
            launch_order: order,
        };
        println!("{}", json::format_value(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    ctx.success(&format!(
        "{} is valid ({} containers)",
        app.name,
        app.containers.len()
    ));
    ctx.kv("launch order", &order.join(" → "));
    Ok(ExitCode::SUCCESS)
}
