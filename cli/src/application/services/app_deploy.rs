//! Application service: deploy use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use bootchain_common::{AppDescription, CoordinationStore, RunStatus, StoreError, store_keys};

use crate::application::ports::{
    ContainerLauncher, LaunchRequest, LaunchedAgent, ProgressReporter,
};
use crate::application::services::app_stop::request_shutdown;
use crate::domain::{AppError, graph};

pub struct DeployOptions<'a, R: ProgressReporter> {
    pub reporter: &'a R,
    /// Store URL handed to every launched agent.
    pub store_url: &'a str,
    /// Remove the nodes of a previous deployment even while its agents
    /// still report themselves alive.
    pub force: bool,
}

/// Outcome of the `deploy_app` use-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub app: String,
    /// Agents in launch order: dependencies before dependents.
    pub agents: Vec<LaunchedAgent>,
    /// Nodes of an earlier deployment were found and removed.
    pub replaced_previous: bool,
}

/// Validate `app`, publish it and launch one agent per container.
///
/// Nothing is written and nothing is launched when the dependency graph is
/// invalid, or when a previous deployment of the same application still has
/// live agents and `force` is unset. If a launch fails, the agents already started are asked to shut
/// down before the error is returned.
///
/// # Errors
///
/// Returns an error if the graph is invalid, a previous deployment is still
/// running, the store cannot be written, or an agent cannot be launched.
pub async fn deploy_app<R: ProgressReporter>(
    store: &impl CoordinationStore,
    launcher: &impl ContainerLauncher,
    app: &AppDescription,
    opts: DeployOptions<'_, R>,
) -> Result<DeployOutcome> {
    let reporter = opts.reporter;
    let name = app.name.as_str();

    reporter.step("validating dependency graph...");
    graph::validate(&app.containers)?;
    launcher.preflight(&app.containers)?;

    let replaced_previous = clear_previous_run(store, app, opts.force).await?;
    if replaced_previous {
        reporter.warn(&format!("removed the nodes of a previous '{name}' deployment"));
    }

    let description_path = store_keys::description_path(name);
    store
        .create(&description_path, &app.to_json()?)
        .await
        .with_context(|| format!("publishing {description_path}"))?;
    tracing::info!(app = name, containers = app.containers.len(), "description published");

    let mut agents = Vec::with_capacity(app.containers.len());
    for spec in graph::launch_order(&app.containers) {
        reporter.step(&format!("launching {}...", spec.name));
        let request = LaunchRequest {
            app: name,
            container: spec,
            store_url: opts.store_url,
        };
        match launcher.launch(&request).await {
            Ok(agent) => {
                tracing::info!(container = %agent.container, handle = %agent.handle, "agent launched");
                reporter.success(&format!("{} launched ({})", agent.container, agent.handle));
                agents.push(agent);
            }
            Err(e) => {
                if !agents.is_empty() {
                    reporter.warn("stopping the agents already launched");
                    if let Err(stop) = request_shutdown(store, name).await {
                        tracing::warn!(error = %format!("{stop:#}"), "cannot request shutdown");
                    }
                }
                return Err(e.context(format!("launching agent for container '{}'", spec.name)));
            }
        }
    }

    Ok(DeployOutcome {
        app: app.name.clone(),
        agents,
        replaced_previous,
    })
}

/// Remove every node a previous deployment of `app` may have left: the
/// description, the shutdown request, and the descriptor and run-state nodes
/// of every container named by the old description, the new one, or the
/// store itself. Returns whether anything was removed.
///
/// Agents own their nodes until they exit: a container whose run state is
/// anything but `failed` still has a live agent, and unless `force` is set
/// its deployment is left alone.
async fn clear_previous_run(
    store: &impl CoordinationStore,
    app: &AppDescription,
    force: bool,
) -> Result<bool> {
    let name = app.name.as_str();
    let previous = store
        .read_optional(&store_keys::description_path(name))
        .await?;

    let mut containers: BTreeSet<String> = app.containers.iter().map(|c| c.name.clone()).collect();
    if let Some(old) = previous
        .as_deref()
        .and_then(|raw| AppDescription::from_json_slice(raw).ok())
    {
        containers.extend(old.containers.into_iter().map(|c| c.name));
    }
    containers.extend(store.children(&store_keys::containers_path(name)).await?);

    if !force {
        let mut live = Vec::new();
        for container in &containers {
            let status = store
                .read_optional(&store_keys::status_path(name, container))
                .await?;
            if status.is_some_and(|data| RunStatus::from_signal(&data) != RunStatus::Failed) {
                live.push(container.clone());
            }
        }
        if !live.is_empty() {
            return Err(AppError::StillRunning {
                app: name.to_string(),
                containers: live,
            }
            .into());
        }
    }

    // Children before parents.
    let mut candidates = Vec::with_capacity(containers.len() * 2 + 2);
    for container in &containers {
        candidates.push(store_keys::status_path(name, container));
        candidates.push(store_keys::descriptor_path(name, container));
    }
    candidates.push(store_keys::shutdown_path(name));
    candidates.push(store_keys::description_path(name));

    let mut removed = false;
    for path in candidates {
        match store.delete(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path, "removed stale node");
                removed = true;
            }
            Err(StoreError::NoNode(_)) => {}
            Err(e) => return Err(e).with_context(|| format!("removing stale node {path}")),
        }
    }
    Ok(removed)
}
