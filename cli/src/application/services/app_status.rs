//! Application service: status gathering use-case.
//!
//! Reads the published description of an application and, for each of its
//! containers, the run state and descriptor its agent published.

use anyhow::{Context, Result};
use bootchain_common::{AppDescription, CoordinationStore, Descriptor, RunStatus, store_keys};
use serde::Serialize;

use crate::domain::AppError;

/// Status of one container as seen in the store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    /// `not_running` until the agent publishes anything.
    pub status: RunStatus,
    /// Host from the agent's descriptor; absent until it is published.
    pub host: Option<String>,
    pub requires: Vec<String>,
}

/// Status of a deployed application.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppStatus {
    pub app: String,
    pub shutdown_requested: bool,
    /// In declaration order.
    pub containers: Vec<ContainerStatus>,
}

impl AppStatus {
    #[must_use]
    pub fn all_initialized(&self) -> bool {
        self.containers
            .iter()
            .all(|c| c.status == RunStatus::Initialized)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ContainerStatus> {
        self.containers
            .iter()
            .filter(|c| c.status == RunStatus::Failed)
    }
}

/// Gather the status of `app`.
///
/// # Errors
///
/// Returns [`AppError::NotDeployed`] if `app` has no published description,
/// or an error if the store cannot be reached or the description is corrupt.
pub async fn gather_status(store: &impl CoordinationStore, app: &str) -> Result<AppStatus> {
    let raw = store
        .read_optional(&store_keys::description_path(app))
        .await
        .with_context(|| format!("reading description of '{app}'"))?
        .ok_or_else(|| AppError::NotDeployed(app.to_string()))?;
    let description = AppDescription::from_json_slice(&raw)
        .with_context(|| format!("published description of '{app}' is unreadable"))?;

    let mut containers = Vec::with_capacity(description.containers.len());
    for spec in &description.containers {
        let status = store
            .read_optional(&store_keys::status_path(app, &spec.name))
            .await?
            .map_or(RunStatus::NotRunning, |data| RunStatus::from_signal(&data));
        let host = store
            .read_optional(&store_keys::descriptor_path(app, &spec.name))
            .await?
            .and_then(|data| Descriptor::from_json(&data).ok())
            .map(|descriptor| descriptor.host);
        containers.push(ContainerStatus {
            name: spec.name.clone(),
            status,
            host,
            requires: spec.requires.clone(),
        });
    }

    let shutdown_requested = store
        .read_optional(&store_keys::shutdown_path(app))
        .await?
        .is_some();

    Ok(AppStatus {
        app: description.name,
        shutdown_requested,
        containers,
    })
}
