//! Application service: stop use-case.
//!
//! Stopping is a single store write: the shutdown node. Every agent of the
//! application watches it and runs its stop sequence when it appears.

use anyhow::{Context, Result};
use bootchain_common::{CoordinationStore, StoreError, store_keys};
use chrono::Utc;

use crate::domain::AppError;

/// Outcome of the `stop_app` use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The shutdown node was created by this call.
    Requested,
    /// A shutdown had already been requested.
    AlreadyRequested,
}

/// Ask every agent of `app` to stop.
///
/// # Errors
///
/// Returns [`AppError::NotDeployed`] if `app` has no published description,
/// or an error if the store cannot be reached.
pub async fn stop_app(store: &impl CoordinationStore, app: &str) -> Result<StopOutcome> {
    let description = store
        .read_optional(&store_keys::description_path(app))
        .await
        .with_context(|| format!("reading description of '{app}'"))?;
    if description.is_none() {
        return Err(AppError::NotDeployed(app.to_string()).into());
    }
    request_shutdown(store, app).await
}

/// Create the shutdown node of `app`, stamped with the current time.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub async fn request_shutdown(store: &impl CoordinationStore, app: &str) -> Result<StopOutcome> {
    let path = store_keys::shutdown_path(app);
    let stamp = Utc::now().to_rfc3339();
    match store.create(&path, stamp.as_bytes()).await {
        Ok(()) => {
            tracing::info!(app, "shutdown requested");
            Ok(StopOutcome::Requested)
        }
        Err(StoreError::NodeExists(_)) => Ok(StopOutcome::AlreadyRequested),
        Err(e) => Err(e).with_context(|| format!("creating {path}")),
    }
}
