//! Coordination-store connection for CLI commands.

use std::time::Duration;

use anyhow::{Context, Result};
use bootchain_common::{RetryPolicy, RetryingStore, ValkeyStore};

/// The CLI gives up after a few attempts; agents retry for as long as it takes.
#[must_use]
pub fn cli_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        max_attempts: Some(5),
    }
}

/// Connect to the store at `url`, retrying connection loss per [`cli_retry_policy`].
///
/// # Errors
///
/// Returns an error if the store cannot be reached.
pub async fn connect(url: &str) -> Result<RetryingStore<ValkeyStore>> {
    let valkey = ValkeyStore::connect(url)
        .await
        .with_context(|| format!("cannot connect to the coordination store at {url}"))?;
    Ok(RetryingStore::new(valkey, cli_retry_policy()))
}
