use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Per-container agent configuration, read from `BOOTCHAIN_AGENT_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Application the container belongs to.
    pub app: String,

    /// Container this agent runs.
    pub container: String,

    /// Coordination store URL
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// First retry delay after a connection loss, in milliseconds
    #[serde(default = "default_retry_initial_ms")]
    pub store_retry_initial_ms: u64,

    /// Upper bound of the retry delay, in milliseconds
    #[serde(default = "default_retry_max_ms")]
    pub store_retry_max_ms: u64,

    /// Attempts before a store operation gives up; unset retries forever.
    #[serde(default)]
    pub store_retry_attempts: Option<u32>,

    /// Host name published in the descriptor (default: `HOSTNAME` or `localhost`)
    #[serde(default = "default_host")]
    pub host: String,
}

impl AgentConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(self.store_retry_initial_ms),
            max_backoff: Duration::from_millis(self.store_retry_max_ms),
            max_attempts: self.store_retry_attempts,
        }
    }
}

pub fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_retry_initial_ms() -> u64 {
    100
}

fn default_retry_max_ms() -> u64 {
    5000
}

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
