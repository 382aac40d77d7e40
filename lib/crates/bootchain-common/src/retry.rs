//! Connection-loss handling for any [`CoordinationStore`].
//!
//! Every operation is retried while the backend reports `ConnectionLoss`.
//! After such a retry a mutation may already have been applied with its
//! acknowledgment lost, so `create` and `delete` verify the outcome instead of
//! trusting the error of the repeated call.

use std::time::Duration;

use crate::store::{CoordinationStore, StoreError, StoreResult, Watch};

/// Backoff between retries. `max_attempts: None` retries forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles from
    /// `initial_backoff`, capped at `max_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: CoordinationStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Sleep before the next attempt, or give up with `ConnectionLoss` once the
    /// attempt budget is spent.
    async fn pause(&self, op: &str, path: &str, attempt: &mut u32) -> StoreResult<()> {
        *attempt += 1;
        if self.policy.max_attempts.is_some_and(|max| *attempt >= max) {
            tracing::error!(op, path, attempts = *attempt, "giving up after connection loss");
            return Err(StoreError::ConnectionLoss);
        }
        let delay = self.policy.backoff(*attempt);
        tracing::warn!(op, path, attempt = *attempt, ?delay, "connection lost, retrying");
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

impl<S: CoordinationStore> CoordinationStore for RetryingStore<S> {
    async fn create(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.create(path, data).await {
                Err(StoreError::ConnectionLoss) => self.pause("create", path, &mut attempt).await?,
                Err(StoreError::NodeExists(existing)) if attempt > 0 => {
                    // The node may be ours from an attempt whose reply was lost.
                    return match self.read(path).await? {
                        current if current == data => {
                            tracing::debug!(path, "create already applied before connection loss");
                            Ok(())
                        }
                        _ => Err(StoreError::NodeExists(existing)),
                    };
                }
                other => return other,
            }
        }
    }

    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.inner.read(path).await {
                Err(StoreError::ConnectionLoss) => self.pause("read", path, &mut attempt).await?,
                other => return other,
            }
        }
    }

    async fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.set(path, data).await {
                Err(StoreError::ConnectionLoss) => self.pause("set", path, &mut attempt).await?,
                other => return other,
            }
        }
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.delete(path).await {
                Err(StoreError::ConnectionLoss) => self.pause("delete", path, &mut attempt).await?,
                Err(StoreError::NoNode(_)) if attempt > 0 => {
                    tracing::debug!(path, "delete already applied before connection loss");
                    return Ok(());
                }
                other => return other,
            }
        }
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        let mut attempt = 0;
        loop {
            match self.inner.children(path).await {
                Err(StoreError::ConnectionLoss) => {
                    self.pause("children", path, &mut attempt).await?;
                }
                other => return other,
            }
        }
    }

    async fn watch(&self, path: &str) -> StoreResult<Watch> {
        let mut attempt = 0;
        loop {
            match self.inner.watch(path).await {
                Err(StoreError::ConnectionLoss) => self.pause("watch", path, &mut attempt).await?,
                other => return other,
            }
        }
    }
}
