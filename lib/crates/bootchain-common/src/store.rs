//! Coordination-store port.
//!
//! The store is a hierarchical key-value service with watch notifications.
//! Agents only ever talk to it through [`CoordinationStore`]; the Valkey
//! adapter, the in-memory adapter and the retrying wrapper all implement it.

use thiserror::Error;
use tokio::sync::mpsc;

/// Failures a store operation can report.
///
/// `ConnectionLoss` is the only retryable condition; the others are final for
/// the operation that produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection to the coordination store was lost")]
    ConnectionLoss,

    #[error("node {0} does not exist")]
    NoNode(String),

    #[error("node {0} already exists")]
    NodeExists(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("coordination store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn checked_path(path: &str) -> StoreResult<()> {
    crate::store_keys::validate_path(path).map_err(|reason| StoreError::InvalidPath {
        path: path.to_string(),
        reason,
    })
}

/// A change to a watched node. Events carry the node data as read when the
/// notification was delivered, so consumers never need a follow-up read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(Vec<u8>),
    Changed(Vec<u8>),
    Deleted,
}

impl WatchEvent {
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Created(data) | Self::Changed(data) => Some(data),
            Self::Deleted => None,
        }
    }
}

/// Subscription to one node. Delivery is at-least-once and consecutive
/// changes may be coalesced into one event. Dropping the `Watch` ends the
/// subscription.
#[derive(Debug)]
pub struct Watch {
    path: String,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Watch {
    /// Create a subscription and the sender an adapter feeds it through.
    #[must_use]
    pub fn channel(path: &str) -> (mpsc::UnboundedSender<WatchEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                path: path.to_string(),
                rx,
            },
        )
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event, or `None` once the adapter has dropped the subscription.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Drop the events delivered so far without consuming them. Returns how
    /// many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}

/// Hierarchical key-value store with watches.
#[allow(async_fn_in_trait)]
pub trait CoordinationStore {
    /// Create `path` holding `data`. Fails with `NodeExists` if it is present.
    async fn create(&self, path: &str, data: &[u8]) -> StoreResult<()>;

    /// Read the data of `path`.
    async fn read(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Replace the data of an existing node.
    async fn set(&self, path: &str, data: &[u8]) -> StoreResult<()>;

    /// Delete `path`. Children are not removed.
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Names of the direct children of `path`, sorted.
    async fn children(&self, path: &str) -> StoreResult<Vec<String>>;

    /// Subscribe to creation, change and deletion of `path`.
    async fn watch(&self, path: &str) -> StoreResult<Watch>;

    /// `read` that maps `NoNode` to `None`.
    async fn read_optional(&self, path: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NoNode(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create `path`, or overwrite it when it already exists.
    async fn upsert(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        match self.create(path, data).await {
            Err(StoreError::NodeExists(_)) => self.set(path, data).await,
            other => other,
        }
    }
}

impl<T: CoordinationStore> CoordinationStore for &T {
    async fn create(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        (**self).create(path, data).await
    }

    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        (**self).read(path).await
    }

    async fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        (**self).set(path, data).await
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        (**self).delete(path).await
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        (**self).children(path).await
    }

    async fn watch(&self, path: &str) -> StoreResult<Watch> {
        (**self).watch(path).await
    }
}
