//! In-process [`CoordinationStore`] with fault injection.
//!
//! Clones share one tree, so several in-process agents can coordinate through
//! it exactly as separate processes do through Valkey. Faults queued with
//! [`MemoryStore::inject`] are consumed one per operation, in order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use crate::store::{CoordinationStore, StoreError, StoreResult, Watch, WatchEvent, checked_path};
use crate::store_keys;

/// A failure to apply to the next store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with `ConnectionLoss` without applying the operation.
    ConnectionLoss,
    /// Apply the operation, then report `ConnectionLoss` (acknowledgment lost).
    LostAck,
    /// Fail with `AccessDenied`.
    AccessDenied,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, Vec<u8>>,
    watchers: HashMap<String, Vec<UnboundedSender<WatchEvent>>>,
    faults: VecDeque<Fault>,
    operations: usize,
}

impl Inner {
    fn notify(&mut self, path: &str, event: &WatchEvent) {
        if let Some(senders) = self.watchers.get_mut(path) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a fault for an upcoming operation.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Number of operations attempted so far, faulted ones included.
    #[must_use]
    pub fn operations(&self) -> usize {
        self.lock().operations
    }

    /// Current data of `path` as UTF-8, for assertions.
    #[must_use]
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.lock()
            .nodes
            .get(path)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    /// All node paths currently present.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Run `op` against the tree, honouring the next queued fault.
    fn apply<T>(
        &self,
        path: &str,
        op: impl FnOnce(&mut Inner) -> StoreResult<T>,
    ) -> StoreResult<T> {
        checked_path(path)?;
        let mut inner = self.lock();
        inner.operations += 1;
        match inner.faults.pop_front() {
            None => op(&mut inner),
            Some(Fault::ConnectionLoss) => Err(StoreError::ConnectionLoss),
            Some(Fault::AccessDenied) => Err(StoreError::AccessDenied(path.to_string())),
            Some(Fault::LostAck) => {
                let _ = op(&mut inner);
                Err(StoreError::ConnectionLoss)
            }
        }
    }
}

impl CoordinationStore for MemoryStore {
    async fn create(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        self.apply(path, |inner| {
            if inner.nodes.contains_key(path) {
                return Err(StoreError::NodeExists(path.to_string()));
            }
            inner.nodes.insert(path.to_string(), data.to_vec());
            inner.notify(path, &WatchEvent::Created(data.to_vec()));
            Ok(())
        })
    }

    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.apply(path, |inner| {
            inner
                .nodes
                .get(path)
                .cloned()
                .ok_or_else(|| StoreError::NoNode(path.to_string()))
        })
    }

    async fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        self.apply(path, |inner| {
            let Some(slot) = inner.nodes.get_mut(path) else {
                return Err(StoreError::NoNode(path.to_string()));
            };
            *slot = data.to_vec();
            inner.notify(path, &WatchEvent::Changed(data.to_vec()));
            Ok(())
        })
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.apply(path, |inner| {
            if inner.nodes.remove(path).is_none() {
                return Err(StoreError::NoNode(path.to_string()));
            }
            inner.notify(path, &WatchEvent::Deleted);
            Ok(())
        })
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        self.apply(path, |inner| {
            let names = inner
                .nodes
                .keys()
                .filter(|node| store_keys::parent(node) == Some(path))
                .map(|node| store_keys::leaf(node).to_string())
                .collect();
            Ok(names)
        })
    }

    async fn watch(&self, path: &str) -> StoreResult<Watch> {
        self.apply(path, |inner| {
            let (tx, watch) = Watch::channel(path);
            inner.watchers.entry(path.to_string()).or_default().push(tx);
            Ok(watch)
        })
    }
}
