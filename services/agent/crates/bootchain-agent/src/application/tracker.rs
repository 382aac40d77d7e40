//! Tracks the readiness of a container's direct dependencies.
//!
//! Each dependency gets a follower task that folds its descriptor and status
//! watch events into a shared [`ReadinessSnapshot`], published through a
//! `tokio::sync::watch` channel. Waiters re-evaluate on every publication, so
//! no wake-up is missed between checking a predicate and starting to wait.

use std::sync::Arc;

use anyhow::{Context, Result};
use bootchain_common::{CoordinationStore, Watch, WatchEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::shutdown::ShutdownSignal;
use crate::domain::{NodeChange, ReadinessSnapshot};

/// Why a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    DependencyFailed(String),
    ShutdownRequested,
}

pub struct ReadinessTracker {
    snapshot: watch::Receiver<ReadinessSnapshot>,
    // Held so the channel stays open even when there are no followers.
    _publisher: Arc<watch::Sender<ReadinessSnapshot>>,
    followers: Vec<JoinHandle<()>>,
}

impl ReadinessTracker {
    /// Subscribe to every dependency in `requires`, then fold in the current
    /// state of each node. Subscribing first means a change racing the
    /// initial read is still delivered. Events buffered before the read are
    /// superseded by it and dropped, so a stale deletion cannot fail a node
    /// that was recreated in the meantime.
    pub async fn start(
        store: &impl CoordinationStore,
        app: &str,
        requires: &[String],
    ) -> Result<Self> {
        let initial = ReadinessSnapshot::new(app, requires);
        let nodes = initial.nodes.clone();
        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);
        let mut followers = Vec::with_capacity(nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            let mut descriptor_watch = store
                .watch(&node.descriptor_path)
                .await
                .with_context(|| format!("watching descriptor of '{}'", node.name))?;
            let mut status_watch = store
                .watch(&node.status_path)
                .await
                .with_context(|| format!("watching status of '{}'", node.name))?;
            descriptor_watch.discard_pending();
            status_watch.discard_pending();

            if let Some(data) = store.read_optional(&node.descriptor_path).await? {
                apply(&tx, index, &node.name, Source::Descriptor, &WatchEvent::Created(data));
            }
            if let Some(data) = store.read_optional(&node.status_path).await? {
                apply(&tx, index, &node.name, Source::Status, &WatchEvent::Created(data));
            }

            followers.push(tokio::spawn(follow(
                index,
                node.name.clone(),
                descriptor_watch,
                status_watch,
                Arc::clone(&tx),
            )));
        }

        Ok(Self {
            snapshot: rx,
            _publisher: tx,
            followers,
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> ReadinessSnapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn are_srv_initialized(&self) -> bool {
        self.snapshot.borrow().are_srv_initialized()
    }

    #[must_use]
    pub fn are_srv_processed(&self) -> bool {
        self.snapshot.borrow().are_srv_processed()
    }

    /// Wait until every dependency descriptor has been consumed.
    pub async fn wait_processed(&self, shutdown: &ShutdownSignal) -> WaitOutcome {
        self.wait_until(shutdown, ReadinessSnapshot::are_srv_processed)
            .await
    }

    /// Wait until every dependency is initialized.
    pub async fn wait_initialized(&self, shutdown: &ShutdownSignal) -> WaitOutcome {
        self.wait_until(shutdown, ReadinessSnapshot::are_srv_initialized)
            .await
    }

    async fn wait_until(
        &self,
        shutdown: &ShutdownSignal,
        ready: fn(&ReadinessSnapshot) -> bool,
    ) -> WaitOutcome {
        let mut rx = self.snapshot.clone();
        tokio::select! {
            biased;
            () = shutdown.wait() => WaitOutcome::ShutdownRequested,
            settled = rx.wait_for(|snap| snap.failed().is_some() || ready(snap)) => {
                match settled {
                    Ok(snap) => match snap.failed() {
                        Some(name) => WaitOutcome::DependencyFailed(name.to_string()),
                        None => WaitOutcome::Ready,
                    },
                    // Unreachable while `_publisher` is held.
                    Err(_) => WaitOutcome::ShutdownRequested,
                }
            }
        }
    }
}

impl Drop for ReadinessTracker {
    fn drop(&mut self) {
        for follower in &self.followers {
            follower.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Descriptor,
    Status,
}

fn apply(
    tx: &watch::Sender<ReadinessSnapshot>,
    index: usize,
    name: &str,
    source: Source,
    event: &WatchEvent,
) {
    let mut change = None;
    tx.send_if_modified(|snap| {
        let node = &mut snap.nodes[index];
        change = match source {
            Source::Descriptor => node.on_descriptor(event),
            Source::Status => node.on_status(event),
        };
        change.is_some()
    });
    match change {
        Some(NodeChange::Processed) => {
            tracing::info!(dependency = name, "dependency descriptor processed");
        }
        Some(NodeChange::InvalidDescriptor(error)) => {
            tracing::error!(dependency = name, %error, "unreadable dependency descriptor");
        }
        Some(NodeChange::RunStatus { from, to }) => {
            tracing::info!(dependency = name, %from, %to, "dependency run state changed");
        }
        None => {}
    }
}

async fn follow(
    index: usize,
    name: String,
    mut descriptor: Watch,
    mut status: Watch,
    tx: Arc<watch::Sender<ReadinessSnapshot>>,
) {
    let mut descriptor_open = true;
    let mut status_open = true;
    while descriptor_open || status_open {
        tokio::select! {
            event = descriptor.next(), if descriptor_open => match event {
                Some(event) => apply(&tx, index, &name, Source::Descriptor, &event),
                None => descriptor_open = false,
            },
            event = status.next(), if status_open => match event {
                Some(event) => apply(&tx, index, &name, Source::Status, &event),
                None => status_open = false,
            },
        }
    }
    tracing::debug!(dependency = %name, "dependency watches closed");
}
