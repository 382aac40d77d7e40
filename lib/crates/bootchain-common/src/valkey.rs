//! [`CoordinationStore`] backed by Valkey (or any Redis-compatible server).
//!
//! Mapping of the hierarchical model onto flat keys:
//! - node data lives at `bootchain:node:{path}`;
//! - the names of a node's direct children live in the set
//!   `bootchain:children:{path}`;
//! - every mutation publishes `created`, `changed` or `deleted` on the channel
//!   `bootchain:watch:{path}`.
//!
//! Mutations run as Lua scripts so data, child set and notification change
//! together.

use std::sync::LazyLock;
use std::time::Duration;

use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc::UnboundedSender;

use crate::retry::RetryPolicy;
use crate::store::{CoordinationStore, StoreError, StoreResult, Watch, WatchEvent, checked_path};
use crate::store_keys;

const NODE_PREFIX: &str = "bootchain:node:";
const CHILDREN_PREFIX: &str = "bootchain:children:";
const CHANNEL_PREFIX: &str = "bootchain:watch:";

/// Delay before re-subscribing a watch whose connection dropped.
const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(500);

static CREATE: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if not redis.call('SET', KEYS[1], ARGV[1], 'NX') then
            return 0
        end
        if ARGV[2] ~= '' then
            redis.call('SADD', KEYS[2], ARGV[2])
        end
        redis.call('PUBLISH', ARGV[3], 'created')
        return 1
        ",
    )
});

static SET: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return 0
        end
        redis.call('SET', KEYS[1], ARGV[1])
        redis.call('PUBLISH', ARGV[2], 'changed')
        return 1
        ",
    )
});

static DELETE: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        if redis.call('DEL', KEYS[1]) == 0 then
            return 0
        end
        if ARGV[1] ~= '' then
            redis.call('SREM', KEYS[2], ARGV[1])
        end
        redis.call('PUBLISH', ARGV[2], 'deleted')
        return 1
        ",
    )
});

fn node_key(path: &str) -> String {
    format!("{NODE_PREFIX}{path}")
}

fn children_key(path: &str) -> String {
    format!("{CHILDREN_PREFIX}{path}")
}

fn channel(path: &str) -> String {
    format!("{CHANNEL_PREFIX}{path}")
}

/// Children-set key of the parent and the name to file under it; empty for
/// the root, which has no parent.
fn parent_entry(path: &str) -> (String, String) {
    store_keys::parent(path).map_or_else(
        || (children_key("/"), String::new()),
        |parent| (children_key(parent), store_keys::leaf(path).to_string()),
    )
}

/// Classify a client error. Transport failures are connection loss, which
/// callers retry; ACL refusals are final.
fn map_error(err: &redis::RedisError) -> StoreError {
    if err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_io_error()
        || err.is_timeout()
    {
        StoreError::ConnectionLoss
    } else if err.kind() == redis::ErrorKind::AuthenticationFailed || err.code() == Some("NOPERM")
    {
        StoreError::AccessDenied(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// Read `path` and turn the notification `kind` into an event carrying the
/// node's current state. A failed read is retried with backoff until one
/// succeeds, so no notification is ever skipped; `None` means the watcher is
/// gone.
async fn node_event(
    store: &impl CoordinationStore,
    path: &str,
    kind: &str,
    tx: &UnboundedSender<WatchEvent>,
) -> Option<WatchEvent> {
    let policy = RetryPolicy::default();
    let mut attempt: u32 = 0;
    loop {
        if tx.is_closed() {
            return None;
        }
        match store.read(path).await {
            Ok(data) if kind == "created" => return Some(WatchEvent::Created(data)),
            Ok(data) => return Some(WatchEvent::Changed(data)),
            Err(StoreError::NoNode(_)) => return Some(WatchEvent::Deleted),
            Err(e) => {
                attempt = attempt.saturating_add(1);
                let delay = policy.backoff(attempt);
                tracing::warn!(path, error = %e, attempt, ?delay, "cannot read watched node, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[derive(Clone)]
pub struct ValkeyStore {
    client: redis::Client,
    conn: ConnectionManager,
}

impl ValkeyStore {
    /// Connect to `url` (`redis://` or `rediss://`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| map_error(&e))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| map_error(&e))?;
        tracing::info!(url = %redact(url), "coordination store connected");
        Ok(Self { client, conn })
    }

    /// Forward pub/sub notifications for `path` into `tx` until the watcher
    /// goes away. A dropped subscription is re-established and followed by a
    /// coalesced event carrying the node's current state, since notifications
    /// published while disconnected are lost.
    async fn forward(
        self,
        path: String,
        mut pubsub: redis::aio::PubSub,
        tx: UnboundedSender<WatchEvent>,
    ) {
        loop {
            let mut messages = Box::pin(pubsub.into_on_message());
            while let Some(msg) = messages.next().await {
                let kind: String = msg.get_payload().unwrap_or_default();
                let Some(event) = node_event(&self, &path, &kind, &tx).await else {
                    return;
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            drop(messages);

            pubsub = loop {
                if tx.is_closed() {
                    return;
                }
                tracing::warn!(path = %path, "watch subscription dropped, re-subscribing");
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                match self.subscribe(&path).await {
                    Ok(fresh) => break fresh,
                    Err(e) => tracing::warn!(path = %path, error = %e, "re-subscribe failed"),
                }
            };
            match node_event(&self, &path, "changed", &tx).await {
                Some(event) => {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    async fn subscribe(&self, path: &str) -> StoreResult<redis::aio::PubSub> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| map_error(&e))?;
        pubsub
            .subscribe(channel(path))
            .await
            .map_err(|e| map_error(&e))?;
        Ok(pubsub)
    }
}

impl CoordinationStore for ValkeyStore {
    async fn create(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        checked_path(path)?;
        let (siblings, name) = parent_entry(path);
        let mut conn = self.conn.clone();
        let created: i64 = CREATE
            .key(node_key(path))
            .key(siblings)
            .arg(data)
            .arg(name)
            .arg(channel(path))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_error(&e))?;
        if created == 0 {
            return Err(StoreError::NodeExists(path.to_string()));
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        checked_path(path)?;
        let mut conn = self.conn.clone();
        let data: Option<Vec<u8>> = conn
            .get(node_key(path))
            .await
            .map_err(|e| map_error(&e))?;
        data.ok_or_else(|| StoreError::NoNode(path.to_string()))
    }

    async fn set(&self, path: &str, data: &[u8]) -> StoreResult<()> {
        checked_path(path)?;
        let mut conn = self.conn.clone();
        let updated: i64 = SET
            .key(node_key(path))
            .arg(data)
            .arg(channel(path))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_error(&e))?;
        if updated == 0 {
            return Err(StoreError::NoNode(path.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        checked_path(path)?;
        let (siblings, name) = parent_entry(path);
        let mut conn = self.conn.clone();
        let deleted: i64 = DELETE
            .key(node_key(path))
            .key(siblings)
            .arg(name)
            .arg(channel(path))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_error(&e))?;
        if deleted == 0 {
            return Err(StoreError::NoNode(path.to_string()));
        }
        Ok(())
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        checked_path(path)?;
        let mut conn = self.conn.clone();
        let mut names: Vec<String> = conn
            .smembers(children_key(path))
            .await
            .map_err(|e| map_error(&e))?;
        names.sort();
        Ok(names)
    }

    async fn watch(&self, path: &str) -> StoreResult<Watch> {
        checked_path(path)?;
        let pubsub = self.subscribe(path).await?;
        let (tx, watch) = Watch::channel(path);
        tokio::spawn(self.clone().forward(path.to_string(), pubsub, tx));
        Ok(watch)
    }
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
