//! Tests for the status and stop use-cases against the in-memory store.

#![allow(clippy::unwrap_used)]

use bootchain_cli::application::services::app_status::gather_status;
use bootchain_cli::application::services::app_stop::{StopOutcome, stop_app};
use bootchain_cli::domain::AppError;
use bootchain_common::{CoordinationStore, Descriptor, MemoryStore, RunStatus, store_keys};

use crate::mocks::shop;

async fn deployed() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .create(
            &store_keys::description_path("shop"),
            &shop().to_json().unwrap(),
        )
        .await
        .unwrap();
    store
}

async fn publish(store: &MemoryStore, container: &str, status: &str) {
    let spec = shop().container(container).unwrap().clone();
    let descriptor = Descriptor::new(spec, format!("{container}-host"));
    store
        .create(
            &store_keys::descriptor_path("shop", container),
            &descriptor.to_json().unwrap(),
        )
        .await
        .unwrap();
    store
        .create(
            &store_keys::status_path("shop", container),
            status.as_bytes(),
        )
        .await
        .unwrap();
}

// ── status ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_of_unknown_app_is_not_deployed() {
    let store = MemoryStore::new();
    let err = gather_status(&store, "shop").await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<AppError>(),
        Some(&AppError::NotDeployed("shop".to_string()))
    );
}

#[tokio::test]
async fn test_status_lists_containers_in_declaration_order() {
    let store = deployed().await;
    publish(&store, "data", "initialized").await;
    publish(&store, "business", "running").await;

    let status = gather_status(&store, "shop").await.unwrap();

    let rows: Vec<(&str, RunStatus, Option<&str>)> = status
        .containers
        .iter()
        .map(|c| (c.name.as_str(), c.status, c.host.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("web", RunStatus::NotRunning, None),
            ("business", RunStatus::Running, Some("business-host")),
            ("data", RunStatus::Initialized, Some("data-host")),
        ]
    );
    assert!(!status.all_initialized());
    assert!(!status.shutdown_requested);
}

#[tokio::test]
async fn test_status_reads_unknown_run_state_as_failed() {
    let store = deployed().await;
    publish(&store, "data", "exploded").await;

    let status = gather_status(&store, "shop").await.unwrap();

    let failed: Vec<&str> = status.failed().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["data"]);
}

#[tokio::test]
async fn test_status_json_uses_snake_case_states() {
    let store = deployed().await;
    publish(&store, "data", "not_running").await;

    let status = gather_status(&store, "shop").await.unwrap();
    let value = serde_json::to_value(&status).unwrap();

    assert_eq!(value["app"], "shop");
    assert_eq!(value["containers"][2]["name"], "data");
    assert_eq!(value["containers"][2]["status"], "not_running");
    assert_eq!(value["containers"][0]["requires"][0], "business");
}

// ── stop ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stop_creates_shutdown_node_once() {
    let store = deployed().await;

    assert_eq!(stop_app(&store, "shop").await.unwrap(), StopOutcome::Requested);
    assert!(store.get_string(&store_keys::shutdown_path("shop")).is_some());
    assert_eq!(
        stop_app(&store, "shop").await.unwrap(),
        StopOutcome::AlreadyRequested
    );

    let status = gather_status(&store, "shop").await.unwrap();
    assert!(status.shutdown_requested);
}

#[tokio::test]
async fn test_stop_of_unknown_app_writes_nothing() {
    let store = MemoryStore::new();
    let err = stop_app(&store, "shop").await.unwrap_err();
    assert!(err.to_string().contains("is not deployed"));
    assert!(store.paths().is_empty());
}
