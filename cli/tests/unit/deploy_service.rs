//! Tests for the deploy use-case against the in-memory store.

#![allow(clippy::unwrap_used)]

use bootchain_cli::application::services::app_deploy::{DeployOptions, deploy_app};
use bootchain_cli::domain::{AppError, GraphError};
use bootchain_common::{AppDescription, CoordinationStore, MemoryStore, store_keys};

use crate::mocks::{RecordingLauncher, RecordingReporter, container, shop};

const STORE_URL: &str = "redis://valkey:6379";

fn opts(reporter: &RecordingReporter) -> DeployOptions<'_, RecordingReporter> {
    DeployOptions {
        reporter,
        store_url: STORE_URL,
        force: false,
    }
}

/// Publish `shop` as a previous deployment whose `data` agent reports `status`.
async fn previous_run(store: &MemoryStore, status: &[u8]) {
    store
        .create(
            &store_keys::description_path("shop"),
            &shop().to_json().unwrap(),
        )
        .await
        .unwrap();
    store
        .create(&store_keys::status_path("shop", "data"), status)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_deploy_publishes_description_and_launches_dependencies_first() {
    let store = MemoryStore::new();
    let launcher = RecordingLauncher::default();
    let reporter = RecordingReporter::default();

    let outcome = deploy_app(&store, &launcher, &shop(), opts(&reporter))
        .await
        .unwrap();

    assert_eq!(outcome.app, "shop");
    assert!(!outcome.replaced_previous);
    assert_eq!(launcher.launched(), vec!["data", "business", "web"]);
    assert!(
        launcher
            .store_urls
            .lock()
            .unwrap()
            .iter()
            .all(|url| url == STORE_URL)
    );

    let raw = store
        .read(&store_keys::description_path("shop"))
        .await
        .unwrap();
    assert_eq!(AppDescription::from_json_slice(&raw).unwrap(), shop());
}

#[tokio::test]
async fn test_deploy_of_cyclic_app_writes_and_launches_nothing() {
    let yaml = r"
name: loop
containers:
  - name: a
    requires: [b]
    process: { main: { command: a } }
  - name: b
    requires: [a]
    process: { main: { command: b } }
";
    let app = AppDescription::from_yaml_str(yaml).unwrap();
    let store = MemoryStore::new();
    let launcher = RecordingLauncher::default();
    let reporter = RecordingReporter::default();

    let err = deploy_app(&store, &launcher, &app, opts(&reporter))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::Cycle { .. })
    ));
    assert!(store.paths().is_empty());
    assert!(launcher.launched().is_empty());
}

#[tokio::test]
async fn test_deploy_rejected_in_preflight_writes_nothing() {
    let store = MemoryStore::new();
    let launcher = RecordingLauncher::rejecting();
    let reporter = RecordingReporter::default();

    let err = deploy_app(&store, &launcher, &shop(), opts(&reporter))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "cannot launch web");
    assert!(store.paths().is_empty());
}

#[tokio::test]
async fn test_deploy_removes_nodes_of_previous_run() {
    let store = MemoryStore::new();
    // The previous version had a container this one dropped.
    let mut previous = shop();
    previous.containers.push(container("retired", &[]));
    store
        .create(
            &store_keys::description_path("shop"),
            &previous.to_json().unwrap(),
        )
        .await
        .unwrap();
    let stale = [
        (store_keys::descriptor_path("shop", "data"), "old"),
        (store_keys::status_path("shop", "data"), "failed"),
        (store_keys::status_path("shop", "retired"), "failed"),
        (store_keys::shutdown_path("shop"), "old"),
    ];
    for (path, data) in &stale {
        store.create(path, data.as_bytes()).await.unwrap();
    }
    let launcher = RecordingLauncher::default();
    let reporter = RecordingReporter::default();

    let outcome = deploy_app(&store, &launcher, &shop(), opts(&reporter))
        .await
        .unwrap();

    assert!(outcome.replaced_previous);
    assert_eq!(store.paths(), vec![store_keys::description_path("shop")]);
    assert_eq!(
        reporter.warnings(),
        vec!["removed the nodes of a previous 'shop' deployment"]
    );
}

#[tokio::test]
async fn test_launch_failure_stops_agents_already_launched() {
    let store = MemoryStore::new();
    let launcher = RecordingLauncher::failing_on("business");
    let reporter = RecordingReporter::default();

    let err = deploy_app(&store, &launcher, &shop(), opts(&reporter))
        .await
        .unwrap_err();

    assert_eq!(
        format!("{err:#}"),
        "launching agent for container 'business': agent binary not found"
    );
    assert_eq!(launcher.launched(), vec!["data"]);
    assert!(
        store
            .get_string(&store_keys::shutdown_path("shop"))
            .is_some()
    );
}

#[tokio::test]
async fn test_deploy_over_live_agents_is_refused() {
    let store = MemoryStore::new();
    previous_run(&store, b"initialized").await;
    let launcher = RecordingLauncher::default();
    let reporter = RecordingReporter::default();

    let err = deploy_app(&store, &launcher, &shop(), opts(&reporter))
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<AppError>(),
        Some(&AppError::StillRunning {
            app: "shop".to_string(),
            containers: vec!["data".to_string()],
        })
    );
    assert!(launcher.launched().is_empty());
    assert_eq!(
        store.get_string(&store_keys::status_path("shop", "data")).as_deref(),
        Some("initialized")
    );
    assert!(store.get_string(&store_keys::shutdown_path("shop")).is_none());
}

#[tokio::test]
async fn test_forced_deploy_replaces_live_agents() {
    let store = MemoryStore::new();
    previous_run(&store, b"running").await;
    let launcher = RecordingLauncher::default();
    let reporter = RecordingReporter::default();
    let opts = DeployOptions {
        force: true,
        ..opts(&reporter)
    };

    let outcome = deploy_app(&store, &launcher, &shop(), opts).await.unwrap();

    assert!(outcome.replaced_previous);
    assert_eq!(launcher.launched(), vec!["data", "business", "web"]);
    assert!(store.get_string(&store_keys::status_path("shop", "data")).is_none());
}
