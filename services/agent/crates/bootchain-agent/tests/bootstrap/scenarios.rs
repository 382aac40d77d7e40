#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bootchain_agent::application::{
    AgentOptions, AgentOutcome, AgentPorts, ShutdownSignal, run_agent,
};
use bootchain_common::{
    AppDescription, CoordinationStore, Fault, MemoryStore, RetryPolicy, RetryingStore, store_keys,
};

use crate::fakes::{AlwaysReady, Journal, NoFiles, ScriptedRunner};

const SHOP: &str = r"
name: shop
containers:
  - name: web
    requires: [business]
    environment: { port: 80 }
    process:
      main: { command: web-main }
      stop:
        - command: web-stop
  - name: business
    requires: [data]
    environment: { app_name: shop-core }
    aliases: { DATABASE: DATA_DB_NAME }
    process:
      pre:
        - command: business-pre
      main: { command: business-main }
      post:
        - command: business-post
  - name: data
    environment: { db_name: orders }
    process:
      main: { command: data-main }
";

const DEADLINE: Duration = Duration::from_secs(10);

async fn deploy(store: &impl CoordinationStore) {
    let app = AppDescription::from_yaml_str(SHOP).unwrap();
    store
        .create(&store_keys::description_path("shop"), &app.to_json().unwrap())
        .await
        .unwrap();
}

fn opts(container: &str) -> AgentOptions {
    AgentOptions {
        app: "shop".into(),
        container: container.into(),
        host: format!("{container}-host"),
    }
}

async fn agent(
    store: &impl CoordinationStore,
    runner: &ScriptedRunner,
    container: &str,
) -> AgentOutcome {
    let ports = AgentPorts {
        store,
        runner,
        probe: &AlwaysReady,
        files: &NoFiles,
    };
    run_agent(ports, &opts(container), &ShutdownSignal::new())
        .await
        .unwrap()
}

fn status(store: &MemoryStore, container: &str) -> Option<String> {
    store.get_string(&store_keys::status_path("shop", container))
}

/// Wait until every container is initialized, then request shutdown.
async fn shut_down_once_initialized(store: &MemoryStore) {
    while ["data", "business", "web"]
        .iter()
        .any(|c| status(store, c).as_deref() != Some("initialized"))
    {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    store
        .create(&store_keys::shutdown_path("shop"), b"requested")
        .await
        .unwrap();
}

#[tokio::test]
async fn three_tier_app_starts_in_dependency_order() {
    let store = MemoryStore::new();
    deploy(&store).await;
    let journal = Journal::default();
    let runner = ScriptedRunner::failing(&journal, &[]);

    // Started in reverse dependency order on purpose.
    let (web, business, data, ()) = tokio::time::timeout(DEADLINE, async {
        tokio::join!(
            agent(&store, &runner, "web"),
            agent(&store, &runner, "business"),
            agent(&store, &runner, "data"),
            shut_down_once_initialized(&store),
        )
    })
    .await
    .unwrap();

    assert_eq!(web, AgentOutcome::Stopped);
    assert_eq!(business, AgentOutcome::Stopped);
    assert_eq!(data, AgentOutcome::Stopped);

    assert!(journal.position("spawn data-main") < journal.position("run business-pre"));
    assert!(journal.position("run business-pre") < journal.position("spawn business-main"));
    assert!(journal.position("spawn business-main") < journal.position("run business-post"));
    assert!(journal.position("run business-post") < journal.position("spawn web-main"));
    assert!(journal.position("spawn web-main") < journal.position("run web-stop"));
    for main in ["data-main", "business-main", "web-main"] {
        journal.position(&format!("kill {main}"));
    }

    // A clean shutdown withdraws every container's nodes.
    let containers = store_keys::containers_path("shop");
    assert!(store.paths().iter().all(|p| !p.starts_with(&format!("{containers}/"))));
}

#[tokio::test]
async fn environments_see_direct_dependencies_only() {
    let store = MemoryStore::new();
    deploy(&store).await;
    let journal = Journal::default();
    let runner = ScriptedRunner::failing(&journal, &[]);

    tokio::time::timeout(DEADLINE, async {
        tokio::join!(
            agent(&store, &runner, "data"),
            agent(&store, &runner, "business"),
            agent(&store, &runner, "web"),
            shut_down_once_initialized(&store),
        )
    })
    .await
    .unwrap();

    let business = runner.env_of("business-main");
    assert_eq!(business.get("APP_NAME"), Some("shop-core"));
    assert_eq!(business.get("DATA_DB_NAME"), Some("orders"));
    assert_eq!(business.get("DATABASE"), Some("orders"));
    assert_eq!(business.get("BOOTCHAIN_APP"), Some("shop"));

    let web = runner.env_of("web-main");
    assert_eq!(web.get("PORT"), Some("80"));
    assert_eq!(web.get("BUSINESS_APP_NAME"), Some("shop-core"));
    assert!(web.iter().all(|(k, _)| !k.starts_with("DATA_")));

    // Pre-main commands see the same environment as main.
    assert_eq!(runner.env_of("business-pre"), business);
}

#[tokio::test]
async fn failure_propagates_down_the_chain() {
    let store = MemoryStore::new();
    deploy(&store).await;
    let journal = Journal::default();
    let runner = ScriptedRunner::failing(&journal, &["data-main"]);

    let (data, business, web) = tokio::time::timeout(DEADLINE, async {
        tokio::join!(
            agent(&store, &runner, "data"),
            agent(&store, &runner, "business"),
            agent(&store, &runner, "web"),
        )
    })
    .await
    .unwrap();

    assert_eq!(data, AgentOutcome::GroupFailed);
    assert_eq!(business, AgentOutcome::DependencyFailed("data".into()));
    assert_eq!(web, AgentOutcome::DependencyFailed("business".into()));

    assert_eq!(journal.entries(), vec!["spawn data-main"]);
    for container in ["data", "business", "web"] {
        assert_eq!(status(&store, container).as_deref(), Some("failed"));
    }
}

#[tokio::test]
async fn post_main_abort_kills_main_and_fails_container() {
    let store = MemoryStore::new();
    deploy(&store).await;
    let journal = Journal::default();
    let runner = ScriptedRunner::failing(&journal, &["business-post"]);
    let data_shutdown = ShutdownSignal::new();

    let data = async {
        let ports = AgentPorts {
            store: &store,
            runner: &runner,
            probe: &AlwaysReady,
            files: &NoFiles,
        };
        run_agent(ports, &opts("data"), &data_shutdown).await.unwrap()
    };
    let business = async {
        let outcome = agent(&store, &runner, "business").await;
        data_shutdown.trigger();
        outcome
    };
    let (data, business) = tokio::time::timeout(DEADLINE, async { tokio::join!(data, business) })
        .await
        .unwrap();

    assert_eq!(business, AgentOutcome::GroupFailed);
    assert_eq!(data, AgentOutcome::Stopped);
    assert_eq!(status(&store, "business").as_deref(), Some("failed"));
    assert!(journal.position("run business-post") < journal.position("kill business-main"));
}

#[tokio::test]
async fn agents_ride_out_connection_loss() {
    let memory = MemoryStore::new();
    deploy(&memory).await;
    for fault in [Fault::ConnectionLoss, Fault::LostAck, Fault::ConnectionLoss, Fault::LostAck] {
        memory.inject(fault);
    }
    let policy = RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        max_attempts: None,
    };
    let store = RetryingStore::new(memory.clone(), policy);
    let journal = Journal::default();
    let runner = ScriptedRunner::failing(&journal, &[]);

    let (data, business, web, ()) = tokio::time::timeout(DEADLINE, async {
        tokio::join!(
            agent(&store, &runner, "data"),
            agent(&store, &runner, "business"),
            agent(&store, &runner, "web"),
            shut_down_once_initialized(&memory),
        )
    })
    .await
    .unwrap();

    assert_eq!(
        (data, business, web),
        (AgentOutcome::Stopped, AgentOutcome::Stopped, AgentOutcome::Stopped)
    );
    assert!(journal.position("spawn data-main") < journal.position("spawn web-main"));
}
