//! Command-level tests: commands run against the in-memory store with a
//! quiet, colourless output context.

#![allow(clippy::unwrap_used)]

use std::io::Write as _;

use bootchain_cli::commands::status::{self, StatusArgs, format_row};
use bootchain_cli::commands::stop::{self, StopArgs};
use bootchain_cli::commands::validate::{self, ValidateArgs};
use bootchain_cli::application::services::app_status::ContainerStatus;
use bootchain_cli::output::OutputContext;
use bootchain_common::{CoordinationStore, MemoryStore, RunStatus, store_keys};

use crate::mocks::{SHOP, shop};

fn quiet() -> OutputContext {
    OutputContext::new(true, true)
}

fn description_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_validate_accepts_shop() {
    let file = description_file(SHOP);
    let args = ValidateArgs {
        file: file.path().to_path_buf(),
    };
    validate::run(&quiet(), &args, false).unwrap();
}

#[test]
fn test_validate_names_unknown_dependency() {
    let file = description_file(&SHOP.replace("requires: [data]", "requires: [cache]"));
    let args = ValidateArgs {
        file: file.path().to_path_buf(),
    };
    let err = validate::run(&quiet(), &args, false).unwrap_err();
    assert!(
        format!("{err:#}").contains("'business' requires 'cache'"),
        "unexpected error: {err:#}"
    );
}

#[tokio::test]
async fn test_status_and_stop_commands_succeed_on_deployed_app() {
    let store = MemoryStore::new();
    store
        .create(
            &store_keys::description_path("shop"),
            &shop().to_json().unwrap(),
        )
        .await
        .unwrap();

    let status_args = StatusArgs {
        app: "shop".to_string(),
    };
    status::run(&quiet(), &store, &status_args, false)
        .await
        .unwrap();

    let stop_args = StopArgs {
        app: "shop".to_string(),
    };
    stop::run(&quiet(), &store, &stop_args, false).await.unwrap();
    assert!(store.get_string(&store_keys::shutdown_path("shop")).is_some());
}

#[test]
fn test_status_row_shows_state_host_and_dependencies() {
    let row = format_row(
        &quiet(),
        &ContainerStatus {
            name: "web".to_string(),
            status: RunStatus::Running,
            host: Some("web-host".to_string()),
            requires: vec!["business".to_string()],
        },
        8,
    );
    assert_eq!(row, "web       running       web-host  requires business");
}
