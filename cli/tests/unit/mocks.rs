//! Shared mock infrastructure for unit tests.
//!
//! Provides a recording launcher and reporter, plus the sample application
//! every test deploys, so each test file doesn't have to re-define the same
//! boilerplate.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use bootchain_cli::application::ports::{
    ContainerLauncher, LaunchRequest, LaunchedAgent, ProgressReporter,
};
use bootchain_common::{
    AppDescription, CommandLine, ContainerKind, ContainerSpec, MainCommandSpec, ProcessGroupSpec,
};

// ── Sample application ────────────────────────────────────────────────────────

pub const SHOP: &str = r"
name: shop
containers:
  - name: web
    requires: [business]
    process:
      main: { command: web-main }
  - name: business
    requires: [data]
    environment: { app_name: shop-core }
    process:
      main: { command: business-main }
  - name: data
    environment: { db_name: orders }
    process:
      main: { command: data-main }
";

pub fn shop() -> AppDescription {
    AppDescription::from_yaml_str(SHOP).unwrap()
}

/// Minimal container requiring `requires`.
pub fn container(name: &str, requires: &[&str]) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        kind: ContainerKind::Service,
        image: None,
        requires: requires.iter().map(ToString::to_string).collect(),
        environment: BTreeMap::new(),
        aliases: BTreeMap::new(),
        files: Vec::new(),
        process: ProcessGroupSpec {
            pre: Vec::new(),
            main: MainCommandSpec {
                command: CommandLine::Shell("true".to_string()),
                ready: None,
                ready_timeout_secs: 120,
            },
            post: Vec::new(),
            stop: Vec::new(),
        },
    }
}

// ── Launcher ──────────────────────────────────────────────────────────────────

/// Records every launch; fails the launch of `fail_on` and rejects every
/// application in preflight when `reject` is set.
#[derive(Default)]
pub struct RecordingLauncher {
    pub launched: Mutex<Vec<String>>,
    pub store_urls: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
    pub reject: bool,
}

impl RecordingLauncher {
    pub fn failing_on(container: &str) -> Self {
        Self {
            fail_on: Some(container.to_string()),
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

impl ContainerLauncher for RecordingLauncher {
    fn preflight(&self, containers: &[ContainerSpec]) -> Result<()> {
        if self.reject {
            anyhow::bail!("cannot launch {}", containers[0].name);
        }
        Ok(())
    }

    async fn launch(&self, request: &LaunchRequest<'_>) -> Result<LaunchedAgent> {
        let name = request.container.name.clone();
        if self.fail_on.as_deref() == Some(name.as_str()) {
            anyhow::bail!("agent binary not found");
        }
        self.launched.lock().unwrap().push(name.clone());
        self.store_urls
            .lock()
            .unwrap()
            .push(request.store_url.to_string());
        Ok(LaunchedAgent {
            handle: format!("pid-{name}"),
            container: name,
        })
    }
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Collects reported messages as `"step: …"`, `"success: …"`, `"warn: …"`.
#[derive(Default)]
pub struct RecordingReporter {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.strip_prefix("warn: ").map(ToString::to_string))
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("step: {message}"));
    }

    fn success(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("success: {message}"));
    }

    fn warn(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("warn: {message}"));
    }
}
