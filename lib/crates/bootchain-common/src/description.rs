//! Application description: the containers of one application, their
//! dependencies, declared environment and process groups.
//!
//! Descriptions are written as YAML by operators and travel through the
//! coordination store as JSON, so every type here derives both directions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors raised while loading or shape-checking a description.
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("cannot read application description {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid application description: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid application description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("application name '{0}' is invalid: use letters, digits, '-' or '_'")]
    InvalidAppName(String),

    #[error("container name '{0}' is invalid: use letters, digits, '-' or '_'")]
    InvalidContainerName(String),

    #[error("application '{0}' declares no containers")]
    NoContainers(String),

    #[error("container '{container}': {phase} command #{index} is empty")]
    EmptyCommand {
        container: String,
        phase: &'static str,
        index: usize,
    },

    #[error("container '{0}': main command is empty")]
    EmptyMain(String),
}

// ── Command lines ────────────────────────────────────────────────────────────

/// A command as written in the description: either a shell snippet run with
/// `sh -c`, or an explicit argv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    /// The argv that will be executed.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Shell(script) => vec!["sh".to_string(), "-c".to_string(), script.clone()],
            Self::Argv(argv) => argv.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(script) => script.trim().is_empty(),
            Self::Argv(argv) => argv.first().is_none_or(|program| program.trim().is_empty()),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(script) => f.write_str(script),
            Self::Argv(argv) => f.write_str(&argv.join(" ")),
        }
    }
}

/// A pre-main, post-main or stop command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: CommandLine,

    /// When set, a failure of this command halts its phase.
    #[serde(default = "default_abort_on_failure")]
    pub abort_on_failure: bool,

    /// Kill the command and count it as failed after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CommandSpec {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_abort_on_failure() -> bool {
    true
}

/// How an agent learns that a long-running main process is ready to serve.
///
/// Written as a single-key map, `ready: { tcp: { port: 80 } }`, in YAML and
/// JSON alike.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReadyProbe {
    /// Ready once this command exits successfully.
    Command {
        command: CommandLine,
        #[serde(default = "default_probe_interval_ms")]
        interval_ms: u64,
    },
    /// Ready once a TCP connection to `host:port` succeeds.
    Tcp {
        #[serde(default = "default_probe_host")]
        host: String,
        port: u16,
        #[serde(default = "default_probe_interval_ms")]
        interval_ms: u64,
    },
}

impl ReadyProbe {
    #[must_use]
    pub fn interval(&self) -> Duration {
        match self {
            Self::Command { interval_ms, .. } | Self::Tcp { interval_ms, .. } => {
                Duration::from_millis(*interval_ms)
            }
        }
    }
}

fn default_probe_interval_ms() -> u64 {
    500
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

/// The main command of a process group. Always abort-on-failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MainCommandSpec {
    pub command: CommandLine,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map"
    )]
    pub ready: Option<ReadyProbe>,

    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl MainCommandSpec {
    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

fn default_ready_timeout_secs() -> u64 {
    120
}

/// Ordered command groups of one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessGroupSpec {
    #[serde(default)]
    pub pre: Vec<CommandSpec>,
    pub main: MainCommandSpec,
    #[serde(default)]
    pub post: Vec<CommandSpec>,
    #[serde(default)]
    pub stop: Vec<CommandSpec>,
}

/// A file whose `${NAME}` placeholders are filled from the resolved environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    pub path: PathBuf,
    /// Write the original content back when the agent exits.
    #[serde(default)]
    pub restore: bool,
}

/// What sort of main process a container runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// Long-running server; initialized when its ready probe passes.
    #[default]
    Service,
    /// Runs to completion; initialized when it exits successfully.
    Task,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service => f.write_str("service"),
            Self::Task => f.write_str("task"),
        }
    }
}

/// One deployable container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,

    #[serde(default)]
    pub kind: ContainerKind,

    /// Image used by the docker launcher; ignored by the local launcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Names of the containers this one requires, in declaration order.
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default, deserialize_with = "scalar_map")]
    pub environment: BTreeMap<String, String>,

    /// `new name -> existing name` in the merged environment.
    #[serde(default, deserialize_with = "scalar_map")]
    pub aliases: BTreeMap<String, String>,

    #[serde(default)]
    pub files: Vec<FileSpec>,

    pub process: ProcessGroupSpec,
}

impl ContainerSpec {
    fn check_shape(&self) -> Result<(), DescriptionError> {
        if !is_valid_name(&self.name) {
            return Err(DescriptionError::InvalidContainerName(self.name.clone()));
        }
        if self.process.main.command.is_empty() {
            return Err(DescriptionError::EmptyMain(self.name.clone()));
        }
        let phases = [
            ("pre-main", &self.process.pre),
            ("post-main", &self.process.post),
            ("stop", &self.process.stop),
        ];
        for (phase, commands) in phases {
            if let Some(index) = commands.iter().position(|c| c.command.is_empty()) {
                return Err(DescriptionError::EmptyCommand {
                    container: self.name.clone(),
                    phase,
                    index: index + 1,
                });
            }
        }
        Ok(())
    }
}

/// Prefix applied to a container's variables when a dependent merges them:
/// uppercased `name` with `-` mapped to `_`, followed by `_`.
#[must_use]
pub fn env_prefix(name: &str) -> String {
    let mut prefix = name.to_uppercase().replace('-', "_");
    prefix.push('_');
    prefix
}

/// The full application description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppDescription {
    pub name: String,
    pub containers: Vec<ContainerSpec>,
}

impl AppDescription {
    /// Parse and shape-check a YAML description.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DescriptionError> {
        let description: Self = serde_yaml::from_str(yaml)?;
        description.check_shape()?;
        Ok(description)
    }

    /// Parse a description published to the store as JSON.
    pub fn from_json_slice(json: &[u8]) -> Result<Self, DescriptionError> {
        let description: Self = serde_json::from_slice(json)?;
        description.check_shape()?;
        Ok(description)
    }

    /// Read and parse a YAML description file.
    pub fn load(path: &Path) -> Result<Self, DescriptionError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| DescriptionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, DescriptionError> {
        Ok(serde_json::to_vec(self)?)
    }

    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }

    /// Checks each container in isolation. Cross-container structure
    /// (duplicates, cycles, unknown dependencies) is the graph validator's job.
    fn check_shape(&self) -> Result<(), DescriptionError> {
        if !is_valid_name(&self.name) {
            return Err(DescriptionError::InvalidAppName(self.name.clone()));
        }
        if self.containers.is_empty() {
            return Err(DescriptionError::NoContainers(self.name.clone()));
        }
        self.containers.iter().try_for_each(ContainerSpec::check_shape)
    }
}

/// Names are used in store paths and variable prefixes: 1-63 characters,
/// ASCII letters, digits, `-` and `_`, starting with a letter or digit.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Accepts YAML scalars of any type as string values, so `PORT: 5432` works.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(<D::Error as serde::de::Error>::custom(format!(
                        "value of '{key}' must be a string, number or boolean"
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}
