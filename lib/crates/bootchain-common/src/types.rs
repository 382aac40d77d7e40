use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::description::ContainerSpec;

/// Run state a container publishes at its status node.
///
/// Closed set: anything an agent reads that is not one of these strings is
/// treated as [`RunStatus::Failed`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    NotRunning,
    Running,
    Initialized,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
            Self::Running => "running",
            Self::Initialized => "initialized",
            Self::Failed => "failed",
        }
    }

    /// Interpret raw status-node data.
    #[must_use]
    pub fn from_signal(data: &[u8]) -> Self {
        match std::str::from_utf8(data).map(str::trim) {
            Ok("not_running") => Self::NotRunning,
            Ok("running") => Self::Running,
            Ok("initialized") => Self::Initialized,
            _ => Self::Failed,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::NotRunning => 0,
            Self::Running => 1,
            Self::Initialized => 2,
            Self::Failed => 3,
        }
    }

    /// Apply an observed status: forward moves are taken, regressions are
    /// ignored, and `Failed` is terminal.
    #[must_use]
    pub fn advance(self, observed: Self) -> Self {
        if self == Self::Failed || observed.rank() <= self.rank() {
            self
        } else {
            observed
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an agent has consumed a dependency's descriptor yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    #[default]
    NotProcessed,
    Processed,
}

/// Published by an agent at its descriptor node so dependents can merge its
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Descriptor {
    pub spec: ContainerSpec,
    pub host: String,
    pub published_at: DateTime<Utc>,
}

impl Descriptor {
    #[must_use]
    pub fn new(spec: ContainerSpec, host: impl Into<String>) -> Self {
        Self {
            spec,
            host: host.into(),
            published_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}
