//! Dependency readiness model.
//!
//! One [`ServiceNode`] per direct dependency, folded from the events of its
//! descriptor node and its status node. A [`ReadinessSnapshot`] answers the
//! two questions the bootstrap sequence waits on.

use bootchain_common::{ConfigStatus, ContainerSpec, Descriptor, RunStatus, WatchEvent, store_keys};

/// What a store event did to a node, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChange {
    /// The descriptor was consumed; the dependency's spec is now known.
    Processed,
    /// The descriptor could not be parsed; the dependency counts as failed.
    InvalidDescriptor(String),
    /// The run state moved forward.
    RunStatus { from: RunStatus, to: RunStatus },
}

/// Locally tracked state of one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNode {
    pub name: String,
    pub descriptor_path: String,
    pub status_path: String,
    pub config_status: ConfigStatus,
    pub run_status: RunStatus,
    pub spec: Option<ContainerSpec>,
    /// Whether the status node has ever been observed; deleting a node that
    /// was never seen is not a failure.
    status_seen: bool,
}

impl ServiceNode {
    #[must_use]
    pub fn new(app: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor_path: store_keys::descriptor_path(app, name),
            status_path: store_keys::status_path(app, name),
            config_status: ConfigStatus::NotProcessed,
            run_status: RunStatus::NotRunning,
            spec: None,
            status_seen: false,
        }
    }

    /// Consume a descriptor event. The first readable descriptor moves the
    /// node to `Processed`; later ones are ignored, as is deletion.
    pub fn on_descriptor(&mut self, event: &WatchEvent) -> Option<NodeChange> {
        if self.config_status == ConfigStatus::Processed {
            return None;
        }
        let data = event.data()?;
        match Descriptor::from_json(data) {
            Ok(descriptor) => {
                self.spec = Some(descriptor.spec);
                self.config_status = ConfigStatus::Processed;
                Some(NodeChange::Processed)
            }
            Err(e) => {
                self.run_status = RunStatus::Failed;
                Some(NodeChange::InvalidDescriptor(e.to_string()))
            }
        }
    }

    /// Consume a status event. Forward moves are applied, regressions and
    /// repeats are ignored, and deletion after the node was seen means the
    /// dependency is gone.
    pub fn on_status(&mut self, event: &WatchEvent) -> Option<NodeChange> {
        let observed = match event.data() {
            Some(data) => {
                self.status_seen = true;
                RunStatus::from_signal(data)
            }
            None if self.status_seen => RunStatus::Failed,
            None => return None,
        };
        let from = self.run_status;
        let to = from.advance(observed);
        if to == from {
            return None;
        }
        self.run_status = to;
        Some(NodeChange::RunStatus { from, to })
    }

    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.config_status == ConfigStatus::Processed
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.run_status == RunStatus::Initialized
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.run_status == RunStatus::Failed
    }
}

/// Point-in-time view of all direct dependencies, in `requires` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessSnapshot {
    pub nodes: Vec<ServiceNode>,
}

impl ReadinessSnapshot {
    #[must_use]
    pub fn new(app: &str, requires: &[String]) -> Self {
        Self {
            nodes: requires.iter().map(|name| ServiceNode::new(app, name)).collect(),
        }
    }

    /// True when every dependency has reached `initialized`. Vacuously true
    /// without dependencies.
    #[must_use]
    pub fn are_srv_initialized(&self) -> bool {
        self.nodes.iter().all(ServiceNode::is_initialized)
    }

    /// True when every dependency's descriptor has been consumed.
    #[must_use]
    pub fn are_srv_processed(&self) -> bool {
        self.nodes.iter().all(ServiceNode::is_processed)
    }

    /// First dependency, in `requires` order, that has failed.
    #[must_use]
    pub fn failed(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|node| node.is_failed())
            .map(|node| node.name.as_str())
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Specs of the processed dependencies, in `requires` order.
    #[must_use]
    pub fn dependency_specs(&self) -> Vec<&ContainerSpec> {
        self.nodes.iter().filter_map(|node| node.spec.as_ref()).collect()
    }
}
