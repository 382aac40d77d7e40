pub mod config;
pub mod description;
pub mod memory;
pub mod retry;
pub mod store;
pub mod store_keys;
pub mod types;
#[cfg(feature = "valkey")]
pub mod valkey;

pub use config::AgentConfig;
pub use description::{
    AppDescription, CommandLine, CommandSpec, ContainerKind, ContainerSpec, DescriptionError,
    FileSpec, MainCommandSpec, ProcessGroupSpec, ReadyProbe,
};
pub use memory::{Fault, MemoryStore};
pub use retry::{RetryPolicy, RetryingStore};
pub use store::{CoordinationStore, StoreError, StoreResult, Watch, WatchEvent};
pub use types::*;
#[cfg(feature = "valkey")]
pub use valkey::ValkeyStore;
