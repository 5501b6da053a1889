//! Prefix advertisement manager node.
//!
//! Owns the prefix table on a single event loop, persists non-ephemeral
//! entries through a [`DurableStore`] and publishes one versioned key per
//! winning prefix into a [`KvStore`].

pub mod command;
pub mod config;
pub mod error;
pub mod handle;
pub mod kvstore;
pub mod logging;
pub mod manager;
pub mod persistence;
pub mod storage;
pub mod storage_codec;
pub mod tower_service;

pub use command::{CommandError, PrefixCommand, PrefixUpdateCommand, PrefixUpdateRequest};
pub use config::{ManagerConfig, NodeConfig};
pub use error::{ManagerError, NodeError, PublishError};
pub use handle::{PrefixManagerHandle, Reply, ShutdownHandle};
pub use kvstore::{KvStore, KvStoreError, KvUpdate, KvValue, MemoryKvStore};
pub use manager::PrefixManager;
pub use storage::{DurableStore, MemoryStorage, Storage, StorageError};
