//! Error types for the prefix manager node.

use prefixd_core::{CodecError, KeyError};

use crate::command::CommandError;
use crate::kvstore::KvStoreError;
use crate::storage::StorageError;

/// Errors returned to callers of the manager's request/response API.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The command was applied in memory but the persistent snapshot could
    /// not be written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("prefix manager stopped")]
    Stopped,
}

/// Failure to place one publication in the KV store. The key stays dirty
/// and is retried.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("kv store error: {0}")]
    KvStore(#[from] KvStoreError),
    #[error("encode error: {0}")]
    Codec(#[from] CodecError),
    #[error("kv store rejected {key} at version {version}")]
    Rejected { key: String, version: u64 },
}

/// Errors that can occur while configuring or starting the node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("prefix manager already running")]
    AlreadyRunning,
}
