//! Interface to the distributed KV store.
//!
//! The store is eventually consistent and shared by every router: each key
//! carries a monotonically increasing version and a TTL, and subscribers see
//! every accepted write as a [`KvUpdate`]. TTL refreshes are silent.

pub mod memory;

use std::time::Duration;

use tokio::sync::broadcast;

pub use memory::MemoryKvStore;

/// A versioned value as stored in the KV store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvValue {
    pub version: u64,
    pub originator_id: String,
    pub value: Vec<u8>,
    pub ttl: Duration,
    /// Bumped by TTL refreshes of an otherwise unchanged value.
    pub ttl_version: u64,
}

/// Notification of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvUpdate {
    pub key: String,
    pub value: KvValue,
}

#[derive(Debug, thiserror::Error)]
pub enum KvStoreError {
    #[error("KV store unavailable: {0}")]
    Unavailable(String),
}

/// Async client of the distributed KV store.
pub trait KvStore: Send + Sync + 'static {
    /// Read a live (unexpired) key.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<KvValue>, KvStoreError>> + Send;

    /// Offer a value. Returns whether the store accepted it under its merge
    /// rules.
    fn set(
        &self,
        key: &str,
        value: KvValue,
    ) -> impl Future<Output = Result<bool, KvStoreError>> + Send;

    /// Subscribe to accepted writes from now on.
    fn subscribe(&self) -> broadcast::Receiver<KvUpdate>;
}
