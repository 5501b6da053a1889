//! Pure serialization of the persistent prefix snapshot.
//!
//! Kept apart from [`crate::storage`] so the snapshot format can be tested
//! without async I/O or temp dirs.

use serde::{Deserialize, Serialize};

use prefixd_core::PrefixEntry;

/// Current snapshot format revision.
pub const SNAPSHOT_FORMAT: u8 = 1;

/// Errors from pure codec operations (no I/O variants).
#[derive(Debug, thiserror::Error)]
pub enum StorageCodecError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("unsupported snapshot format {0}")]
    UnsupportedFormat(u8),
}

/// Non-ephemeral prefix entries as written to the Durable Store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentSnapshot {
    pub format: u8,
    pub entries: Vec<PrefixEntry>,
}

impl PersistentSnapshot {
    /// Build a snapshot, dropping any ephemeral entry handed in.
    pub fn new(entries: impl IntoIterator<Item = PrefixEntry>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT,
            entries: entries.into_iter().filter(PrefixEntry::is_persistent).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn serialize_snapshot(snapshot: &PersistentSnapshot) -> Result<Vec<u8>, StorageCodecError> {
    postcard::to_allocvec(snapshot).map_err(|e| StorageCodecError::Serialize(e.to_string()))
}

pub fn deserialize_snapshot(bytes: &[u8]) -> Result<PersistentSnapshot, StorageCodecError> {
    let snapshot: PersistentSnapshot =
        postcard::from_bytes(bytes).map_err(|e| StorageCodecError::Deserialize(e.to_string()))?;
    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(StorageCodecError::UnsupportedFormat(snapshot.format));
    }
    Ok(snapshot)
}
