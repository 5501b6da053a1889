//! Persistence gate: rewrites the Durable Store only when a committed
//! change touched a non-ephemeral entry.

use prefixd_core::PrefixEntry;
use prefixd_core::constants::PERSISTENT_STORE_KEY;
use prefixd_table::{ChangeSet, PrefixTable};

use crate::storage::{DurableStore, StorageError};
use crate::storage_codec::{self, PersistentSnapshot};

pub struct PersistenceGate<S> {
    store: S,
    writes: u64,
}

impl<S: DurableStore> PersistenceGate<S> {
    pub fn new(store: S) -> Self {
        Self { store, writes: 0 }
    }

    /// Read the snapshot saved by a previous run. Empty if none exists.
    pub async fn restore(&self) -> Result<Vec<PrefixEntry>, StorageError> {
        let Some(bytes) = self.store.load(PERSISTENT_STORE_KEY).await? else {
            return Ok(Vec::new());
        };
        let snapshot = storage_codec::deserialize_snapshot(&bytes)
            .map_err(|e| StorageError::Deserialize(e.to_string()))?;
        Ok(snapshot.entries)
    }

    /// Write the full persistent snapshot if `changes` requires it.
    ///
    /// Returns whether a write happened.
    pub async fn commit(
        &mut self,
        changes: &ChangeSet,
        table: &PrefixTable,
    ) -> Result<bool, StorageError> {
        if !changes.touches_persistent() {
            return Ok(false);
        }
        let snapshot = PersistentSnapshot::new(table.persistent_entries());
        let bytes = storage_codec::serialize_snapshot(&snapshot)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.store.store(PERSISTENT_STORE_KEY, &bytes).await?;
        self.writes += 1;
        tracing::debug!(entries = snapshot.len(), "persistent snapshot written");
        Ok(true)
    }

    /// Snapshot writes performed by this gate.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
