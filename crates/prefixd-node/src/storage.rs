//! Durable Store for the persistent prefix snapshot.
//!
//! [`Storage`] keeps one file per key under a base directory and writes
//! atomically (write to `.tmp`, then rename) so a crash never leaves a torn
//! snapshot. [`MemoryStorage`] is the in-process variant used by tests and
//! storage-less deployments; clones share the same map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::fs;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("failed to determine storage directory: {0}")]
    Directory(String),

    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Crash-safe blob store keyed by name.
pub trait DurableStore: Send + Sync + 'static {
    /// Read the blob stored under `key`, if any.
    fn load(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// Replace the blob under `key`. Returns once the write is durable.
    fn store(
        &self,
        key: &str,
        value: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// File-backed durable store.
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    /// Create a new storage instance, creating the directory if needed.
    ///
    /// # Note
    /// This performs blocking I/O (`create_dir_all`). Call at startup before
    /// the async runtime is under load.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Create storage at the default path (`~/.prefixd/storage`).
    pub fn default_path() -> Result<Self, StorageError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StorageError::Directory("could not determine home directory".into()))?;
        Self::new(home.join(".prefixd").join("storage"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(key))
    }

    /// Write data atomically: write to a `.tmp` file then rename.
    async fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

impl DurableStore for Storage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        self.atomic_write(&path, value).await
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    blobs: HashMap<String, Vec<u8>>,
    writes: usize,
    fail_writes: bool,
}

/// In-memory durable store with a write counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Make subsequent writes fail, simulating a broken disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DurableStore for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get(key))
    }

    async fn store(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(StorageError::WriteRejected(key.to_string()));
        }
        inner.blobs.insert(key.to_string(), value.to_vec());
        inner.writes += 1;
        Ok(())
    }
}
