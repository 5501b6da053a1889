//! Shared harness for manager integration tests.
//!
//! All tests run with `start_paused = true`, so `settle()` advances the
//! clock past the throttle cap without wall-clock delay.

#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use prefixd_core::{PrefixDatabase, PrefixEntry, PrefixType, codec};
use prefixd_node::{
    KvStore, KvValue, ManagerConfig, MemoryKvStore, MemoryStorage, PrefixManager,
    PrefixManagerHandle, PrefixUpdateRequest, ShutdownHandle,
};

pub const NODE: &str = "node-1";
pub const AREA: &str = "0";
pub const THROTTLE: Duration = Duration::from_millis(100);
pub const MAX_THROTTLE: Duration = Duration::from_millis(400);
pub const KEY_TTL: Duration = Duration::from_secs(10);

pub type Manager = PrefixManager<MemoryKvStore, MemoryStorage>;

pub fn config() -> ManagerConfig {
    ManagerConfig::new(NODE, AREA)
        .with_throttle(THROTTLE, MAX_THROTTLE)
        .with_key_ttl(KEY_TTL)
        .with_perf_measurement(false)
}

pub fn entry(prefix: &str, prefix_type: PrefixType) -> PrefixEntry {
    PrefixEntry::new(prefix.parse().unwrap(), prefix_type)
}

pub fn key(prefix: &str) -> String {
    format!("prefix:{NODE}:{AREA}:[{prefix}]")
}

/// Sleep past the throttle cap so any pending flush has run.
pub async fn settle() {
    tokio::time::sleep(MAX_THROTTLE + Duration::from_millis(10)).await;
}

/// Let the manager drain notifications without crossing a throttle window.
pub async fn yield_to_manager() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn read(kv: &MemoryKvStore, prefix: &str) -> Option<(KvValue, PrefixDatabase)> {
    let value = kv.get(&key(prefix)).await.unwrap()?;
    let db = codec::decode_prefix_db(&value.value).unwrap();
    Some((value, db))
}

pub struct Harness {
    pub kv: MemoryKvStore,
    pub storage: MemoryStorage,
    pub handle: PrefixManagerHandle,
    pub queue: mpsc::Sender<PrefixUpdateRequest>,
    pub shutdown: ShutdownHandle,
    task: JoinHandle<Manager>,
}

impl Harness {
    pub async fn start(config: ManagerConfig) -> Self {
        Self::start_with(config, MemoryKvStore::new(), MemoryStorage::new()).await
    }

    pub async fn start_with(
        config: ManagerConfig,
        kv: MemoryKvStore,
        storage: MemoryStorage,
    ) -> Self {
        prefixd_node::logging::init_for_tests();
        let mut manager = PrefixManager::new(config, kv.clone(), storage.clone()).unwrap();
        manager.start().await.unwrap();
        let handle = manager.handle();
        let queue = manager.queue();
        let shutdown = manager.shutdown_handle();
        let task = manager.spawn();
        Self {
            kv,
            storage,
            handle,
            queue,
            shutdown,
            task,
        }
    }

    /// Stop the loop and return the stopped manager.
    pub async fn stop(self) -> Manager {
        self.shutdown.shutdown();
        self.task.await.unwrap()
    }
}
