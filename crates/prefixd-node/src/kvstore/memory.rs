//! In-process KV store with the same merge and TTL rules as the real one.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::time::Instant;

use super::{KvStore, KvStoreError, KvUpdate, KvValue};

/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Stored {
    value: KvValue,
    /// `None` when the TTL is too large to represent.
    expires_at: Option<Instant>,
}

impl Stored {
    fn new(value: KvValue, now: Instant) -> Self {
        let expires_at = now.checked_add(value.ttl);
        Self { value, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    keys: HashMap<String, Stored>,
    fail_sets: bool,
}

impl Inner {
    fn purge_expired(&mut self, now: Instant) {
        self.keys.retain(|_, stored| !stored.is_expired(now));
    }
}

/// What to do with an offered value, given the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merge {
    Replace,
    RefreshTtl,
    Reject,
}

fn merge(current: &KvValue, offered: &KvValue) -> Merge {
    let order = offered
        .version
        .cmp(&current.version)
        .then_with(|| offered.originator_id.cmp(&current.originator_id))
        .then_with(|| offered.value.cmp(&current.value));
    match order {
        Ordering::Greater => Merge::Replace,
        Ordering::Less => Merge::Reject,
        Ordering::Equal if offered.ttl_version > current.ttl_version => Merge::RefreshTtl,
        Ordering::Equal => Merge::Reject,
    }
}

/// Shared in-memory KV store. Clones see the same keys.
#[derive(Debug, Clone)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<Inner>>,
    updates: broadcast::Sender<KvUpdate>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NOTIFY_CAPACITY)
    }

    /// Store whose subscribers lag after `capacity` unread notifications.
    pub fn with_capacity(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            updates,
        }
    }

    /// Make subsequent `set` calls fail, simulating an unreachable store.
    pub fn set_fail_sets(&self, fail: bool) {
        self.lock().fail_sets = fail;
    }

    /// All live keys starting with `prefix`, sorted by key.
    pub fn dump_with_prefix(&self, prefix: &str) -> Vec<(String, KvValue)> {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.purge_expired(now);
        let mut out: Vec<_> = inner
            .keys
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, s)| (k.clone(), s.value.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.purge_expired(now);
        inner.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_live(&self, key: &str) -> Option<KvValue> {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.keys.get(key).is_some_and(|s| s.is_expired(now)) {
            inner.keys.remove(key);
            return None;
        }
        inner.keys.get(key).map(|s| s.value.clone())
    }

    fn offer(&self, key: &str, value: KvValue) -> Result<bool, KvStoreError> {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.fail_sets {
            return Err(KvStoreError::Unavailable("writes disabled".into()));
        }

        let decision = match inner.keys.get(key) {
            Some(stored) if !stored.is_expired(now) => merge(&stored.value, &value),
            _ => Merge::Replace,
        };

        match decision {
            Merge::Replace => {
                inner
                    .keys
                    .insert(key.to_string(), Stored::new(value.clone(), now));
                drop(inner);
                tracing::trace!(key, version = value.version, "kv store accepted value");
                // no subscribers is fine
                let _ = self.updates.send(KvUpdate {
                    key: key.to_string(),
                    value,
                });
                Ok(true)
            }
            Merge::RefreshTtl => {
                if let Some(stored) = inner.keys.get_mut(key) {
                    stored.value.ttl = value.ttl;
                    stored.value.ttl_version = value.ttl_version;
                    stored.expires_at = now.checked_add(value.ttl);
                }
                Ok(true)
            }
            Merge::Reject => Ok(false),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvStoreError> {
        Ok(self.get_live(key))
    }

    async fn set(&self, key: &str, value: KvValue) -> Result<bool, KvStoreError> {
        self.offer(key, value)
    }

    fn subscribe(&self) -> broadcast::Receiver<KvUpdate> {
        self.updates.subscribe()
    }
}
