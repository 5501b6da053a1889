//! Per-key version bookkeeping for published prefixes.
//!
//! [`PublishedKeys`] mirrors what this node last wrote under each of its
//! keys. It turns "the winner for P is now X" into a versioned
//! [`Publication`], recognises our own writes echoed back by the KV store,
//! and detects foreign or stale values that must be overwritten.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use prefixd_core::{IpPrefix, KeyScope, PerfEvents, PrefixDatabase, PrefixEntry, PrefixKey};

use super::constants::TTL_REFRESH_DIVISOR;

/// What a fresh read or a notification says is stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub version: u64,
    /// `None` if the stored bytes did not decode.
    pub db: Option<PrefixDatabase>,
}

impl Observed {
    pub fn new(version: u64, db: Option<PrefixDatabase>) -> Self {
        Self { version, db }
    }

    /// Whether the stored value is a delete marker.
    pub fn is_withdrawn(&self) -> bool {
        self.db.as_ref().is_some_and(|db| db.delete_prefix)
    }

    fn matches(&self, version: u64, db: &PrefixDatabase) -> bool {
        self.version == version && self.db.as_ref().is_some_and(|d| d.same_content(db))
    }
}

/// A value to write into the KV store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub key: PrefixKey,
    pub version: u64,
    pub ttl_version: u64,
    pub db: PrefixDatabase,
}

impl Publication {
    pub fn prefix(&self) -> IpPrefix {
        self.key.prefix()
    }

    pub fn is_withdrawal(&self) -> bool {
        self.db.delete_prefix
    }
}

/// Last value this node wrote for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    Advertised {
        version: u64,
        ttl_version: u64,
        db: PrefixDatabase,
        refresh_at: Instant,
    },
    /// Delete marker written; the KV store drops it at `expires_at`.
    Withdrawn { version: u64, expires_at: Instant },
}

impl KeyState {
    pub fn version(&self) -> u64 {
        match self {
            KeyState::Advertised { version, .. } | KeyState::Withdrawn { version, .. } => *version,
        }
    }

    pub fn is_withdrawn(&self) -> bool {
        matches!(self, KeyState::Withdrawn { .. })
    }
}

/// Outcome of comparing a subscription notification with local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalUpdate {
    /// Our own write, or an older value the store will not keep.
    Consistent,
    /// The key holds something other than our value; overwrite it now.
    Republish(Publication),
    /// A live key under our name that we do not track; re-derive it from the
    /// table on the next flush.
    Reconcile,
    /// The key holds a foreign value at `u64::MAX`. No higher version
    /// exists, so it cannot be superseded and is left alone.
    Exhausted,
}

/// Version and TTL state of every key this node has published.
#[derive(Debug, Clone)]
pub struct PublishedKeys {
    scope: KeyScope,
    ttl: Duration,
    refresh_interval: Duration,
    keys: BTreeMap<IpPrefix, KeyState>,
}

impl PublishedKeys {
    pub fn new(scope: KeyScope, ttl: Duration) -> Self {
        Self {
            scope,
            ttl,
            refresh_interval: ttl / TTL_REFRESH_DIVISOR,
            keys: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn key(&self, prefix: IpPrefix) -> PrefixKey {
        self.scope.key(prefix)
    }

    /// Decide what, if anything, to write for `prefix`.
    ///
    /// `desired` is the table's current winner, `observed` a fresh read of
    /// the key. The new version is one above the highest version known from
    /// either side. Returns `None` when the store already holds what we want.
    pub fn plan(
        &self,
        prefix: IpPrefix,
        desired: Option<&PrefixEntry>,
        observed: Option<&Observed>,
        trace: Option<PerfEvents>,
    ) -> Option<Publication> {
        let local = self.keys.get(&prefix);
        let local_version = local.map_or(0, KeyState::version);
        let observed_version = observed.map_or(0, |o| o.version);

        let db = match desired {
            Some(entry) => {
                let db = PrefixDatabase::advertisement(
                    self.scope.node(),
                    self.scope.area(),
                    entry.clone(),
                );
                if let Some(KeyState::Advertised {
                    version,
                    db: current,
                    ..
                }) = local
                    && current.same_content(&db)
                    && observed.is_some_and(|o| o.matches(*version, current))
                {
                    return None;
                }
                db
            }
            None => {
                let local_live = matches!(local, Some(KeyState::Advertised { .. }));
                let observed_live = observed.is_some_and(|o| !o.is_withdrawn());
                if !local_live && !observed_live {
                    return None;
                }
                PrefixDatabase::withdrawal(self.scope.node(), self.scope.area())
            }
        };

        let Some(version) = local_version.max(observed_version).checked_add(1) else {
            tracing::error!(
                key = %self.key(prefix),
                version = observed_version,
                "key is at the maximum version and cannot be superseded"
            );
            return None;
        };

        Some(Publication {
            key: self.key(prefix),
            version,
            ttl_version: 0,
            db: db.with_perf_events(trace),
        })
    }

    /// Record a publication the KV store accepted.
    pub fn commit(&mut self, publication: &Publication, now: Instant) {
        let state = if publication.is_withdrawal() {
            KeyState::Withdrawn {
                version: publication.version,
                expires_at: now + self.ttl,
            }
        } else {
            KeyState::Advertised {
                version: publication.version,
                ttl_version: publication.ttl_version,
                db: publication.db.clone(),
                refresh_at: now + self.refresh_interval,
            }
        };
        self.keys.insert(publication.prefix(), state);
    }

    /// Compare a notification for one of our keys with what we last wrote.
    pub fn on_external_update(&self, prefix: IpPrefix, observed: &Observed) -> ExternalUpdate {
        match self.keys.get(&prefix) {
            None if observed.is_withdrawn() => ExternalUpdate::Consistent,
            None if observed.version == u64::MAX => ExternalUpdate::Exhausted,
            None => ExternalUpdate::Reconcile,
            Some(KeyState::Advertised { version, db, .. }) => {
                if observed.version < *version || observed.matches(*version, db) {
                    return ExternalUpdate::Consistent;
                }
                let Some(next) = observed.version.checked_add(1) else {
                    return ExternalUpdate::Exhausted;
                };
                ExternalUpdate::Republish(Publication {
                    key: self.key(prefix),
                    version: next,
                    ttl_version: 0,
                    db: db.clone(),
                })
            }
            Some(KeyState::Withdrawn { version, .. }) => {
                if observed.version < *version || observed.is_withdrawn() {
                    return ExternalUpdate::Consistent;
                }
                let Some(next) = observed.version.checked_add(1) else {
                    return ExternalUpdate::Exhausted;
                };
                ExternalUpdate::Republish(Publication {
                    key: self.key(prefix),
                    version: next,
                    ttl_version: 0,
                    db: PrefixDatabase::withdrawal(self.scope.node(), self.scope.area()),
                })
            }
        }
    }

    /// TTL refreshes due at `now`: same version and value, next `ttl_version`.
    ///
    /// Delete markers are never refreshed so the store expires them.
    pub fn refresh_due(&self, now: Instant) -> Vec<Publication> {
        self.keys
            .iter()
            .filter_map(|(prefix, state)| match state {
                KeyState::Advertised {
                    version,
                    ttl_version,
                    db,
                    refresh_at,
                } if *refresh_at <= now => Some(Publication {
                    key: self.key(*prefix),
                    version: *version,
                    ttl_version: ttl_version.saturating_add(1),
                    db: db.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Forget delete markers whose TTL has elapsed. Returns how many.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.keys.len();
        self.keys.retain(|_, state| match state {
            KeyState::Withdrawn { expires_at, .. } => *expires_at > now,
            KeyState::Advertised { .. } => true,
        });
        before - self.keys.len()
    }

    #[must_use]
    pub fn state(&self, prefix: &IpPrefix) -> Option<&KeyState> {
        self.keys.get(prefix)
    }

    #[must_use]
    pub fn version(&self, prefix: &IpPrefix) -> Option<u64> {
        self.keys.get(prefix).map(KeyState::version)
    }

    pub fn tracked_prefixes(&self) -> Vec<IpPrefix> {
        self.keys.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
