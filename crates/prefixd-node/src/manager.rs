//! The prefix manager event loop.
//!
//! A single task owns the prefix table, the publication tracker and the
//! persistence gate. Direct requests, the command queue, KV store
//! notifications and timers are all serialized through one `select!` loop,
//! so no table state is ever shared between tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use prefixd_core::codec;
use prefixd_core::constants::{EVENT_PREFIX_DB_UPDATED, EVENT_UPDATE_KVSTORE_THROTTLED};
use prefixd_core::{IpPrefix, PerfEvents};
use prefixd_table::{
    ChangeSet, ExternalUpdate, Observed, PrefixTable, Publication, PublishedKeys, Throttle,
};

use crate::command::{PrefixCommand, PrefixUpdateRequest};
use crate::config::ManagerConfig;
use crate::error::{ManagerError, NodeError, PublishError};
use crate::handle::{PrefixManagerHandle, Request, ShutdownHandle};
use crate::kvstore::{KvStore, KvUpdate, KvValue};
use crate::persistence::PersistenceGate;
use crate::storage::DurableStore;

pub struct PrefixManager<K, S> {
    config: ManagerConfig,
    kv: K,
    gate: PersistenceGate<S>,
    table: PrefixTable,
    published: PublishedKeys,
    throttle: Throttle,
    /// Prefixes whose KV key may not reflect the table yet.
    dirty: BTreeSet<IpPrefix>,
    /// Latest trace per dirty prefix, attached to its next publication.
    traces: BTreeMap<IpPrefix, PerfEvents>,

    requests_tx: mpsc::UnboundedSender<Request>,
    requests_rx: mpsc::UnboundedReceiver<Request>,
    queue_tx: mpsc::Sender<PrefixUpdateRequest>,
    queue_rx: mpsc::Receiver<PrefixUpdateRequest>,
    kv_updates: broadcast::Receiver<KvUpdate>,
    kv_closed: bool,

    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    started: bool,
}

impl<K: KvStore, S: DurableStore> PrefixManager<K, S> {
    /// Create a manager. Nothing is read or published until [`start`].
    ///
    /// [`start`]: Self::start
    pub fn new(config: ManagerConfig, kv: K, store: S) -> Result<Self, NodeError> {
        config.validate()?;
        let scope = config.key_scope()?;
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // subscribe before anything is published so no echo is missed
        let kv_updates = kv.subscribe();

        Ok(Self {
            published: PublishedKeys::new(scope, config.key_ttl),
            throttle: Throttle::new(config.throttle, config.max_throttle),
            config,
            kv,
            gate: PersistenceGate::new(store),
            table: PrefixTable::new(),
            dirty: BTreeSet::new(),
            traces: BTreeMap::new(),
            requests_tx,
            requests_rx,
            queue_tx,
            queue_rx,
            kv_updates,
            kv_closed: false,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            started: false,
        })
    }

    /// Handle for the request/response API.
    pub fn handle(&self) -> PrefixManagerHandle {
        PrefixManagerHandle::new(self.requests_tx.clone())
    }

    /// Sender side of the ordered command queue.
    pub fn queue(&self) -> mpsc::Sender<PrefixUpdateRequest> {
        self.queue_tx.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.shutdown_tx))
    }

    /// Signal the loop to stop.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn table(&self) -> &PrefixTable {
        &self.table
    }

    pub fn published(&self) -> &PublishedKeys {
        &self.published
    }

    /// Persistent snapshot writes since creation.
    pub fn persistence_writes(&self) -> u64 {
        self.gate.writes()
    }

    /// Restore the persistent snapshot, seed configured prefixes and arm the
    /// startup hold.
    ///
    /// A snapshot that exists but cannot be read is fatal: starting empty
    /// would overwrite it on the next persistent change.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyRunning);
        }
        let restored = match self.gate.restore().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("failed to restore persistent prefixes: {e}");
                return Err(e.into());
            }
        };
        let restored_count = restored.len();
        let originated = self.config.originated.clone();
        let originated_count = originated.len();

        let mut changes = self.table.advertise(restored);
        changes.merge(self.table.advertise(originated));

        let now = Instant::now().into_std();
        self.throttle = Throttle::new(self.config.throttle, self.config.max_throttle)
            .with_hold(now, self.config.hold_time);
        if !changes.is_empty() {
            self.mark_dirty(&changes, None);
        }
        self.started = true;

        tracing::info!(
            node = %self.config.node_name,
            area = %self.config.area,
            restored = restored_count,
            originated = originated_count,
            hold_ms = self.config.hold_time.as_millis() as u64,
            "prefix manager started"
        );
        Ok(())
    }

    /// Run the event loop until shutdown is signalled, then drain.
    pub async fn run(&mut self) {
        let mut refresh = tokio::time::interval(self.published.refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Don't fire immediately
        refresh.tick().await;

        tracing::debug!("entering event loop");

        loop {
            let flush_at = self.throttle.deadline().map(Instant::from_std);

            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                // a due flush wins over pending input
                _ = wait_until(flush_at) => {
                    self.flush().await;
                }

                Some(request) = self.requests_rx.recv() => {
                    self.handle_request(request).await;
                }

                Some(request) = self.queue_rx.recv() => {
                    self.handle_queued(request).await;
                }

                result = self.kv_updates.recv(), if !self.kv_closed => {
                    self.handle_kv_update(result).await;
                }

                _ = refresh.tick() => {
                    self.refresh().await;
                }
            }
        }

        self.stop().await;
    }

    /// Run on a new task, returning the manager once it has stopped.
    pub fn spawn(mut self) -> tokio::task::JoinHandle<Self> {
        tokio::spawn(async move {
            self.run().await;
            self
        })
    }

    async fn stop(&mut self) {
        // commands already accepted into the queue are applied so that
        // persistent ones survive the restart
        self.queue_rx.close();
        let mut drained = 0usize;
        while let Ok(request) = self.queue_rx.try_recv() {
            self.handle_queued(request).await;
            drained += 1;
        }

        self.requests_rx.close();
        let mut failed = 0usize;
        while let Ok(request) = self.requests_rx.try_recv() {
            request.fail_stopped();
            failed += 1;
        }

        self.throttle.cancel();
        tracing::info!(
            drained,
            failed,
            unpublished = self.dirty.len(),
            "prefix manager stopped"
        );
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Command {
                command,
                perf_events,
                reply,
            } => {
                let result = self.apply(command, perf_events).await;
                let _ = reply.send(result);
            }
            Request::GetAll { reply } => {
                let _ = reply.send(Ok(self.table.winners()));
            }
            Request::GetByType { prefix_type, reply } => {
                let _ = reply.send(Ok(self.table.winners_by_type(prefix_type)));
            }
        }
    }

    async fn handle_queued(&mut self, request: PrefixUpdateRequest) {
        let cmd = request.cmd;
        match request.into_command() {
            Ok((command, perf_events)) => {
                if let Err(e) = self.apply(command, perf_events).await {
                    tracing::warn!(cmd = %cmd, "queued command failed: {e}");
                }
            }
            Err(e) => {
                tracing::warn!(cmd = %cmd, "dropping malformed queued command: {e}");
            }
        }
    }

    /// Apply one command to the table, then persist if it touched
    /// persistent entries.
    ///
    /// On a storage failure the in-memory change stays applied and will be
    /// published; only the durable copy is behind.
    async fn apply(
        &mut self,
        command: PrefixCommand,
        perf_events: Option<PerfEvents>,
    ) -> Result<bool, ManagerError> {
        let name = command.name();
        let changes = match command {
            PrefixCommand::Advertise(entries) => self.table.advertise(entries),
            PrefixCommand::Withdraw(entries) => match self.table.withdraw(&entries) {
                Ok(changes) => changes,
                Err(e) => {
                    tracing::debug!(command = name, "withdraw rejected: {e}");
                    return Ok(false);
                }
            },
            PrefixCommand::WithdrawByType(prefix_type) => self.table.withdraw_by_type(prefix_type),
            PrefixCommand::SyncByType(prefix_type, entries) => {
                self.table.sync_by_type(prefix_type, entries)
            }
        };

        if changes.is_empty() {
            tracing::debug!(command = name, "no table change");
            return Ok(false);
        }
        tracing::debug!(
            command = name,
            prefixes = changes.len(),
            persistent = changes.touches_persistent(),
            "table updated"
        );

        self.mark_dirty(&changes, perf_events);

        if let Err(e) = self.gate.commit(&changes, &self.table).await {
            tracing::warn!(command = name, "failed to persist prefixes: {e}");
            return Err(e.into());
        }
        Ok(true)
    }

    fn mark_dirty(&mut self, changes: &ChangeSet, perf_events: Option<PerfEvents>) {
        let trace = self.stamp(perf_events, EVENT_PREFIX_DB_UPDATED);
        for prefix in changes.prefixes() {
            self.dirty.insert(prefix);
            if let Some(trace) = &trace {
                self.traces.insert(prefix, trace.clone());
            }
        }
        self.throttle.mark_dirty(Instant::now().into_std());
    }

    /// Append a perf event when measurement is enabled.
    fn stamp(&self, perf_events: Option<PerfEvents>, descr: &str) -> Option<PerfEvents> {
        if !self.config.enable_perf_measurement {
            return None;
        }
        let mut trace = perf_events.unwrap_or_default();
        trace.push(&self.config.node_name, descr);
        Some(trace)
    }

    /// Publish every dirty prefix. Failures stay dirty and are retried
    /// after one throttle window.
    async fn flush(&mut self) {
        self.throttle.fired();
        let dirty = std::mem::take(&mut self.dirty);
        let mut published = 0usize;
        let mut failed = 0usize;

        for prefix in dirty {
            let trace = self
                .traces
                .remove(&prefix)
                .and_then(|t| self.stamp(Some(t), EVENT_UPDATE_KVSTORE_THROTTLED));
            match self.flush_prefix(prefix, trace).await {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(prefix = %prefix, "publication failed: {e}");
                    self.dirty.insert(prefix);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            self.throttle.retry(Instant::now().into_std());
        }
        tracing::debug!(published, failed, "flushed dirty prefixes");
    }

    async fn flush_prefix(
        &mut self,
        prefix: IpPrefix,
        trace: Option<PerfEvents>,
    ) -> Result<bool, PublishError> {
        let key = self.published.key(prefix).to_string();
        let observed = self.kv.get(&key).await?.map(|value| decode_observed(&value));
        let Some(publication) =
            self.published
                .plan(prefix, self.table.winner(&prefix), observed.as_ref(), trace)
        else {
            tracing::trace!(prefix = %prefix, "kv store already current");
            return Ok(false);
        };
        self.publish(&publication).await?;
        Ok(true)
    }

    async fn publish(&mut self, publication: &Publication) -> Result<(), PublishError> {
        let key = publication.key.to_string();
        let value = KvValue {
            version: publication.version,
            originator_id: self.config.node_name.clone(),
            value: codec::encode_prefix_db(&publication.db)?,
            ttl: self.published.ttl(),
            ttl_version: publication.ttl_version,
        };
        if !self.kv.set(&key, value).await? {
            return Err(PublishError::Rejected {
                key,
                version: publication.version,
            });
        }
        self.published.commit(publication, Instant::now().into_std());
        tracing::debug!(
            key = %key,
            version = publication.version,
            ttl_version = publication.ttl_version,
            withdrawn = publication.is_withdrawal(),
            "published"
        );
        Ok(())
    }

    async fn handle_kv_update(&mut self, result: Result<KvUpdate, RecvError>) {
        match result {
            Ok(update) => self.on_kv_update(update).await,
            Err(RecvError::Lagged(missed)) => {
                // notifications were lost; re-read every key we track
                let tracked = self.published.tracked_prefixes();
                tracing::warn!(
                    missed,
                    tracked = tracked.len(),
                    "kv subscription lagged, re-verifying keys"
                );
                self.dirty.extend(tracked);
                self.throttle.mark_dirty(Instant::now().into_std());
            }
            Err(RecvError::Closed) => {
                tracing::warn!("kv subscription closed");
                self.kv_closed = true;
            }
        }
    }

    async fn on_kv_update(&mut self, update: KvUpdate) {
        let Some(prefix) = self.published.scope().owned_prefix(&update.key) else {
            return;
        };
        let observed = decode_observed(&update.value);
        match self.published.on_external_update(prefix, &observed) {
            ExternalUpdate::Consistent => {
                tracing::trace!(
                    key = %update.key,
                    version = observed.version,
                    "kv update consistent"
                );
            }
            ExternalUpdate::Republish(publication) => {
                tracing::warn!(
                    key = %update.key,
                    observed = observed.version,
                    originator = %update.value.originator_id,
                    republish = publication.version,
                    "conflicting value for own key"
                );
                if let Err(e) = self.publish(&publication).await {
                    tracing::warn!(key = %update.key, "republish failed: {e}");
                    self.dirty.insert(prefix);
                    self.throttle.retry(Instant::now().into_std());
                }
            }
            ExternalUpdate::Reconcile => {
                tracing::info!(
                    key = %update.key,
                    version = observed.version,
                    "untracked own key, reconciling"
                );
                self.dirty.insert(prefix);
                self.throttle.mark_dirty(Instant::now().into_std());
            }
            ExternalUpdate::Exhausted => {
                tracing::error!(
                    key = %update.key,
                    observed = observed.version,
                    originator = %update.value.originator_id,
                    "own key is at the maximum version, leaving it alone"
                );
            }
        }
    }

    async fn refresh(&mut self) {
        let now = Instant::now().into_std();
        let pruned = self.published.prune(now);
        if pruned > 0 {
            tracing::debug!(pruned, "forgot expired delete markers");
        }
        for publication in self.published.refresh_due(now) {
            if let Err(e) = self.publish(&publication).await {
                tracing::warn!(key = %publication.key, "ttl refresh failed: {e}");
                self.dirty.insert(publication.prefix());
                self.throttle.retry(now);
            }
        }
    }
}

/// Decode a stored value. An undecodable value counts as live so that it
/// gets overwritten.
fn decode_observed(value: &KvValue) -> Observed {
    Observed::new(value.version, codec::decode_prefix_db(&value.value).ok())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
