//! Request/response access to a running [`crate::PrefixManager`].
//!
//! Every call enqueues a request for the manager loop and returns a
//! [`Reply`] that resolves once the loop has applied it, including any
//! persistent snapshot write. Calls made from one task are applied in call
//! order, interleaved with the command queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, watch};

use prefixd_core::{PerfEvents, PrefixEntry, PrefixType};

use crate::command::{PrefixCommand, PrefixUpdateRequest};
use crate::error::ManagerError;

pub(crate) type ReplyTx<T> = oneshot::Sender<Result<T, ManagerError>>;

/// A request for the manager loop, carrying its single-use reply channel.
pub(crate) enum Request {
    Command {
        command: PrefixCommand,
        perf_events: Option<PerfEvents>,
        reply: ReplyTx<bool>,
    },
    GetAll {
        reply: ReplyTx<Vec<PrefixEntry>>,
    },
    GetByType {
        prefix_type: PrefixType,
        reply: ReplyTx<Vec<PrefixEntry>>,
    },
}

impl Request {
    /// Resolve the request with [`ManagerError::Stopped`].
    pub(crate) fn fail_stopped(self) {
        match self {
            Request::Command { reply, .. } => {
                let _ = reply.send(Err(ManagerError::Stopped));
            }
            Request::GetAll { reply } | Request::GetByType { reply, .. } => {
                let _ = reply.send(Err(ManagerError::Stopped));
            }
        }
    }
}

/// Deferred result of a manager call.
///
/// Resolves to [`ManagerError::Stopped`] if the manager exits first.
#[must_use = "a Reply does nothing unless awaited"]
#[derive(Debug)]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T, ManagerError>>,
}

impl<T> Reply<T> {
    fn pending() -> (ReplyTx<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    fn ready(result: Result<T, ManagerError>) -> Self {
        let (tx, reply) = Self::pending();
        let _ = tx.send(result);
        reply
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, ManagerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(ManagerError::Stopped)))
    }
}

/// Cloneable handle for the synchronous API.
#[derive(Clone)]
pub struct PrefixManagerHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl PrefixManagerHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Request>) -> Self {
        Self { tx }
    }

    /// Insert or replace entries. Resolves to whether the table changed.
    pub fn advertise(&self, entries: Vec<PrefixEntry>) -> Reply<bool> {
        self.command(PrefixCommand::Advertise(entries), None)
    }

    /// Remove entries, all or nothing. Resolves to `false` if any entry
    /// names a member that does not exist.
    pub fn withdraw(&self, entries: Vec<PrefixEntry>) -> Reply<bool> {
        self.command(PrefixCommand::Withdraw(entries), None)
    }

    pub fn withdraw_by_type(&self, prefix_type: PrefixType) -> Reply<bool> {
        self.command(PrefixCommand::WithdrawByType(prefix_type), None)
    }

    pub fn sync_by_type(&self, prefix_type: PrefixType, entries: Vec<PrefixEntry>) -> Reply<bool> {
        self.command(PrefixCommand::SyncByType(prefix_type, entries), None)
    }

    /// Submit a queue-style request and wait for its result.
    pub fn submit(&self, request: PrefixUpdateRequest) -> Reply<bool> {
        match request.into_command() {
            Ok((command, perf_events)) => self.command(command, perf_events),
            Err(e) => Reply::ready(Err(e.into())),
        }
    }

    /// Current winners, one per prefix.
    pub fn get_all(&self) -> Reply<Vec<PrefixEntry>> {
        let (reply, rx) = Reply::pending();
        let _ = self.tx.send(Request::GetAll { reply });
        rx
    }

    /// Current winners whose client type is `prefix_type`.
    pub fn get_by_type(&self, prefix_type: PrefixType) -> Reply<Vec<PrefixEntry>> {
        let (reply, rx) = Reply::pending();
        let _ = self.tx.send(Request::GetByType { prefix_type, reply });
        rx
    }

    /// Whether the manager has stopped accepting requests.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn command(&self, command: PrefixCommand, perf_events: Option<PerfEvents>) -> Reply<bool> {
        let (reply, rx) = Reply::pending();
        // on failure the request and its reply sender are dropped, which
        // resolves the Reply with Stopped
        let _ = self.tx.send(Request::Command {
            command,
            perf_events,
            reply,
        });
        rx
    }
}

/// Signals a running manager loop to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub(crate) fn new(tx: Arc<watch::Sender<bool>>) -> Self {
        Self { tx }
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}
