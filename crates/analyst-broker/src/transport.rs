//! Parked responses.
//!
//! A long-poll request is split into two halves when it has to wait:
//! - [`ParkedResponse`] is stored by the broker and resumed when matching
//!   work (or a result) exists.
//! - [`Suspended`] stays with the request handler, which awaits it with a
//!   timeout.
//!
//! Resuming never blocks: it is a one-shot channel send, so the broker may do
//! it while holding its lock. When the handler goes away first (timeout or
//! peer disconnect) the handler reacquires the broker lock, removes its
//! registration, and then drains anything that was resolved into it in the
//! meantime with [`Suspended::try_take`].

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use tokio::sync::oneshot;
use uuid::Uuid;

use analyst_broker_core::Task;

/// Identity of a parked response, used for idempotent removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker side of a suspended response.
#[derive(Debug)]
pub struct ParkedResponse<T> {
    id: HandleId,
    tx: oneshot::Sender<T>,
}

/// A parked worker poll; resumed with the tasks it should run.
pub type WorkerConnection = ParkedResponse<Vec<Task>>;

/// A parked single-point producer; resumed with the worker's result body.
pub type ProducerConnection = ParkedResponse<Bytes>;

impl<T> ParkedResponse<T> {
    /// Suspend a response, returning the resumable handle and the waiting side.
    pub fn suspend() -> (Self, Suspended<T>) {
        let id = HandleId(Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        (Self { id, tx }, Suspended { id, rx })
    }

    /// Identity shared with the matching [`Suspended`].
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Resume the response with `value`.
    ///
    /// Hands `value` back if the waiting side has already gone away.
    pub fn resume(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }
}

/// Handler side of a suspended response.
#[derive(Debug)]
pub struct Suspended<T> {
    id: HandleId,
    rx: oneshot::Receiver<T>,
}

impl<T> Suspended<T> {
    /// Identity shared with the matching [`ParkedResponse`].
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Wait up to `timeout` for the response to be resumed.
    ///
    /// Returns `None` on timeout or if the broker dropped the handle without
    /// resuming it. Must not be called again after it returned `Some`.
    pub async fn wait(&mut self, timeout: Duration) -> Option<T> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Take a value that was resumed into this response without waiting.
    pub fn try_take(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
