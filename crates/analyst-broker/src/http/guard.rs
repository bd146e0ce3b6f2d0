//! Close guards for suspended requests.
//!
//! When a client disconnects, axum drops the handler future. The guard's
//! `Drop` is the close notification: it reacquires the broker lock and
//! removes whatever the request left behind.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

use analyst_broker_core::{Task, TaskId, WorkerCategory};

use crate::broker::PollKind;
use crate::state::AppState;
use crate::transport::Suspended;

/// A parked worker poll.
pub struct PollGuard {
    state: Arc<AppState>,
    kind: PollKind,
    category: WorkerCategory,
    suspended: Suspended<Vec<Task>>,
    armed: bool,
}

impl PollGuard {
    pub fn new(
        state: Arc<AppState>,
        kind: PollKind,
        category: WorkerCategory,
        suspended: Suspended<Vec<Task>>,
    ) -> Self {
        Self {
            state,
            kind,
            category,
            suspended,
            armed: true,
        }
    }

    /// Wait for work. On timeout the poll is unregistered; `None` means the
    /// worker should poll again.
    pub async fn wait(&mut self, timeout: Duration) -> Option<Vec<Task>> {
        let delivered = match self.suspended.wait(timeout).await {
            Some(tasks) => Some(tasks),
            None => self
                .state
                .broker
                .release_worker_poll(self.kind, &self.category, &mut self.suspended),
        };
        self.armed = false;
        delivered
    }
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .broker
                .abandon_worker_poll(self.kind, &self.category, &mut self.suspended);
        }
    }
}

/// A parked single-point requester.
pub struct ProducerGuard {
    state: Arc<AppState>,
    task_id: TaskId,
    suspended: Suspended<Bytes>,
    armed: bool,
}

impl ProducerGuard {
    pub fn new(state: Arc<AppState>, task_id: TaskId, suspended: Suspended<Bytes>) -> Self {
        Self {
            state,
            task_id,
            suspended,
            armed: true,
        }
    }

    /// Wait for the worker's result. On timeout the task is forgotten.
    pub async fn wait(&mut self, timeout: Duration) -> Option<Bytes> {
        let result = match self.suspended.wait(timeout).await {
            Some(result) => Some(result),
            None => self
                .state
                .broker
                .release_priority(self.task_id, &mut self.suspended),
        };
        self.armed = false;
        result
    }
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        if self.armed {
            self.state.broker.cancel_priority(self.task_id);
        }
    }
}
