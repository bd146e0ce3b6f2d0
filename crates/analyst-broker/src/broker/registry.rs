//! Parked worker connections, pooled per category.

use std::collections::{HashMap, VecDeque};

use analyst_broker_core::WorkerCategory;

use crate::transport::{HandleId, WorkerConnection};

/// Which kind of work a parked worker is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    /// Regional batch tasks.
    Regional,
    /// Single-point priority tasks.
    Priority,
}

impl PollKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regional => "regional",
            Self::Priority => "single",
        }
    }
}

/// FIFO of parked connections for each category.
#[derive(Debug, Default)]
struct Pool {
    waiting: HashMap<WorkerCategory, VecDeque<WorkerConnection>>,
}

impl Pool {
    fn push(&mut self, category: WorkerCategory, handle: WorkerConnection) {
        self.waiting.entry(category).or_default().push_back(handle);
    }

    fn pop(&mut self, category: &WorkerCategory) -> Option<WorkerConnection> {
        let queue = self.waiting.get_mut(category)?;
        let handle = queue.pop_front();
        if queue.is_empty() {
            self.waiting.remove(category);
        }
        handle
    }

    fn remove(&mut self, category: &WorkerCategory, id: HandleId) -> bool {
        let Some(queue) = self.waiting.get_mut(category) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|h| h.id() != id);
        let removed = queue.len() != before;
        if queue.is_empty() {
            self.waiting.remove(category);
        }
        removed
    }

    fn len(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }
}

/// Worker connections waiting for work, one pool per [`PollKind`].
///
/// This never looks at tasks or jobs; the queue manager decides what to do
/// with a connection once it has taken one.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    regional: Pool,
    priority: Pool,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&mut self, kind: PollKind) -> &mut Pool {
        match kind {
            PollKind::Regional => &mut self.regional,
            PollKind::Priority => &mut self.priority,
        }
    }

    /// Park a worker polling for regional tasks.
    pub fn register_worker_poll(&mut self, category: WorkerCategory, handle: WorkerConnection) {
        self.regional.push(category, handle);
    }

    /// Park a worker polling for single-point tasks.
    pub fn register_priority_wait(&mut self, category: WorkerCategory, handle: WorkerConnection) {
        self.priority.push(category, handle);
    }

    /// Take the longest-waiting regional poller for `category`.
    pub fn take_worker_poll(&mut self, category: &WorkerCategory) -> Option<WorkerConnection> {
        self.regional.pop(category)
    }

    /// Take the longest-waiting single-point poller for `category`.
    pub fn take_priority_wait(&mut self, category: &WorkerCategory) -> Option<WorkerConnection> {
        self.priority.pop(category)
    }

    /// Remove a regional poller. Returns false if it was already taken.
    pub fn remove_worker_poll(&mut self, category: &WorkerCategory, id: HandleId) -> bool {
        self.regional.remove(category, id)
    }

    /// Remove a single-point poller. Returns false if it was already taken.
    pub fn remove_priority_wait(&mut self, category: &WorkerCategory, id: HandleId) -> bool {
        self.priority.remove(category, id)
    }

    /// Remove a poller from the pool for `kind`.
    pub fn remove(&mut self, kind: PollKind, category: &WorkerCategory, id: HandleId) -> bool {
        self.pool(kind).remove(category, id)
    }

    /// Number of parked connections in the pool for `kind`.
    pub fn parked(&self, kind: PollKind) -> usize {
        match kind {
            PollKind::Regional => self.regional.len(),
            PollKind::Priority => self.priority.len(),
        }
    }
}
