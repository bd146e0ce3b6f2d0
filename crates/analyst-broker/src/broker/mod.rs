//! The broker: one lock around all scheduling state.
//!
//! [`Broker`] is the only thing the transport layer talks to. Every method
//! takes the lock once, performs a complete state transition, and releases
//! it. Nothing awaits or writes to a socket while the lock is held; resuming a
//! parked response is a non-blocking channel send.

pub mod catalog;
pub mod error;
pub mod queue;
pub mod registry;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use axum::body::Bytes;
use tracing::{debug, info};

use analyst_broker_core::{
    JobId, JobStatus, JobSummary, Task, TaskId, TaskRequest, WorkerCategory, WorkerId,
    WorkerObservation,
};

pub use catalog::WorkerCatalog;
pub use error::BrokerError;
pub use queue::{PollOutcome, QueueConfig, QueueCounts, ResultDelivery, TaskQueueManager};
pub use registry::{ConnectionRegistry, PollKind};

use crate::transport::{ProducerConnection, Suspended, WorkerConnection};

/// Thread-safe entry point over the task queues and worker catalog.
pub struct Broker {
    queues: Mutex<TaskQueueManager>,
    catalog: WorkerCatalog,
}

impl Broker {
    /// Create an empty broker.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            queues: Mutex::new(TaskQueueManager::new(config)),
            catalog: WorkerCatalog::new(),
        }
    }

    // Every transition completes before the guard drops, so a poisoned
    // lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, TaskQueueManager> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker observations, independent of the scheduling lock.
    pub fn catalog(&self) -> &WorkerCatalog {
        &self.catalog
    }

    /// Record that a worker polled.
    pub fn record_observation(&self, worker_id: WorkerId, category: WorkerCategory) {
        self.catalog.record_observation(worker_id, category);
    }

    /// Submit a regional batch. All tasks must share one job and category.
    pub fn enqueue_regional_batch(
        &self,
        tasks: Vec<TaskRequest>,
    ) -> Result<Vec<TaskId>, BrokerError> {
        self.lock().enqueue_regional_batch(tasks)
    }

    /// Poll for regional work; parks `handle` when there is none.
    pub fn poll_regional(&self, category: &WorkerCategory, handle: WorkerConnection) -> PollOutcome {
        self.lock().poll_regional(category, handle)
    }

    /// Poll for single-point work; parks `handle` when there is none.
    pub fn poll_priority(&self, category: &WorkerCategory, handle: WorkerConnection) -> PollOutcome {
        self.lock().poll_priority(category, handle)
    }

    /// Acknowledge a completed regional task.
    pub fn acknowledge_regional(&self, task_id: TaskId) -> Result<(), BrokerError> {
        if self.lock().acknowledge_regional(task_id) {
            Ok(())
        } else {
            debug!(task_id = %task_id, "Acknowledgment for unknown task");
            Err(BrokerError::TaskNotFound(task_id))
        }
    }

    /// Requeue a regional task whose worker went away before acknowledging it.
    pub fn on_worker_disconnect_before_ack(&self, task_id: TaskId) -> bool {
        self.lock().on_worker_disconnect_before_ack(task_id)
    }

    /// Submit a single-point task whose result goes back to `producer`.
    pub fn enqueue_priority(&self, task: TaskRequest, producer: ProducerConnection) -> TaskId {
        self.lock().enqueue_priority(task, producer)
    }

    /// Deliver a single-point result to whoever submitted the task.
    pub fn complete_priority(
        &self,
        task_id: TaskId,
        result: Bytes,
    ) -> Result<ResultDelivery, BrokerError> {
        let outcome = self.lock().complete_priority(task_id, result);
        if outcome.is_err() {
            debug!(task_id = %task_id, "Result for unknown priority task");
        }
        outcome
    }

    /// Delete a regional job and all its outstanding tasks.
    pub fn delete_job(&self, job_id: &JobId) -> Result<(), BrokerError> {
        if self.lock().delete_job(job_id) {
            Ok(())
        } else {
            debug!(job_id = %job_id, "Delete for unknown job");
            Err(BrokerError::JobNotFound(job_id.clone()))
        }
    }

    /// A parked poll timed out: unregister it and return anything that was
    /// dispatched to it in the meantime.
    pub fn release_worker_poll(
        &self,
        kind: PollKind,
        category: &WorkerCategory,
        suspended: &mut Suspended<Vec<Task>>,
    ) -> Option<Vec<Task>> {
        self.lock().release_poll(kind, category, suspended)
    }

    /// A parked poll's connection closed: unregister it and requeue anything
    /// that was dispatched to it but never read.
    pub fn abandon_worker_poll(
        &self,
        kind: PollKind,
        category: &WorkerCategory,
        suspended: &mut Suspended<Vec<Task>>,
    ) {
        let requeued = self.lock().abandon_poll(kind, category, suspended);
        if requeued > 0 {
            info!(
                category = %category,
                kind = kind.as_str(),
                tasks = requeued,
                "Worker disconnected before reading its tasks; requeued"
            );
        }
    }

    /// A requester's connection closed: forget its task.
    pub fn cancel_priority(&self, task_id: TaskId) -> bool {
        let cancelled = self.lock().delete_priority(task_id).is_some();
        if cancelled {
            debug!(task_id = %task_id, "Requester disconnected; priority task cancelled");
        }
        cancelled
    }

    /// A requester timed out: forget its task and return a result that
    /// arrived in the meantime.
    pub fn release_priority(&self, task_id: TaskId, suspended: &mut Suspended<Bytes>) -> Option<Bytes> {
        let mut queues = self.lock();
        queues.delete_priority(task_id);
        suspended.try_take()
    }

    /// Requeue regional tasks whose lease has expired.
    pub fn requeue_expired(&self) -> usize {
        self.lock().requeue_expired(Instant::now())
    }

    /// Progress of every job plus an aggregate.
    pub fn job_statuses(&self) -> (Vec<JobStatus>, JobSummary) {
        let statuses = self.lock().job_statuses();
        let summary = JobSummary::from_statuses(&statuses);
        (statuses, summary)
    }

    /// Every known worker.
    pub fn workers(&self) -> Vec<WorkerObservation> {
        self.catalog.all_observations()
    }

    /// Current queue and pool sizes.
    pub fn counts(&self) -> QueueCounts {
        self.lock().counts()
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
