//! Broker errors.

use thiserror::Error;

use analyst_broker_core::{CoreError, JobId, TaskId, WorkerCategory};

/// Errors returned by broker operations.
///
/// "No work available" is never an error; polls park instead.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed or inconsistent submission. Never retried by the broker.
    #[error("Invalid submission: {0}")]
    Validation(String),

    /// The category's regional queue is at its configured depth.
    #[error("Queue for {category} is full ({depth} tasks)")]
    QueueFull {
        category: WorkerCategory,
        depth: usize,
    },

    /// Unknown or already finished task. Expected under races.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Unknown or already deleted job.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),
}

impl From<CoreError> for BrokerError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}
