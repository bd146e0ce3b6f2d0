//! Task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{JobId, TaskId, TaskKind, TaskState, WorkerCategory};

/// Opaque task body as submitted by a producer.
///
/// Everything except the routing fields is kept in `payload` and forwarded to
/// the worker verbatim.
pub type Payload = Map<String, Value>;

/// A unit of work as submitted, before the broker has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    /// Job this task belongs to. Required for regional tasks.
    pub job_id: Option<JobId>,

    /// Workers allowed to run this task.
    pub category: WorkerCategory,

    /// Opaque body.
    pub payload: Payload,
}

impl TaskRequest {
    /// Create a request for a regional job task.
    pub fn regional(job_id: impl Into<JobId>, category: WorkerCategory, payload: Payload) -> Self {
        Self {
            job_id: Some(job_id.into()),
            category,
            payload,
        }
    }

    /// Create a request for a single-point task.
    pub fn priority(category: WorkerCategory, payload: Payload) -> Self {
        Self {
            job_id: None,
            category,
            payload,
        }
    }
}

/// A Task is one unit of work owned by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Broker-assigned identifier.
    pub task_id: TaskId,

    /// Owning job, always present for regional tasks.
    pub job_id: Option<JobId>,

    /// Routing key.
    pub category: WorkerCategory,

    /// Priority or regional.
    pub kind: TaskKind,

    /// Opaque body forwarded to the worker.
    pub payload: Payload,

    /// Current lifecycle state.
    pub state: TaskState,

    /// Number of times this task has been handed to a worker.
    pub deliveries: u32,

    /// When the broker accepted the task.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a queued task from a request.
    pub fn new(task_id: TaskId, kind: TaskKind, request: TaskRequest) -> Self {
        Self {
            task_id,
            job_id: request.job_id,
            category: request.category,
            kind,
            payload: request.payload,
            state: TaskState::Queued,
            deliveries: 0,
            created_at: Utc::now(),
        }
    }

    /// Mark the task as handed to a worker.
    pub fn dispatch(&mut self) {
        self.state = TaskState::InFlight;
        self.deliveries += 1;
    }

    /// Put the task back in the queued state for another delivery.
    pub fn requeue(&mut self) {
        self.state = TaskState::Queued;
    }

    /// Returns true if this is a regional job task.
    pub fn is_regional(&self) -> bool {
        self.kind == TaskKind::Regional
    }
}
