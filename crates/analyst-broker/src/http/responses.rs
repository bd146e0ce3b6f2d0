//! HTTP request and response types.

use serde::{Deserialize, Serialize};

use analyst_broker_core::{
    CoreError, JobId, JobStatus, JobSummary, Payload, Task, TaskId, TaskRequest, WorkerCategory,
};

// ============================================================================
// Task types
// ============================================================================

/// A task as posted by a producer.
///
/// Only the routing fields are interpreted; everything else is payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTask {
    #[serde(default)]
    pub job_id: Option<String>,

    pub graph_id: String,

    pub worker_version: String,

    #[serde(flatten)]
    pub payload: Payload,
}

impl SubmittedTask {
    /// Validate routing fields and split off the payload.
    pub fn into_request(self) -> Result<TaskRequest, CoreError> {
        let mut payload = self.payload;
        // The broker assigns task ids; never forward a producer's guess.
        payload.remove("taskId");

        Ok(TaskRequest {
            job_id: self.job_id.map(JobId::from),
            category: WorkerCategory::new(self.graph_id, self.worker_version)?,
            payload,
        })
    }
}

/// A task as handed to a worker.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredTask<'a> {
    pub task_id: TaskId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<&'a JobId>,

    pub graph_id: &'a str,

    pub worker_version: &'a str,

    #[serde(flatten)]
    pub payload: &'a Payload,
}

impl<'a> From<&'a Task> for DeliveredTask<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            task_id: task.task_id,
            job_id: task.job_id.as_ref(),
            graph_id: &task.category.graph_id,
            worker_version: &task.category.worker_version,
            payload: &task.payload,
        }
    }
}

/// Response body for an accepted regional batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub task_ids: Vec<TaskId>,
}

// ============================================================================
// Reporting types
// ============================================================================

/// Response for the job list.
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobStatus>,
    pub summary: JobSummary,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
