//! Routing key matching workers to tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::CoreError;

/// The `(graph, worker version)` pair that decides which workers may run a task.
///
/// Two workers with equal categories are interchangeable. A worker only ever
/// receives tasks enqueued under exactly its own category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerCategory {
    /// Transport network the worker has loaded.
    pub graph_id: String,

    /// Worker build the task was written for.
    pub worker_version: String,
}

impl WorkerCategory {
    /// Create a category, rejecting empty fields.
    pub fn new(
        graph_id: impl Into<String>,
        worker_version: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let graph_id = graph_id.into();
        let worker_version = worker_version.into();

        if graph_id.trim().is_empty() {
            return Err(CoreError::InvalidCategory("graphId cannot be empty".into()));
        }
        if worker_version.trim().is_empty() {
            return Err(CoreError::InvalidCategory(
                "workerVersion cannot be empty".into(),
            ));
        }

        Ok(Self {
            graph_id,
            worker_version,
        })
    }
}

impl fmt::Display for WorkerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.graph_id, self.worker_version)
    }
}
