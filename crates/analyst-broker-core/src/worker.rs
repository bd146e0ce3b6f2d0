//! Worker observation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{WorkerCategory, WorkerId};

/// Last time a worker identity was seen polling, and for which category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerObservation {
    pub worker_id: WorkerId,

    #[serde(flatten)]
    pub category: WorkerCategory,

    pub last_seen: DateTime<Utc>,
}

impl WorkerObservation {
    /// Create an observation stamped with the current time.
    pub fn now(worker_id: WorkerId, category: WorkerCategory) -> Self {
        Self {
            worker_id,
            category,
            last_seen: Utc::now(),
        }
    }
}
