//! Regional jobs and their reporting snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, TaskId, WorkerCategory};

/// A named batch of regional tasks sharing one category.
///
/// The job only records task ids; the tasks themselves are owned by the
/// broker's task table.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Producer-chosen job identifier.
    pub job_id: JobId,

    /// Category shared by every task in the job.
    pub category: WorkerCategory,

    /// Outstanding (not yet completed) tasks. Ids grow monotonically, so
    /// this is also enqueue order.
    pub task_ids: BTreeSet<TaskId>,

    /// Number of tasks ever enqueued under this job.
    pub total: usize,

    /// Number of tasks acknowledged as completed.
    pub completed: usize,

    /// When the first batch arrived.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create an empty job.
    pub fn new(job_id: JobId, category: WorkerCategory) -> Self {
        Self {
            job_id,
            category,
            task_ids: BTreeSet::new(),
            total: 0,
            completed: 0,
            created_at: Utc::now(),
        }
    }

    /// Record a newly enqueued task.
    pub fn add_task(&mut self, task_id: TaskId) {
        if self.task_ids.insert(task_id) {
            self.total += 1;
        }
    }

    /// Record a completion. Returns false if the task was not outstanding.
    pub fn complete_task(&mut self, task_id: TaskId) -> bool {
        let removed = self.task_ids.remove(&task_id);
        if removed {
            self.completed += 1;
        }
        removed
    }
}

/// Point-in-time progress of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,
    pub graph_id: String,
    pub worker_version: String,
    pub total: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub completed: usize,
    /// Sum of deliveries over the job's outstanding tasks.
    pub deliveries: u64,
}

/// Aggregate over all jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub jobs: usize,
    pub total: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub deliveries: u64,
}

impl JobSummary {
    /// Sum a set of job statuses.
    pub fn from_statuses(statuses: &[JobStatus]) -> Self {
        statuses.iter().fold(
            Self {
                jobs: statuses.len(),
                ..Self::default()
            },
            |mut acc, s| {
                acc.total += s.total;
                acc.queued += s.queued;
                acc.in_flight += s.in_flight;
                acc.completed += s.completed;
                acc.deliveries += s.deliveries;
                acc
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            JobId::new("J1"),
            WorkerCategory::new("graphA", "v1").unwrap(),
        )
    }

    #[test]
    fn test_complete_task_once() {
        let mut job = job();
        job.add_task(TaskId::new(1));
        job.add_task(TaskId::new(2));

        assert!(job.complete_task(TaskId::new(1)));
        assert!(!job.complete_task(TaskId::new(1)));
        assert!(!job.complete_task(TaskId::new(99)));

        assert_eq!(job.total, 2);
        assert_eq!(job.completed, 1);
        assert_eq!(job.task_ids.iter().copied().collect::<Vec<_>>(), vec![TaskId::new(2)]);

        assert!(job.complete_task(TaskId::new(2)));
        assert!(job.task_ids.is_empty());
        assert_eq!(job.completed, job.total);
    }

    #[test]
    fn test_large_job_completes_out_of_order() {
        let mut job = job();
        for id in 1..=100_000 {
            job.add_task(TaskId::new(id));
        }
        for id in (1..=100_000).rev() {
            assert!(job.complete_task(TaskId::new(id)));
        }

        assert!(job.task_ids.is_empty());
        assert_eq!(job.completed, 100_000);
        assert_eq!(job.total, 100_000);
    }

    #[test]
    fn test_summary_sums_statuses() {
        let status = |id: &str, total, completed| JobStatus {
            job_id: JobId::new(id),
            graph_id: "graphA".into(),
            worker_version: "v1".into(),
            total,
            queued: total - completed,
            in_flight: 0,
            completed,
            deliveries: completed as u64,
        };
        let summary = JobSummary::from_statuses(&[status("a", 3, 1), status("b", 5, 5)]);

        assert_eq!(summary.jobs, 2);
        assert_eq!(summary.total, 8);
        assert_eq!(summary.completed, 6);
        assert_eq!(summary.queued, 2);
    }
}
