//! Task queues - the scheduling core of the broker.
//!
//! Tasks live in a single table keyed by [`TaskId`]; jobs and the
//! per-category queues only hold ids into it. A category never has both
//! queued tasks and parked workers of the same kind at once: polls only park
//! when the queue is empty, and new work goes to parked workers first.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tracing::{debug, info};

use analyst_broker_core::{
    Job, JobId, JobStatus, Task, TaskId, TaskKind, TaskRequest, TaskState, WorkerCategory,
};

use crate::broker::error::BrokerError;
use crate::broker::registry::{ConnectionRegistry, PollKind};
use crate::transport::{ProducerConnection, Suspended, WorkerConnection};

/// Scheduling limits.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Most regional tasks handed out per poll.
    pub max_batch_size: usize,

    /// Most regional tasks queued per category before submissions are refused.
    pub max_queue_depth: usize,

    /// How long a regional task may stay unacknowledged before redelivery.
    pub lease_duration: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1,
            max_queue_depth: 100_000,
            lease_duration: Duration::from_secs(60),
        }
    }
}

/// Result of a worker poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// Queued work was handed out; respond with it now.
    Dispatched(Vec<Task>),
    /// Nothing queued; the connection was registered and must be suspended.
    Parked,
}

/// What happened to a priority result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultDelivery {
    /// The requester's connection was resumed with the result.
    Delivered,
    /// The requester was already gone; the result was dropped.
    ProducerGone,
}

/// Sizes of the broker's queues and pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub jobs: usize,
    pub queued_regional: usize,
    pub queued_priority: usize,
    pub in_flight: usize,
    pub waiting_producers: usize,
    pub parked_regional: usize,
    pub parked_priority: usize,
}

type CategoryQueues = HashMap<WorkerCategory, VecDeque<TaskId>>;

/// Queues, in-flight tracking, and dispatch decisions for both task kinds.
pub struct TaskQueueManager {
    config: QueueConfig,
    next_task_id: TaskId,
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<TaskId, Task>,
    regional_queues: CategoryQueues,
    priority_queues: CategoryQueues,
    /// In-flight tasks of both kinds. Regional entries carry a lease expiry.
    in_flight: HashMap<TaskId, Option<Instant>>,
    producers: HashMap<TaskId, ProducerConnection>,
    registry: ConnectionRegistry,
}

impl TaskQueueManager {
    /// Create an empty manager.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            next_task_id: TaskId::new(1),
            jobs: HashMap::new(),
            tasks: HashMap::new(),
            regional_queues: HashMap::new(),
            priority_queues: HashMap::new(),
            in_flight: HashMap::new(),
            producers: HashMap::new(),
            registry: ConnectionRegistry::new(),
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_task_id;
        self.next_task_id = id.next();
        id
    }

    fn queues_mut(&mut self, kind: TaskKind) -> &mut CategoryQueues {
        match kind {
            TaskKind::Regional => &mut self.regional_queues,
            TaskKind::Priority => &mut self.priority_queues,
        }
    }

    // ------------------------------------------------------------------
    // Regional tasks
    // ------------------------------------------------------------------

    /// Accept a batch of tasks for one job.
    ///
    /// Each task goes straight to a parked worker when one is waiting for
    /// its category, otherwise to the back of the category queue.
    pub fn enqueue_regional_batch(
        &mut self,
        requests: Vec<TaskRequest>,
    ) -> Result<Vec<TaskId>, BrokerError> {
        let Some(exemplar) = requests.first() else {
            return Err(BrokerError::Validation("Batch contains no tasks.".into()));
        };
        let job_id = exemplar.job_id.clone().ok_or_else(|| {
            BrokerError::Validation("Regional tasks must carry a jobId.".into())
        })?;
        let category = exemplar.category.clone();

        if requests
            .iter()
            .any(|r| r.job_id.as_ref() != Some(&job_id) || r.category != category)
        {
            return Err(BrokerError::Validation(
                "All tasks must be for the same graph, job, and worker version.".into(),
            ));
        }

        if let Some(job) = self.jobs.get(&job_id) {
            if job.category != category {
                return Err(BrokerError::Validation(format!(
                    "Job {} already exists for {}.",
                    job_id, job.category
                )));
            }
        }

        let depth = self.regional_queues.get(&category).map_or(0, VecDeque::len);
        if depth + requests.len() > self.config.max_queue_depth {
            return Err(BrokerError::QueueFull { category, depth });
        }

        let ids: Vec<TaskId> = requests
            .into_iter()
            .map(|request| {
                let id = self.allocate_id();
                self.tasks
                    .insert(id, Task::new(id, TaskKind::Regional, request));
                id
            })
            .collect();

        let job = self
            .jobs
            .entry(job_id.clone())
            .or_insert_with(|| Job::new(job_id.clone(), category.clone()));
        for id in &ids {
            job.add_task(*id);
        }

        info!(
            job_id = %job_id,
            category = %category,
            tasks = ids.len(),
            "Enqueued regional tasks"
        );

        for id in &ids {
            self.offer(*id);
        }

        Ok(ids)
    }

    /// Hand out queued regional work, or park the worker.
    pub fn poll_regional(
        &mut self,
        category: &WorkerCategory,
        handle: WorkerConnection,
    ) -> PollOutcome {
        let limit = self.config.max_batch_size.max(1);
        let batch = self.take_queued(TaskKind::Regional, category, limit);

        if batch.is_empty() {
            debug!(category = %category, handle = %handle.id(), "Parking regional poll");
            self.registry.register_worker_poll(category.clone(), handle);
            PollOutcome::Parked
        } else {
            PollOutcome::Dispatched(batch)
        }
    }

    /// Record a worker's acknowledgment that a regional task is done.
    ///
    /// Returns false for unknown, already acknowledged, or deleted tasks; a
    /// duplicate acknowledgment from a redelivered task has no effect.
    pub fn acknowledge_regional(&mut self, task_id: TaskId) -> bool {
        let known = matches!(self.tasks.get(&task_id), Some(task) if task.is_regional());
        if !known {
            return false;
        }
        let Some(task) = self.tasks.remove(&task_id) else {
            return false;
        };

        self.in_flight.remove(&task_id);
        // A late acknowledgment can arrive after the lease already requeued it.
        if task.state == TaskState::Queued {
            remove_from_queue(&mut self.regional_queues, &task.category, task_id);
        }

        if let Some(job) = task.job_id.as_ref().and_then(|id| self.jobs.get_mut(id)) {
            job.complete_task(task_id);
            debug!(
                task_id = %task_id,
                job_id = %job.job_id,
                completed = job.completed,
                total = job.total,
                "Regional task completed"
            );
        }
        true
    }

    /// Put an unacknowledged regional task back at the head of its queue.
    pub fn on_worker_disconnect_before_ack(&mut self, task_id: TaskId) -> bool {
        let in_flight_regional = self.in_flight.contains_key(&task_id)
            && matches!(self.tasks.get(&task_id), Some(task) if task.is_regional());
        if !in_flight_regional {
            return false;
        }
        self.requeue_front(vec![task_id]) == 1
    }

    /// Requeue every regional task whose lease ran out before `now`.
    pub fn requeue_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<TaskId> = self
            .in_flight
            .iter()
            .filter_map(|(id, expiry)| match expiry {
                Some(at) if *at <= now => Some(*id),
                _ => None,
            })
            .collect();
        if expired.is_empty() {
            return 0;
        }

        let requeued = self.requeue_front(expired);
        info!(tasks = requeued, "Requeued regional tasks with expired leases");
        requeued
    }

    /// Remove a job and every task it still owns.
    pub fn delete_job(&mut self, job_id: &JobId) -> bool {
        let Some(job) = self.jobs.remove(job_id) else {
            return false;
        };

        for id in &job.task_ids {
            self.tasks.remove(id);
            self.in_flight.remove(id);
        }

        let tasks = &self.tasks;
        if let Some(queue) = self.regional_queues.get_mut(&job.category) {
            queue.retain(|id| tasks.contains_key(id));
            if queue.is_empty() {
                self.regional_queues.remove(&job.category);
            }
        }

        info!(
            job_id = %job_id,
            dropped_tasks = job.task_ids.len(),
            "Deleted job"
        );
        true
    }

    // ------------------------------------------------------------------
    // Priority tasks
    // ------------------------------------------------------------------

    /// Accept a single-point task whose result goes back to `producer`.
    pub fn enqueue_priority(
        &mut self,
        request: TaskRequest,
        producer: ProducerConnection,
    ) -> TaskId {
        let id = self.allocate_id();
        debug!(task_id = %id, category = %request.category, "Enqueued priority task");

        self.tasks
            .insert(id, Task::new(id, TaskKind::Priority, request));
        self.producers.insert(id, producer);
        self.offer(id);
        id
    }

    /// Hand out one queued priority task, or park the worker.
    pub fn poll_priority(
        &mut self,
        category: &WorkerCategory,
        handle: WorkerConnection,
    ) -> PollOutcome {
        let batch = self.take_queued(TaskKind::Priority, category, 1);

        if batch.is_empty() {
            debug!(category = %category, handle = %handle.id(), "Parking single-point poll");
            self.registry.register_priority_wait(category.clone(), handle);
            PollOutcome::Parked
        } else {
            PollOutcome::Dispatched(batch)
        }
    }

    /// Forget a priority task and return its producer's connection.
    pub fn delete_priority(&mut self, task_id: TaskId) -> Option<ProducerConnection> {
        let (category, state) = match self.tasks.get(&task_id) {
            Some(task) if !task.is_regional() => (task.category.clone(), task.state),
            _ => return None,
        };

        self.tasks.remove(&task_id);
        self.in_flight.remove(&task_id);
        if state == TaskState::Queued {
            remove_from_queue(&mut self.priority_queues, &category, task_id);
        }
        self.producers.remove(&task_id)
    }

    /// Route a worker's result back to the requester.
    pub fn complete_priority(
        &mut self,
        task_id: TaskId,
        result: Bytes,
    ) -> Result<ResultDelivery, BrokerError> {
        let producer = self
            .delete_priority(task_id)
            .ok_or(BrokerError::TaskNotFound(task_id))?;

        match producer.resume(result) {
            Ok(()) => {
                debug!(task_id = %task_id, "Delivered priority result");
                Ok(ResultDelivery::Delivered)
            }
            Err(_) => {
                debug!(task_id = %task_id, "Requester left before its result arrived");
                Ok(ResultDelivery::ProducerGone)
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection cleanup
    // ------------------------------------------------------------------

    /// Unregister a parked poll and take anything already resolved into it.
    pub fn release_poll(
        &mut self,
        kind: PollKind,
        category: &WorkerCategory,
        suspended: &mut Suspended<Vec<Task>>,
    ) -> Option<Vec<Task>> {
        self.registry.remove(kind, category, suspended.id());
        suspended.try_take()
    }

    /// Unregister a parked poll whose connection closed, requeueing any task
    /// it was given but never read.
    pub fn abandon_poll(
        &mut self,
        kind: PollKind,
        category: &WorkerCategory,
        suspended: &mut Suspended<Vec<Task>>,
    ) -> usize {
        match self.release_poll(kind, category, suspended) {
            Some(tasks) => self.return_undelivered(tasks),
            None => 0,
        }
    }

    /// Return tasks that were handed to a connection which closed unread.
    pub fn return_undelivered(&mut self, tasks: Vec<Task>) -> usize {
        let ids = tasks.into_iter().map(|t| t.task_id).collect();
        self.requeue_front(ids)
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Look up a live task.
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Progress of one job.
    pub fn job_status(&self, job_id: &JobId) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|job| self.status_of(job))
    }

    /// Progress of every job, oldest first.
    pub fn job_statuses(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs.into_iter().map(|job| self.status_of(job)).collect()
    }

    fn status_of(&self, job: &Job) -> JobStatus {
        let mut status = JobStatus {
            job_id: job.job_id.clone(),
            graph_id: job.category.graph_id.clone(),
            worker_version: job.category.worker_version.clone(),
            total: job.total,
            queued: 0,
            in_flight: 0,
            completed: job.completed,
            deliveries: 0,
        };
        for task in job.task_ids.iter().filter_map(|id| self.tasks.get(id)) {
            match task.state {
                TaskState::Queued => status.queued += 1,
                TaskState::InFlight => status.in_flight += 1,
            }
            status.deliveries += u64::from(task.deliveries);
        }
        status
    }

    /// Current queue and pool sizes.
    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            jobs: self.jobs.len(),
            queued_regional: self.regional_queues.values().map(VecDeque::len).sum(),
            queued_priority: self.priority_queues.values().map(VecDeque::len).sum(),
            in_flight: self.in_flight.len(),
            waiting_producers: self.producers.len(),
            parked_regional: self.registry.parked(PollKind::Regional),
            parked_priority: self.registry.parked(PollKind::Priority),
        }
    }

    // ------------------------------------------------------------------
    // Dispatch internals
    // ------------------------------------------------------------------

    /// Give a queued task to a waiting worker, else append it to its queue.
    fn offer(&mut self, task_id: TaskId) {
        if !self.dispatch_to_waiting(task_id) {
            self.push_queued(task_id, false);
        }
    }

    /// Try parked workers for the task's category in FIFO order.
    ///
    /// A worker whose connection already closed is skipped and the next one
    /// is tried.
    fn dispatch_to_waiting(&mut self, task_id: TaskId) -> bool {
        let Some((kind, category)) = self
            .tasks
            .get(&task_id)
            .map(|task| (task.kind, task.category.clone()))
        else {
            return false;
        };

        loop {
            let handle = match kind {
                TaskKind::Regional => self.registry.take_worker_poll(&category),
                TaskKind::Priority => self.registry.take_priority_wait(&category),
            };
            let Some(handle) = handle else {
                return false;
            };
            let Some(task) = self.start_delivery(task_id) else {
                return false;
            };

            match handle.resume(vec![task]) {
                Ok(()) => {
                    debug!(task_id = %task_id, category = %category, "Dispatched to waiting worker");
                    return true;
                }
                Err(_) => {
                    self.undo_delivery(task_id);
                    debug!(task_id = %task_id, category = %category, "Waiting worker already gone");
                }
            }
        }
    }

    fn push_queued(&mut self, task_id: TaskId, front: bool) {
        let Some(task) = self.tasks.get(&task_id) else {
            return;
        };
        let queues = match task.kind {
            TaskKind::Regional => &mut self.regional_queues,
            TaskKind::Priority => &mut self.priority_queues,
        };
        let queue = queues.entry(task.category.clone()).or_default();
        if front {
            queue.push_front(task_id);
        } else {
            queue.push_back(task_id);
        }
    }

    fn take_queued(&mut self, kind: TaskKind, category: &WorkerCategory, limit: usize) -> Vec<Task> {
        let mut batch = Vec::new();
        while batch.len() < limit {
            let Some(id) = pop_front(self.queues_mut(kind), category) else {
                break;
            };
            if let Some(task) = self.start_delivery(id) {
                batch.push(task);
            }
        }
        batch
    }

    fn start_delivery(&mut self, task_id: TaskId) -> Option<Task> {
        let task = self.tasks.get_mut(&task_id)?;
        // A lease too long to represent never expires; close-driven
        // redelivery still applies.
        let expiry = if task.is_regional() {
            Instant::now().checked_add(self.config.lease_duration)
        } else {
            None
        };
        task.dispatch();
        self.in_flight.insert(task_id, expiry);
        Some(task.clone())
    }

    fn undo_delivery(&mut self, task_id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.requeue();
            task.deliveries = task.deliveries.saturating_sub(1);
        }
        self.in_flight.remove(&task_id);
    }

    /// Move in-flight tasks back to the head of their queues, keeping their
    /// id order. Waiting workers get them first.
    fn requeue_front(&mut self, mut ids: Vec<TaskId>) -> usize {
        ids.sort_unstable();
        ids.retain(|id| self.in_flight.remove(id).is_some());
        for id in &ids {
            if let Some(task) = self.tasks.get_mut(id) {
                task.requeue();
            }
        }

        let mut undispatched = Vec::new();
        for id in ids.iter().copied() {
            if !self.dispatch_to_waiting(id) {
                undispatched.push(id);
            }
        }
        for id in undispatched.into_iter().rev() {
            self.push_queued(id, true);
        }
        ids.len()
    }
}

fn pop_front(queues: &mut CategoryQueues, category: &WorkerCategory) -> Option<TaskId> {
    let queue = queues.get_mut(category)?;
    let id = queue.pop_front();
    if queue.is_empty() {
        queues.remove(category);
    }
    id
}

fn remove_from_queue(queues: &mut CategoryQueues, category: &WorkerCategory, task_id: TaskId) {
    if let Some(queue) = queues.get_mut(category) {
        queue.retain(|id| *id != task_id);
        if queue.is_empty() {
            queues.remove(category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_broker_core::Payload;
    use serde_json::json;

    use crate::transport::ParkedResponse;

    fn category(graph: &str, version: &str) -> WorkerCategory {
        WorkerCategory::new(graph, version).unwrap()
    }

    fn graph_a() -> WorkerCategory {
        category("graphA", "v1")
    }

    fn batch(job: &str, category: &WorkerCategory, n: usize) -> Vec<TaskRequest> {
        (0..n)
            .map(|i| {
                let mut payload = Payload::new();
                payload.insert("origin".into(), json!(i));
                TaskRequest::regional(job, category.clone(), payload)
            })
            .collect()
    }

    fn ids(tasks: &[Task]) -> Vec<u64> {
        tasks.iter().map(|t| t.task_id.get()).collect()
    }

    fn poll_ids(manager: &mut TaskQueueManager, category: &WorkerCategory) -> Vec<u64> {
        let (handle, _suspended) = ParkedResponse::suspend();
        match manager.poll_regional(category, handle) {
            PollOutcome::Dispatched(tasks) => ids(&tasks),
            PollOutcome::Parked => Vec::new(),
        }
    }

    #[test]
    fn test_regional_job_scenario() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let job = JobId::new("J1");
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 3))
            .unwrap();

        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
        assert_eq!(manager.counts().queued_regional, 2);

        assert!(manager.acknowledge_regional(TaskId::new(1)));
        let status = manager.job_status(&job).unwrap();
        assert_eq!((status.completed, status.total), (1, 3));
        assert_eq!(status.queued, 2);

        assert!(manager.delete_job(&job));
        assert_eq!(manager.counts().queued_regional, 0);

        let (handle, _suspended) = ParkedResponse::suspend();
        assert!(matches!(
            manager.poll_regional(&graph_a(), handle),
            PollOutcome::Parked
        ));
        assert_eq!(manager.counts().parked_regional, 1);
    }

    #[test]
    fn test_fifo_within_category() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 3))
            .unwrap();

        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![2]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![3]);
    }

    #[test]
    fn test_batch_size_limits_poll() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            max_batch_size: 2,
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 3))
            .unwrap();

        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1, 2]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![3]);
    }

    #[test]
    fn test_redelivered_task_goes_first() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);

        assert!(manager.on_worker_disconnect_before_ack(TaskId::new(1)));
        assert!(!manager.on_worker_disconnect_before_ack(TaskId::new(1)));
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();

        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![2]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![3]);
        assert_eq!(manager.task(TaskId::new(1)).unwrap().deliveries, 2);
    }

    #[test]
    fn test_expired_lease_is_redelivered() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            lease_duration: Duration::from_secs(30),
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);

        let now = Instant::now();
        assert_eq!(manager.requeue_expired(now), 0);
        assert_eq!(manager.requeue_expired(now + Duration::from_secs(31)), 1);

        let task = manager.task(TaskId::new(1)).unwrap();
        assert_eq!(task.state, TaskState::Queued);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
    }

    #[test]
    fn test_unacknowledged_task_is_redelivered_indefinitely() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            lease_duration: Duration::ZERO,
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();

        for round in 1..=5 {
            assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
            manager.requeue_expired(Instant::now() + Duration::from_millis(1));
            assert_eq!(manager.task(TaskId::new(1)).unwrap().deliveries, round);
        }
    }

    #[test]
    fn test_expired_tasks_keep_order_at_head() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            max_batch_size: 2,
            lease_duration: Duration::ZERO,
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 3))
            .unwrap();
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1, 2]);

        manager.requeue_expired(Instant::now() + Duration::from_millis(1));
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1, 2]);
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        poll_ids(&mut manager, &graph_a());

        assert!(manager.acknowledge_regional(TaskId::new(1)));
        assert!(!manager.acknowledge_regional(TaskId::new(1)));
        assert!(!manager.acknowledge_regional(TaskId::new(42)));

        let status = manager.job_status(&JobId::new("J1")).unwrap();
        assert_eq!(status.completed, 1);
    }

    #[test]
    fn test_late_ack_after_lease_expiry_removes_queued_copy() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            lease_duration: Duration::ZERO,
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();
        poll_ids(&mut manager, &graph_a());
        manager.requeue_expired(Instant::now() + Duration::from_millis(1));

        assert!(manager.acknowledge_regional(TaskId::new(1)));
        assert_eq!(manager.counts().queued_regional, 0);
        assert!(poll_ids(&mut manager, &graph_a()).is_empty());
    }

    #[test]
    fn test_parked_worker_receives_new_task() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (handle, mut suspended) = ParkedResponse::suspend();
        assert!(matches!(
            manager.poll_regional(&graph_a(), handle),
            PollOutcome::Parked
        ));

        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();

        let delivered = suspended.try_take().unwrap();
        assert_eq!(ids(&delivered), vec![1]);
        let counts = manager.counts();
        assert_eq!(counts.in_flight, 1);
        assert_eq!(counts.queued_regional, 1);
        assert_eq!(counts.parked_regional, 0);
    }

    #[test]
    fn test_category_isolation() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (handle, mut suspended) = ParkedResponse::suspend();
        manager.poll_regional(&category("g1", "v1"), handle);

        manager
            .enqueue_regional_batch(batch("J1", &category("g1", "v2"), 1))
            .unwrap();
        manager
            .enqueue_regional_batch(batch("J2", &category("g2", "v1"), 1))
            .unwrap();

        assert!(suspended.try_take().is_none());
        assert_eq!(manager.counts().queued_regional, 2);
        assert_eq!(manager.counts().parked_regional, 1);
    }

    #[test]
    fn test_abandoned_poll_is_never_selected() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (handle, mut suspended) = ParkedResponse::suspend();
        manager.poll_regional(&graph_a(), handle);

        assert_eq!(
            manager.abandon_poll(PollKind::Regional, &graph_a(), &mut suspended),
            0
        );
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();

        assert!(suspended.try_take().is_none());
        assert_eq!(manager.counts().queued_regional, 1);
        assert_eq!(manager.task(TaskId::new(1)).unwrap().deliveries, 0);
    }

    #[test]
    fn test_abandoned_poll_returns_unread_task() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (handle, mut suspended) = ParkedResponse::suspend();
        manager.poll_regional(&graph_a(), handle);
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();

        assert_eq!(
            manager.abandon_poll(PollKind::Regional, &graph_a(), &mut suspended),
            1
        );
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![2]);
    }

    #[test]
    fn test_closed_waiter_is_skipped() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (first, gone) = ParkedResponse::suspend();
        let (second, mut waiting) = ParkedResponse::suspend();
        manager.poll_regional(&graph_a(), first);
        manager.poll_regional(&graph_a(), second);
        drop(gone);

        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();

        assert_eq!(ids(&waiting.try_take().unwrap()), vec![1]);
        assert_eq!(manager.task(TaskId::new(1)).unwrap().deliveries, 1);
    }

    #[test]
    fn test_unrepresentable_lease_still_tracks_delivery() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            lease_duration: Duration::from_secs(u64::MAX),
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 1))
            .unwrap();

        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
        assert_eq!(manager.counts().in_flight, 1);
        assert_eq!(manager.requeue_expired(Instant::now()), 0);

        assert!(manager.on_worker_disconnect_before_ack(TaskId::new(1)));
        assert_eq!(poll_ids(&mut manager, &graph_a()), vec![1]);
    }

    #[test]
    fn test_abandoned_priority_poll_returns_unread_task() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (handle, mut suspended) = ParkedResponse::suspend();
        manager.poll_priority(&graph_a(), handle);

        let mut producers = Vec::new();
        let mut task_ids = Vec::new();
        for _ in 0..2 {
            let (producer, waiting) = ParkedResponse::suspend();
            producers.push(waiting);
            task_ids.push(
                manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer),
            );
        }
        assert_eq!(manager.counts().queued_priority, 1);

        assert_eq!(
            manager.abandon_poll(PollKind::Priority, &graph_a(), &mut suspended),
            1
        );
        assert_eq!(manager.counts().in_flight, 0);
        assert_eq!(manager.counts().queued_priority, 2);
        assert_eq!(manager.task(task_ids[0]).unwrap().state, TaskState::Queued);

        let (worker, _next) = ParkedResponse::suspend();
        let PollOutcome::Dispatched(tasks) = manager.poll_priority(&graph_a(), worker) else {
            panic!("expected the returned task");
        };
        assert_eq!(tasks[0].task_id, task_ids[0]);
        assert_eq!(tasks[0].deliveries, 2);
    }

    #[test]
    fn test_closed_priority_waiter_is_skipped() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (first, gone) = ParkedResponse::suspend();
        let (second, mut waiting) = ParkedResponse::suspend();
        manager.poll_priority(&graph_a(), first);
        manager.poll_priority(&graph_a(), second);
        drop(gone);

        let (producer, _producer_waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);

        assert_eq!(waiting.try_take().unwrap()[0].task_id, task_id);
        assert_eq!(manager.task(task_id).unwrap().deliveries, 1);
        assert_eq!(manager.counts().parked_priority, 0);
    }

    #[test]
    fn test_batch_validation() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());

        assert!(matches!(
            manager.enqueue_regional_batch(Vec::new()),
            Err(BrokerError::Validation(_))
        ));

        let mut mixed_jobs = batch("J1", &graph_a(), 1);
        mixed_jobs.extend(batch("J2", &graph_a(), 1));
        assert!(matches!(
            manager.enqueue_regional_batch(mixed_jobs),
            Err(BrokerError::Validation(_))
        ));

        let mut mixed_categories = batch("J1", &graph_a(), 1);
        mixed_categories.extend(batch("J1", &category("graphA", "v2"), 1));
        assert!(matches!(
            manager.enqueue_regional_batch(mixed_categories),
            Err(BrokerError::Validation(_))
        ));

        let no_job = vec![TaskRequest::priority(graph_a(), Payload::new())];
        assert!(matches!(
            manager.enqueue_regional_batch(no_job),
            Err(BrokerError::Validation(_))
        ));

        assert_eq!(manager.counts(), QueueCounts::default());
    }

    #[test]
    fn test_job_category_is_fixed() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        assert!(matches!(
            manager.enqueue_regional_batch(batch("J1", &category("graphB", "v1"), 1)),
            Err(BrokerError::Validation(_))
        ));

        let status = manager.job_status(&JobId::new("J1")).unwrap();
        assert_eq!(status.total, 4);
    }

    #[test]
    fn test_queue_depth_limit() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            max_queue_depth: 2,
            ..QueueConfig::default()
        });

        assert!(matches!(
            manager.enqueue_regional_batch(batch("J1", &graph_a(), 3)),
            Err(BrokerError::QueueFull { depth: 0, .. })
        ));
        assert!(manager.job_statuses().is_empty());

        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        manager
            .enqueue_regional_batch(batch("J2", &category("graphB", "v1"), 2))
            .unwrap();
    }

    #[test]
    fn test_delete_job_drops_in_flight_tasks() {
        let mut manager = TaskQueueManager::new(QueueConfig {
            lease_duration: Duration::ZERO,
            ..QueueConfig::default()
        });
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 2))
            .unwrap();
        poll_ids(&mut manager, &graph_a());

        assert!(manager.delete_job(&JobId::new("J1")));
        assert!(!manager.delete_job(&JobId::new("J1")));

        assert!(!manager.acknowledge_regional(TaskId::new(1)));
        assert_eq!(manager.requeue_expired(Instant::now() + Duration::from_millis(1)), 0);
        assert_eq!(manager.counts(), QueueCounts::default());
    }

    #[test]
    fn test_job_statuses_report_progress() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        manager
            .enqueue_regional_batch(batch("J1", &graph_a(), 3))
            .unwrap();
        poll_ids(&mut manager, &graph_a());

        let statuses = manager.job_statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].queued, 2);
        assert_eq!(statuses[0].in_flight, 1);
        assert_eq!(statuses[0].deliveries, 1);
        assert_eq!(statuses[0].graph_id, "graphA");
    }

    #[test]
    fn test_priority_round_trip() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (producer, mut waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);
        assert_eq!(manager.counts().queued_priority, 1);

        let (worker, _suspended) = ParkedResponse::suspend();
        let PollOutcome::Dispatched(tasks) = manager.poll_priority(&graph_a(), worker) else {
            panic!("expected the queued priority task");
        };
        assert_eq!(tasks[0].task_id, task_id);
        assert_eq!(tasks[0].kind, TaskKind::Priority);

        assert_eq!(
            manager
                .complete_priority(task_id, Bytes::from_static(b"P"))
                .unwrap(),
            ResultDelivery::Delivered
        );
        assert_eq!(waiting.try_take(), Some(Bytes::from_static(b"P")));

        assert!(matches!(
            manager.complete_priority(task_id, Bytes::from_static(b"P")),
            Err(BrokerError::TaskNotFound(_))
        ));
        assert_eq!(manager.counts(), QueueCounts::default());
    }

    #[test]
    fn test_priority_goes_to_waiting_single_point_worker() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (regional, mut regional_waiting) = ParkedResponse::suspend();
        let (single, mut single_waiting) = ParkedResponse::suspend();
        manager.poll_regional(&graph_a(), regional);
        manager.poll_priority(&graph_a(), single);

        let (producer, _waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);

        assert!(regional_waiting.try_take().is_none());
        assert_eq!(single_waiting.try_take().unwrap()[0].task_id, task_id);
        assert_eq!(manager.task(task_id).unwrap().state, TaskState::InFlight);
    }

    #[test]
    fn test_cancelled_priority_task_is_forgotten() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (producer, _waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);

        assert!(manager.delete_priority(task_id).is_some());
        assert!(manager.delete_priority(task_id).is_none());

        let (worker, _suspended) = ParkedResponse::suspend();
        assert!(matches!(
            manager.poll_priority(&graph_a(), worker),
            PollOutcome::Parked
        ));
        assert!(matches!(
            manager.complete_priority(task_id, Bytes::new()),
            Err(BrokerError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_result_for_departed_producer_is_swallowed() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (producer, waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);
        drop(waiting);

        assert_eq!(
            manager.complete_priority(task_id, Bytes::new()).unwrap(),
            ResultDelivery::ProducerGone
        );
    }

    #[test]
    fn test_acknowledge_ignores_priority_tasks() {
        let mut manager = TaskQueueManager::new(QueueConfig::default());
        let (producer, _waiting) = ParkedResponse::suspend();
        let task_id =
            manager.enqueue_priority(TaskRequest::priority(graph_a(), Payload::new()), producer);

        assert!(!manager.acknowledge_regional(task_id));
        assert!(manager.task(task_id).is_some());
    }
}
