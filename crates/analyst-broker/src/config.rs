//! Broker configuration.

use std::time::Duration;

use crate::broker::QueueConfig;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_bind_addr: String,

    /// How long a worker poll stays parked before answering empty (seconds).
    pub poll_timeout_secs: u64,

    /// How long a single-point requester waits for its result (seconds).
    pub priority_timeout_secs: u64,

    /// Regional delivery lease before a task is redelivered (seconds).
    pub lease_secs: u64,

    /// Most regional tasks handed out per poll.
    pub max_batch_size: usize,

    /// Most regional tasks queued per category.
    pub max_queue_depth: usize,

    /// Interval between lease sweeps (seconds).
    pub sweep_interval_secs: u64,

    /// How long an idle worker stays in the catalog (seconds).
    pub worker_ttl_secs: u64,
}

impl Config {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn priority_timeout(&self) -> Duration {
        Duration::from_secs(self.priority_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Worker TTL as a calendar duration. `None` when it is too large to
    /// represent, in which case workers are never purged.
    pub fn worker_ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.worker_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }

    /// Scheduling limits for the task queues.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_batch_size: self.max_batch_size,
            max_queue_depth: self.max_queue_depth,
            lease_duration: Duration::from_secs(self.lease_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind_addr: "0.0.0.0:9001".to_string(),
            poll_timeout_secs: 30,
            priority_timeout_secs: 60,
            lease_secs: 60,
            max_batch_size: 1,
            max_queue_depth: 100_000,
            sweep_interval_secs: 5,
            worker_ttl_secs: 300,
        }
    }
}
