//! Periodic housekeeping: lease expiry and stale worker records.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::state::AppState;

/// Run one housekeeping pass. Returns the number of requeued tasks.
pub fn sweep(state: &AppState) -> usize {
    let requeued = state.broker.requeue_expired();

    let cutoff = state
        .config
        .worker_ttl()
        .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
    if let Some(cutoff) = cutoff {
        let purged = state.broker.catalog().purge_older_than(cutoff);
        if purged > 0 {
            debug!(workers = purged, "Purged stale worker observations");
        }
    }
    requeued
}

/// Spawn the background sweeper.
pub fn spawn_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep(&state);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_broker_core::{Payload, TaskRequest, WorkerCategory, WorkerId};

    use crate::broker::PollOutcome;
    use crate::config::Config;
    use crate::transport::ParkedResponse;

    #[test]
    fn test_sweep_requeues_expired_leases() {
        let state = AppState::new(Config {
            lease_secs: 0,
            ..Config::default()
        });
        let category = WorkerCategory::new("graphA", "v1").unwrap();
        state
            .broker
            .enqueue_regional_batch(vec![TaskRequest::regional(
                "J1",
                category.clone(),
                Payload::new(),
            )])
            .unwrap();

        let (worker, _waiting) = ParkedResponse::suspend();
        assert!(matches!(
            state.broker.poll_regional(&category, worker),
            PollOutcome::Dispatched(_)
        ));

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(sweep(&state), 1);
        assert_eq!(state.broker.counts().queued_regional, 1);
    }

    #[test]
    fn test_sweep_keeps_recent_workers() {
        let state = AppState::new(Config::default());
        state.broker.record_observation(
            WorkerId::new("w1"),
            WorkerCategory::new("graphA", "v1").unwrap(),
        );

        sweep(&state);
        assert_eq!(state.broker.workers().len(), 1);
    }

    #[test]
    fn test_sweep_with_unbounded_worker_ttl() {
        let state = AppState::new(Config {
            worker_ttl_secs: 10_000_000_000_000_000,
            lease_secs: 0,
            ..Config::default()
        });
        let category = WorkerCategory::new("graphA", "v1").unwrap();
        state
            .broker
            .record_observation(WorkerId::new("w1"), category.clone());
        state
            .broker
            .enqueue_regional_batch(vec![TaskRequest::regional(
                "J1",
                category.clone(),
                Payload::new(),
            )])
            .unwrap();
        let (worker, _waiting) = ParkedResponse::suspend();
        state.broker.poll_regional(&category, worker);

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(sweep(&state), 1);
        assert_eq!(state.broker.workers().len(), 1);
    }
}
