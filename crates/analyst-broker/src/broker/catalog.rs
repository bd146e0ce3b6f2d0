//! Which workers have recently polled, and for what.
//!
//! Purely for reporting; routing never consults the catalog. It has its own
//! lock so readers never contend with the broker's scheduling lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use analyst_broker_core::{WorkerCategory, WorkerId, WorkerObservation};

/// Latest observation per worker identity.
#[derive(Debug, Default)]
pub struct WorkerCatalog {
    observations: RwLock<HashMap<WorkerId, WorkerObservation>>,
}

impl WorkerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<WorkerId, WorkerObservation>> {
        self.observations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<WorkerId, WorkerObservation>> {
        self.observations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Note that `worker_id` just polled for `category`.
    pub fn record_observation(&self, worker_id: WorkerId, category: WorkerCategory) {
        let observation = WorkerObservation::now(worker_id.clone(), category);
        self.write().insert(worker_id, observation);
    }

    /// Copy of every observation, ordered by worker id.
    pub fn all_observations(&self) -> Vec<WorkerObservation> {
        let mut all: Vec<WorkerObservation> = self.read().values().cloned().collect();
        all.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        all
    }

    /// Forget workers not seen since `cutoff`. Returns how many were dropped.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut observations = self.write();
        let before = observations.len();
        observations.retain(|_, o| o.last_seen >= cutoff);
        before - observations.len()
    }

    /// Number of known workers per category.
    pub fn workers_by_category(&self) -> HashMap<WorkerCategory, usize> {
        let mut counts = HashMap::new();
        for observation in self.read().values() {
            *counts.entry(observation.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}
