//! Persistent per-backend, per-task performance history
//!
//! Running totals survive restarts and feed the selector's history bonus.
//! Every recorded sample is written through to the store.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tiergate_core::{StateStore, load_or_warn};

/// Persisted form: backend id to task type to totals
pub type HistorySnapshot = BTreeMap<String, BTreeMap<String, PerformanceAggregate>>;

/// Running totals for one (backend, task type) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAggregate {
    pub runs: u64,
    pub successes: u64,
    pub quality_sum: f64,
    /// Seconds
    pub time_sum: f64,
    /// USD
    pub cost_sum: f64,
}

impl PerformanceAggregate {
    pub fn success_rate(&self) -> f64 {
        self.mean(self.successes as f64)
    }

    pub fn avg_quality(&self) -> f64 {
        self.mean(self.quality_sum)
    }

    pub fn avg_time(&self) -> f64 {
        self.mean(self.time_sum)
    }

    pub fn avg_cost(&self) -> f64 {
        self.mean(self.cost_sum)
    }

    fn mean(&self, total: f64) -> f64 {
        if self.runs == 0 { 0.0 } else { total / self.runs as f64 }
    }

    fn add(&mut self, sample: &ExecutionSample) {
        self.runs += 1;
        if sample.success {
            self.successes += 1;
        }
        self.quality_sum += sample.quality;
        self.time_sum += sample.elapsed.as_secs_f64();
        self.cost_sum += sample.cost;
    }
}

/// Outcome of one executor call
#[derive(Debug, Clone, Copy)]
pub struct ExecutionSample {
    pub success: bool,
    pub quality: f64,
    pub elapsed: Duration,
    pub cost: f64,
}

/// Shared performance history
pub struct PerformanceHistory {
    data: Mutex<HistorySnapshot>,
    store: Arc<dyn StateStore<HistorySnapshot>>,
}

impl PerformanceHistory {
    /// Load persisted history; unreadable state starts empty
    pub fn new(store: Arc<dyn StateStore<HistorySnapshot>>) -> Self {
        let data = load_or_warn(store.as_ref(), "performance history").unwrap_or_default();

        Self {
            data: Mutex::new(data),
            store,
        }
    }

    /// Add a sample and persist
    pub fn record(&self, backend_id: &str, task_type: &str, sample: &ExecutionSample) {
        let mut data = self.data();
        let aggregate = data
            .entry(backend_id.to_string())
            .or_default()
            .entry(task_type.to_string())
            .or_default();
        aggregate.add(sample);

        tracing::debug!(
            backend = backend_id,
            task_type,
            runs = aggregate.runs,
            success_rate = aggregate.success_rate(),
            avg_quality = aggregate.avg_quality(),
            "performance recorded"
        );

        if let Err(e) = self.store.save(&data) {
            tracing::warn!(error = %e, "failed to persist performance history");
        }
    }

    pub fn aggregate(&self, backend_id: &str, task_type: &str) -> Option<PerformanceAggregate> {
        self.data().get(backend_id)?.get(task_type).copied()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        self.data().clone()
    }

    /// Number of (backend, task type) pairs with history
    pub fn len(&self) -> usize {
        self.data().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn data(&self) -> MutexGuard<'_, HistorySnapshot> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PerformanceHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceHistory").field("pairs", &self.len()).finish_non_exhaustive()
    }
}
