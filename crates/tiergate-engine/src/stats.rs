use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;

/// Per-engine execution counters; never persisted
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    requests: AtomicU64,
    attempts: AtomicU64,
    escalations: AtomicU64,
    cache_hits: AtomicU64,
    executor_failures: AtomicU64,
    budget_aborts: AtomicU64,
    total_spend: Mutex<f64>,
}

/// Snapshot of [`StatsRecorder`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub requests: u64,
    pub attempts: u64,
    pub escalations: u64,
    pub cache_hits: u64,
    pub executor_failures: u64,
    pub budget_aborts: u64,
    pub total_spend: f64,
}

impl StatsRecorder {
    pub(crate) fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt(&self, cached: bool) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn executor_failure(&self) {
        self.executor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn budget_abort(&self) {
        self.budget_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn spend(&self, cost: f64) {
        *self.total_spend.lock().unwrap_or_else(PoisonError::into_inner) += cost;
    }

    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            requests: self.requests.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            executor_failures: self.executor_failures.load(Ordering::Relaxed),
            budget_aborts: self.budget_aborts.load(Ordering::Relaxed),
            total_spend: *self.total_spend.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_cache_hits_as_attempts() {
        let stats = StatsRecorder::default();
        stats.request();
        stats.attempt(false);
        stats.attempt(true);
        stats.spend(0.25);
        stats.spend(0.5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert!((snapshot.total_spend - 0.75).abs() < 1e-12);
    }
}
