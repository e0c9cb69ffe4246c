//! Metric names and the engine's instruments

use std::time::Duration;

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram},
};

pub const SPEND_USD: &str = "tiergate.spend.usd";
pub const CACHE_HITS: &str = "tiergate.cache.hits";
pub const ESCALATIONS: &str = "tiergate.escalations";
pub const EXECUTION_DURATION: &str = "tiergate.execution.duration";

/// Instruments recorded by the escalation controller
///
/// Built from the global meter provider, so they are no-ops until
/// [`crate::init`] installs an exporter.
#[derive(Clone)]
pub struct EngineMetrics {
    spend: Counter<f64>,
    cache_hits: Counter<u64>,
    escalations: Counter<u64>,
    execution_duration: Histogram<f64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("tiergate");

        Self {
            spend: meter
                .f64_counter(SPEND_USD)
                .with_unit("USD")
                .with_description("Recorded spend")
                .build(),
            cache_hits: meter
                .u64_counter(CACHE_HITS)
                .with_description("Attempts served from the result cache")
                .build(),
            escalations: meter
                .u64_counter(ESCALATIONS)
                .with_description("Tier escalations")
                .build(),
            execution_duration: meter
                .f64_histogram(EXECUTION_DURATION)
                .with_unit("s")
                .with_description("Executor call duration")
                .build(),
        }
    }

    pub fn record_spend(&self, cost: f64, backend: &str, task_type: &str) {
        self.spend.add(cost, &attributes(backend, task_type));
    }

    pub fn record_cache_hit(&self, backend: &str, task_type: &str) {
        self.cache_hits.add(1, &attributes(backend, task_type));
    }

    pub fn record_escalation(&self, from: &str, to: &str) {
        self.escalations
            .add(1, &[KeyValue::new("from_tier", from.to_string()), KeyValue::new("to_tier", to.to_string())]);
    }

    pub fn record_execution(&self, elapsed: Duration, backend: &str, task_type: &str, success: bool) {
        let mut attrs = attributes(backend, task_type).to_vec();
        attrs.push(KeyValue::new("success", success));
        self.execution_duration.record(elapsed.as_secs_f64(), &attrs);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}

fn attributes(backend: &str, task_type: &str) -> [KeyValue; 2] {
    [
        KeyValue::new("backend", backend.to_string()),
        KeyValue::new("task_type", task_type.to_string()),
    ]
}
