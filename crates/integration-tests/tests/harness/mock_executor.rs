//! Scripted task executor for integration tests
//!
//! Responds from a closure and counts every call, so tests can assert both
//! what the controller returned and how often the executor was reached.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tiergate_core::{Outputs, Tier};
use tiergate_engine::{ExecutionOutcome, ExecutionRequest, TaskExecutor};

type Responder = dyn Fn(&ExecutionRequest<'_>) -> ExecutionOutcome + Send + Sync;

/// Mock executor with call counters
pub struct MockExecutor {
    responder: Box<Responder>,
    delay: Option<Duration>,
    reported_cost: Option<String>,
    calls: AtomicU32,
    seen: Mutex<Vec<(Tier, String)>>,
}

impl MockExecutor {
    pub fn new(responder: impl Fn(&ExecutionRequest<'_>) -> ExecutionOutcome + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            reported_cost: None,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns a complete fix
    pub fn complete() -> Self {
        Self::new(|_| ExecutionOutcome::success(complete_fix()))
    }

    /// Empty outputs below `tier`, a complete fix from `tier` upwards
    pub fn incomplete_below(tier: Tier) -> Self {
        Self::new(move |request| {
            if request.tier < tier {
                ExecutionOutcome::success(Outputs::new())
            } else {
                ExecutionOutcome::success(complete_fix())
            }
        })
    }

    /// Every call returns only half of the required fields
    pub fn half_complete() -> Self {
        Self::new(|_| {
            ExecutionOutcome::success(Outputs::from([("fixed_output".to_owned(), "y = 1".to_owned())]))
        })
    }

    /// Every call fails with `error`
    pub fn failing(error: &'static str) -> Self {
        Self::new(move |_| ExecutionOutcome::failure(error))
    }

    /// Sleep before answering, to keep calls in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a `cost` output to every successful response
    pub fn with_reported_cost(mut self, cost: &str) -> Self {
        self.reported_cost = Some(cost.to_owned());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Tiers reached, in call order
    pub fn tiers_seen(&self) -> Vec<Tier> {
        self.seen.lock().unwrap().iter().map(|(tier, _)| *tier).collect()
    }

    /// Backends called, in call order
    pub fn backends_seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(_, id)| id.clone()).collect()
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((request.tier, request.backend.id.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut outcome = (self.responder)(request);
        if let (true, Some(cost)) = (outcome.success, &self.reported_cost) {
            outcome.outputs.insert("cost".to_owned(), cost.clone());
        }
        outcome
    }
}

fn complete_fix() -> Outputs {
    Outputs::from([
        ("fixed_output".to_owned(), "y = 1\nprint(y)".to_owned()),
        ("explanation".to_owned(), "y was used before assignment".to_owned()),
    ])
}
