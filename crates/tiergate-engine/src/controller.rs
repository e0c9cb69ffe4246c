//! Tier escalation
//!
//! A request starts at a tier picked from its urgency and quality needs and
//! moves up one tier at a time while the result falls short of the quality
//! threshold. Every attempt goes through the same pipeline:
//!
//! 1. compress inputs to the tier's token ceiling
//! 2. select a backend
//! 3. take the per-key cache lock and look for a cached result
//! 4. reserve the estimated cost (abort when the budget cannot cover it)
//! 5. run the executor under the tier timeout
//! 6. score the result, settle the reservation, record history, cache it

use std::time::{Duration, Instant};

use serde::Serialize;
use tiergate_config::{Config, EscalationConfig};
use tiergate_core::{Outputs, Params, Tier, Urgency, tokens_from_bytes};
use tiergate_routing::{BackendDescriptor, ExecutionSample, Selection};
use tiergate_telemetry::EngineMetrics;
use tokio_util::sync::CancellationToken;

use crate::{
    compress::compress_params,
    error::EngineError,
    executor::{ExecutionOutcome, ExecutionRequest, ExecutorRegistry},
    quality::QualityEvaluator,
    services::Services,
    stats::{EngineStats, StatsRecorder},
};

/// Quality requirement assumed when the caller does not give one
pub const DEFAULT_QUALITY_REQUIREMENT: f64 = 0.7;

/// Task types that start cheap unless high quality is asked for
const INSPECTION_TASKS: &[&str] = &["analyze", "review"];

/// One unit of work submitted to the controller
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task_type: String,
    pub params: Params,
    /// Quality the caller needs, in `[0, 1]`; picks the starting tier only,
    /// acceptance is judged against `escalation.quality_threshold`
    pub quality_requirement: f64,
    pub urgency: Urgency,
    /// Skip the starting-tier heuristic
    pub start_tier: Option<Tier>,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>, params: Params) -> Self {
        Self {
            task_type: task_type.into(),
            params,
            quality_requirement: DEFAULT_QUALITY_REQUIREMENT,
            urgency: Urgency::Normal,
            start_tier: None,
        }
    }

    #[must_use]
    pub const fn with_quality(mut self, quality_requirement: f64) -> Self {
        self.quality_requirement = quality_requirement;
        self
    }

    #[must_use]
    pub const fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    #[must_use]
    pub const fn starting_at(mut self, tier: Tier) -> Self {
        self.start_tier = Some(tier);
        self
    }
}

/// What happened on one tier
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub tier: Tier,
    pub backend_id: String,
    pub quality: f64,
    pub cost: f64,
    pub cached: bool,
    pub success: bool,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final result of a request
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    /// Outputs of the best attempt
    pub outputs: Outputs,
    pub quality: f64,
    /// Tier that produced `outputs`
    pub tier: Tier,
    /// Highest tier attempted
    pub tier_reached: Tier,
    pub backend_id: String,
    pub escalation_used: bool,
    /// Budget or backend exhaustion stopped escalation before the threshold was met
    pub possibly_suboptimal: bool,
    /// Quality met the threshold
    pub accepted: bool,
    pub from_cache: bool,
    pub cost_spent: f64,
    pub attempts: Vec<AttemptRecord>,
}

/// Starting tier for a request
///
/// High urgency or a requirement above 0.9 goes straight to
/// `Comprehensive`; analysis and review below 0.8 start at `Quick`;
/// everything else starts at `Detailed`.
pub fn initial_tier(task_type: &str, quality_requirement: f64, urgency: Urgency) -> Tier {
    if urgency.is_high() || quality_requirement > 0.9 {
        Tier::Comprehensive
    } else if INSPECTION_TASKS.contains(&task_type) && quality_requirement < 0.8 {
        Tier::Quick
    } else {
        Tier::Detailed
    }
}

struct Attempt {
    record: AttemptRecord,
    outputs: Outputs,
}

/// Per-request bookkeeping
struct Run {
    tier_reached: Tier,
    attempts: Vec<AttemptRecord>,
    cost_spent: f64,
    escalations: u32,
    best: Option<Best>,
}

struct Best {
    outputs: Outputs,
    quality: f64,
    tier: Tier,
    backend_id: String,
    from_cache: bool,
}

impl Run {
    const fn new(tier: Tier) -> Self {
        Self {
            tier_reached: tier,
            attempts: Vec::new(),
            cost_spent: 0.0,
            escalations: 0,
            best: None,
        }
    }

    fn push(&mut self, attempt: Attempt) {
        let Attempt { record, outputs } = attempt;
        self.cost_spent += record.cost;
        self.tier_reached = self.tier_reached.max(record.tier);

        // Later tiers win ties
        if record.success && self.best.as_ref().is_none_or(|best| record.quality >= best.quality) {
            self.best = Some(Best {
                outputs,
                quality: record.quality,
                tier: record.tier,
                backend_id: record.backend_id.clone(),
                from_cache: record.cached,
            });
        }

        self.attempts.push(record);
    }

    fn last_error(&self) -> String {
        self.attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_else(|| "no attempt produced a result".to_string())
    }

    fn finish(self, accepted: bool, possibly_suboptimal: bool) -> Result<TaskOutcome, EngineError> {
        let Some(best) = self.best else {
            return Err(EngineError::ExecutionFailed {
                tier: self.tier_reached,
                cost_spent: self.cost_spent,
                detail: self.last_error(),
            });
        };

        Ok(TaskOutcome {
            outputs: best.outputs,
            quality: best.quality,
            tier: best.tier,
            tier_reached: self.tier_reached,
            backend_id: best.backend_id,
            escalation_used: self.escalations > 0,
            possibly_suboptimal,
            accepted,
            from_cache: best.from_cache,
            cost_spent: self.cost_spent,
            attempts: self.attempts,
        })
    }

    /// Stop early on `error`, keeping the best result if there is one
    fn abort(self, error: EngineError) -> Result<TaskOutcome, EngineError> {
        if self.best.is_some() {
            tracing::warn!(error = %error, "stopping early with best result so far");
            self.finish(false, true)
        } else {
            Err(error)
        }
    }
}

/// Runs requests through the tiers
pub struct EscalationController {
    services: Services,
    executors: ExecutorRegistry,
    escalation: EscalationConfig,
    min_call_cost: f64,
    evaluator: QualityEvaluator,
    metrics: EngineMetrics,
    stats: StatsRecorder,
    shutdown: CancellationToken,
}

impl EscalationController {
    pub fn new(config: &Config, services: Services, executors: ExecutorRegistry) -> Self {
        Self {
            services,
            executors,
            escalation: config.escalation.clone(),
            min_call_cost: config.budget.min_call_cost,
            evaluator: QualityEvaluator::new(config.quality.clone()),
            metrics: EngineMetrics::new(),
            stats: StatsRecorder::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop starting new tiers once `token` is cancelled
    ///
    /// A call already running is allowed to finish and its cost is recorded.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub const fn services(&self) -> &Services {
        &self.services
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// Run a request, escalating until the result is good enough or a limit is hit
    ///
    /// # Errors
    ///
    /// Fails when no attempt produced a usable result: the budget ran out,
    /// no backend was usable, the executor failed, or shutdown was requested.
    /// Every error carries the tier reached and the cost already spent.
    #[tracing::instrument(name = "task", skip_all, fields(task_type = %request.task_type))]
    pub async fn execute(&self, request: TaskRequest) -> Result<TaskOutcome, EngineError> {
        self.stats.request();

        let mut tier = request
            .start_tier
            .unwrap_or_else(|| initial_tier(&request.task_type, request.quality_requirement, request.urgency));
        let mut run = Run::new(tier);

        tracing::info!(
            %tier,
            quality_requirement = request.quality_requirement,
            urgency = ?request.urgency,
            "starting task"
        );

        loop {
            if self.shutdown.is_cancelled() {
                tracing::warn!(%tier, "shutdown requested, not starting another tier");
                let cost_spent = run.cost_spent;
                return run.abort(EngineError::Cancelled { tier, cost_spent });
            }

            let attempt = match self.attempt(&request, tier, run.cost_spent).await {
                Ok(attempt) => attempt,
                Err(e) => {
                    if matches!(e, EngineError::BudgetExceeded { .. }) {
                        self.stats.budget_abort();
                    }
                    run.tier_reached = run.tier_reached.max(tier);
                    return run.abort(e);
                }
            };

            let quality = attempt.record.quality;
            run.push(attempt);

            if quality >= self.escalation.quality_threshold {
                tracing::info!(%tier, quality, cost_spent = run.cost_spent, "result accepted");
                return run.finish(true, false);
            }

            let Some(next) = tier.next() else {
                tracing::info!(%tier, quality, "highest tier reached below threshold");
                return run.finish(false, false);
            };

            if run.escalations >= self.escalation.max_escalations {
                tracing::info!(%tier, quality, escalations = run.escalations, "escalation limit reached");
                return run.finish(false, false);
            }

            let next_cost = self.next_tier_estimate(&request, next);
            if !self.services.ledger.can_afford(next_cost) {
                tracing::warn!(
                    %tier,
                    next = %next,
                    next_cost,
                    remaining = self.services.ledger.remaining_budget(),
                    "budget cannot cover the next tier"
                );
                self.stats.budget_abort();
                return run.finish(false, true);
            }

            tracing::info!(from = %tier, to = %next, quality, threshold = self.escalation.quality_threshold, "escalating");
            self.stats.escalation();
            self.metrics.record_escalation(tier.as_str(), next.as_str());
            run.escalations += 1;
            tier = next;
        }
    }

    /// What an attempt on `backend` holds against the budget
    fn reserve_estimate(&self, backend: &BackendDescriptor, selection: &Selection) -> f64 {
        if backend.is_paid() {
            selection.estimated_cost.max(self.min_call_cost)
        } else {
            0.0
        }
    }

    /// Cost the next tier would reserve on the backend it would pick
    ///
    /// Falls back to the tier's configured cost target when no backend can
    /// be previewed.
    fn next_tier_estimate(&self, request: &TaskRequest, next: Tier) -> f64 {
        let (complexity, quality_target) = self.escalation.tiers.get(next).preference.selection_targets();
        let selector = &self.services.selector;

        selector
            .preview(
                &request.task_type,
                complexity,
                quality_target,
                self.services.ledger.remaining_budget(),
                request.urgency,
            )
            .ok()
            .and_then(|selection| {
                selector
                    .catalog()
                    .get(&selection.backend_id)
                    .map(|backend| self.reserve_estimate(backend, &selection))
            })
            .unwrap_or_else(|| self.escalation.tiers.get(next).cost_target)
    }

    async fn attempt(&self, request: &TaskRequest, tier: Tier, cost_spent: f64) -> Result<Attempt, EngineError> {
        let task_type = request.task_type.as_str();
        let limits = self.escalation.tiers.get(tier);
        let params = compress_params(&request.params, limits.max_tokens, limits.preference);

        let (complexity, quality_target) = limits.preference.selection_targets();
        let selector = &self.services.selector;
        let selection = selector
            .select(
                task_type,
                complexity,
                quality_target,
                self.services.ledger.remaining_budget(),
                request.urgency,
            )
            .map_err(|e| EngineError::NoBackendAvailable {
                tier,
                cost_spent,
                detail: e.to_string(),
            })?;

        let backend = selector
            .catalog()
            .get(&selection.backend_id)
            .ok_or_else(|| EngineError::NoBackendAvailable {
                tier,
                cost_spent,
                detail: format!("selected backend {} is not in the catalog", selection.backend_id),
            })?;

        // Each tier asks a different question of the backend, so it has its own entries
        let signature = format!("{task_type}/{tier}");
        let cache = &self.services.cache;
        let _key = cache.lock_key(&signature, &params, &backend.id).await;

        if let Some(outputs) = cache.get(&signature, &params, &backend.id) {
            let outcome = ExecutionOutcome::success(outputs);
            let quality = self.evaluator.evaluate(task_type, &outcome);

            self.stats.attempt(true);
            self.metrics.record_cache_hit(&backend.id, task_type);
            tracing::info!(%tier, backend = %backend.id, quality, "served from cache");

            return Ok(Attempt {
                record: AttemptRecord {
                    tier,
                    backend_id: backend.id.clone(),
                    quality,
                    cost: 0.0,
                    cached: true,
                    success: true,
                    elapsed_secs: 0.0,
                    error: None,
                },
                outputs: outcome.outputs,
            });
        }

        let Some(executor) = self.executors.get(task_type) else {
            return Err(EngineError::NoExecutor {
                task_type: task_type.to_string(),
            });
        };

        let estimate = self.reserve_estimate(backend, &selection);
        let reservation = self
            .services
            .ledger
            .try_reserve(estimate)
            .map_err(|e| EngineError::BudgetExceeded {
                tier,
                cost_spent,
                detail: e.to_string(),
            })?;

        let started = Instant::now();
        let exec_request = ExecutionRequest {
            task_type,
            params: &params,
            tier,
            limits,
            backend,
        };
        let call = executor.execute(&exec_request);
        let outcome = tokio::time::timeout(limits.timeout, call)
            .await
            .unwrap_or_else(|_| ExecutionOutcome::failure(format!("timed out after {:?}", limits.timeout)));
        let elapsed = started.elapsed();

        let quality = self.evaluator.evaluate(task_type, &outcome);
        let cost = if outcome.success {
            self.actual_cost(backend, &params, &outcome)
        } else {
            estimate
        };

        if let Err(e) = reservation.settle(cost) {
            tracing::warn!(error = %e, cost, "could not settle reservation with actual cost");
        }

        selector.history().record(
            &backend.id,
            task_type,
            &ExecutionSample {
                success: outcome.success,
                quality,
                elapsed,
                cost,
            },
        );

        if outcome.success {
            cache.put(&signature, &params, outcome.outputs.clone(), &backend.id);
        } else {
            self.stats.executor_failure();
            tracing::warn!(%tier, backend = %backend.id, error = ?outcome.error, "executor failed");
        }

        self.stats.attempt(false);
        self.stats.spend(cost);
        if cost > 0.0 {
            self.metrics.record_spend(cost, &backend.id, task_type);
        }
        self.metrics
            .record_execution(elapsed, &backend.id, task_type, outcome.success);

        tracing::info!(
            %tier,
            backend = %backend.id,
            quality,
            cost,
            elapsed_ms = duration_millis(elapsed),
            success = outcome.success,
            "attempt finished"
        );

        Ok(Attempt {
            record: AttemptRecord {
                tier,
                backend_id: backend.id.clone(),
                quality,
                cost,
                cached: false,
                success: outcome.success,
                elapsed_secs: elapsed.as_secs_f64(),
                error: outcome.error,
            },
            outputs: outcome.outputs,
        })
    }

    /// Cost of a successful call
    ///
    /// Free backends cost nothing. Paid backends use the executor's reported
    /// cost, falling back to a byte-length token estimate, and never go below
    /// the minimum call cost.
    fn actual_cost(&self, backend: &BackendDescriptor, params: &Params, outcome: &ExecutionOutcome) -> f64 {
        if !backend.is_paid() {
            return 0.0;
        }

        let cost = self.evaluator.reported_cost(outcome).unwrap_or_else(|| {
            let input_bytes = serde_json::to_vec(params).map_or(0, |raw| raw.len());
            let output_bytes: usize = outcome.outputs.values().map(String::len).sum();
            backend.estimate_cost(tokens_from_bytes(input_bytes), tokens_from_bytes(output_bytes))
        });

        cost.max(self.min_call_cost)
    }
}

fn duration_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for EscalationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationController")
            .field("executors", &self.executors)
            .field("quality_threshold", &self.escalation.quality_threshold)
            .field("max_escalations", &self.escalation.max_escalations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use tiergate_routing::StaticAvailability;

    use super::*;
    use crate::executor::TaskExecutor;

    const CONFIG: &str = r#"
[routing]
fallback_chain = ["local"]

[routing.backends.local]
class = "local_free"
quality = 0.65
speed = 0.9
"#;

    /// Empty outputs on the quick tier, complete ones above it
    struct QuickIsIncomplete {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaskExecutor for QuickIsIncomplete {
        async fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.tier == Tier::Quick {
                return ExecutionOutcome::success(Outputs::new());
            }
            ExecutionOutcome::success(Outputs::from([
                ("fixed_output".to_string(), "x = 2".to_string()),
                ("explanation".to_string(), "off by one".to_string()),
            ]))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskExecutor for AlwaysFails {
        async fn execute(&self, _request: &ExecutionRequest<'_>) -> ExecutionOutcome {
            ExecutionOutcome::failure("backend refused")
        }
    }

    fn controller(executors: ExecutorRegistry) -> EscalationController {
        let config = Config::from_toml_str(CONFIG).unwrap();
        let services = Services::in_memory(&config, Arc::new(StaticAvailability::new(["local"])));
        EscalationController::new(&config, services, executors)
    }

    fn fix_request() -> TaskRequest {
        let params = Params::from_iter([("code".to_string(), serde_json::json!("x = 1"))]);
        TaskRequest::new("fix", params)
    }

    #[test]
    fn initial_tier_follows_urgency_and_quality() {
        assert_eq!(initial_tier("fix", 0.7, Urgency::High), Tier::Comprehensive);
        assert_eq!(initial_tier("fix", 0.95, Urgency::Normal), Tier::Comprehensive);
        assert_eq!(initial_tier("analyze", 0.7, Urgency::Normal), Tier::Quick);
        assert_eq!(initial_tier("review", 0.8, Urgency::Low), Tier::Detailed);
        assert_eq!(initial_tier("fix", 0.7, Urgency::Normal), Tier::Detailed);
    }

    #[tokio::test]
    async fn incomplete_quick_result_escalates_to_detailed() {
        let executor = Arc::new(QuickIsIncomplete {
            calls: AtomicUsize::new(0),
        });
        let controller = controller(ExecutorRegistry::new().register("fix", executor.clone()));

        let outcome = controller
            .execute(fix_request().starting_at(Tier::Quick))
            .await
            .unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.attempts[0].tier, Tier::Quick);
        assert!(outcome.attempts[0].quality.abs() < f64::EPSILON);
        assert_eq!(outcome.tier, Tier::Detailed);
        assert!(outcome.accepted);
        assert!(outcome.escalation_used);
        assert!(outcome.cost_spent.abs() < f64::EPSILON);
        assert_eq!(controller.stats().escalations, 1);
    }

    #[tokio::test]
    async fn final_failure_surfaces_last_error() {
        let controller = controller(ExecutorRegistry::new().with_default(Arc::new(AlwaysFails)));

        let err = controller
            .execute(fix_request().with_urgency(Urgency::High))
            .await
            .unwrap_err();

        match err {
            EngineError::ExecutionFailed { tier, ref detail, .. } => {
                assert_eq!(tier, Tier::Comprehensive);
                assert!(detail.contains("backend refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
        assert_eq!(controller.stats().executor_failures, 1);
    }

    #[tokio::test]
    async fn missing_executor_is_reported() {
        let controller = controller(ExecutorRegistry::new());

        let err = controller.execute(fix_request()).await.unwrap_err();

        assert!(matches!(err, EngineError::NoExecutor { ref task_type } if task_type == "fix"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let executor = Arc::new(QuickIsIncomplete {
            calls: AtomicUsize::new(0),
        });
        let token = CancellationToken::new();
        token.cancel();
        let controller = controller(ExecutorRegistry::new().register("fix", executor.clone())).with_shutdown(token);

        let err = controller.execute(fix_request()).await.unwrap_err();

        assert!(matches!(err, EngineError::Cancelled { .. }));
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
