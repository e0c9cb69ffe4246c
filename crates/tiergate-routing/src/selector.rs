//! Scored backend selection

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tiergate_config::{RoutingConfig, SelectorWeights};
use tiergate_core::Urgency;

use crate::{
    availability::AvailabilityProbe,
    catalog::{BackendCatalog, BackendDescriptor},
    error::RoutingError,
    history::{PerformanceAggregate, PerformanceHistory},
};

/// Scores closer than this are treated as equal
const TIE_EPSILON: f64 = 1e-12;

/// What a single selection is scored against
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub task_type: &'a str,
    /// Expected task complexity (0.0 to 1.0), drives the cost estimate
    pub complexity: f64,
    pub quality_requirement: f64,
    pub remaining_budget: f64,
    pub urgency: Urgency,
}

/// Why the returned backend was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Highest positive score
    Scored,
    /// Nothing scored above zero; taken from the fallback chain
    Fallback,
}

/// Result of a selection
#[derive(Debug, Clone)]
pub struct Selection {
    pub backend_id: String,
    pub score: f64,
    pub estimated_cost: f64,
    pub reason: SelectionReason,
    /// Other viable backends, best first
    pub alternatives: Vec<String>,
}

/// Observable selector counters; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectorStats {
    pub current_backend: Option<String>,
    pub switches: u64,
    pub selections: u64,
    pub available_backends: usize,
}

#[derive(Default)]
struct SelectorState {
    current: Option<String>,
    switches: u64,
    selections: u64,
}

/// Score one backend
///
/// Starts from the static quality, adds the specialization bonus, the fit
/// `1 - |quality - requirement|`, the urgency speed bonus, and the history
/// bonus, then penalizes paid backends whose estimate is a large share of
/// the remaining budget. Unavailable backends, and paid ones when the
/// budget is spent, score zero.
pub fn score_backend(
    backend: &BackendDescriptor,
    ctx: &ScoreContext<'_>,
    history: Option<&PerformanceAggregate>,
    available: bool,
    weights: &SelectorWeights,
) -> f64 {
    if !available {
        return 0.0;
    }

    let mut score = backend.quality;

    if backend.specializes_in(ctx.task_type) {
        score += weights.specialization_bonus;
    }

    score += 1.0 - (backend.quality - ctx.quality_requirement).abs();

    if ctx.urgency.is_high() {
        score += weights.speed_weight * backend.speed;
    }

    if let Some(agg) = history.filter(|agg| agg.runs > 0) {
        score += weights.history_weight * (agg.success_rate() + agg.avg_quality());
    }

    if backend.is_paid() {
        if ctx.remaining_budget <= 0.0 {
            return 0.0;
        }

        let cost = backend.estimate_task_cost(ctx.complexity);
        let ratio = cost / ctx.remaining_budget.max(weights.budget_epsilon);
        if ratio > weights.cost_ratio_threshold {
            score -= weights.cost_penalty * ratio;
        }
    }

    score
}

/// Picks a backend for each attempt
pub struct BackendSelector {
    catalog: Arc<BackendCatalog>,
    history: Arc<PerformanceHistory>,
    availability: Arc<dyn AvailabilityProbe>,
    weights: SelectorWeights,
    fallback_chain: Vec<String>,
    state: Mutex<SelectorState>,
}

impl BackendSelector {
    pub fn new(
        config: &RoutingConfig,
        catalog: Arc<BackendCatalog>,
        history: Arc<PerformanceHistory>,
        availability: Arc<dyn AvailabilityProbe>,
    ) -> Self {
        Self {
            catalog,
            history,
            availability,
            weights: config.weights.clone(),
            fallback_chain: config.fallback_chain.clone(),
            state: Mutex::new(SelectorState::default()),
        }
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &PerformanceHistory {
        &self.history
    }

    pub fn is_available(&self, backend: &BackendDescriptor) -> bool {
        self.availability.is_available(backend)
    }

    /// Choose the best backend for a request
    ///
    /// Ties go to the cheaper estimate, then to declaration order.
    pub fn select(
        &self,
        task_type: &str,
        complexity: f64,
        quality_requirement: f64,
        remaining_budget: f64,
        urgency: Urgency,
    ) -> Result<Selection, RoutingError> {
        let selection = self.preview(task_type, complexity, quality_requirement, remaining_budget, urgency)?;

        self.note_selection(&selection.backend_id);

        tracing::info!(
            backend = %selection.backend_id,
            score = selection.score,
            estimated_cost = selection.estimated_cost,
            reason = ?selection.reason,
            task_type,
            remaining_budget,
            "backend selected"
        );

        Ok(selection)
    }

    /// Same choice as [`BackendSelector::select`] without touching the
    /// current-backend and switch counters
    pub fn preview(
        &self,
        task_type: &str,
        complexity: f64,
        quality_requirement: f64,
        remaining_budget: f64,
        urgency: Urgency,
    ) -> Result<Selection, RoutingError> {
        let ctx = ScoreContext {
            task_type,
            complexity,
            quality_requirement,
            remaining_budget,
            urgency,
        };

        let mut scored: Vec<(&BackendDescriptor, f64, f64)> = Vec::with_capacity(self.catalog.len());
        for backend in self.catalog.iter() {
            let history = self.history.aggregate(&backend.id, task_type);
            let score = score_backend(backend, &ctx, history.as_ref(), self.is_available(backend), &self.weights);

            tracing::trace!(backend = %backend.id, score, "backend scored");

            if score > 0.0 {
                scored.push((backend, score, backend.estimate_task_cost(complexity)));
            }
        }

        match best_candidate(&scored) {
            Some(best) => {
                let (backend, score, estimated_cost) = scored[best];
                let mut others: Vec<_> = scored.iter().enumerate().filter(|(i, _)| *i != best).collect();
                others.sort_by(|a, b| b.1.1.total_cmp(&a.1.1));

                Ok(Selection {
                    backend_id: backend.id.clone(),
                    score,
                    estimated_cost,
                    reason: SelectionReason::Scored,
                    alternatives: others.into_iter().map(|(_, c)| c.0.id.clone()).collect(),
                })
            }
            None => self.fallback(task_type, complexity),
        }
    }

    pub fn stats(&self) -> SelectorStats {
        let state = self.state();
        SelectorStats {
            current_backend: state.current.clone(),
            switches: state.switches,
            selections: state.selections,
            available_backends: self.catalog.iter().filter(|b| self.is_available(b)).count(),
        }
    }

    /// First usable entry of the fallback chain
    pub(crate) fn fallback_backend(&self) -> Option<&BackendDescriptor> {
        self.fallback_chain
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .find(|backend| self.is_available(backend))
    }

    fn fallback(&self, task_type: &str, complexity: f64) -> Result<Selection, RoutingError> {
        let backend = self.fallback_backend().ok_or_else(|| {
            tracing::warn!(task_type, "no backend scored above zero and the fallback chain is unusable");
            RoutingError::NoBackendAvailable {
                task_type: task_type.to_string(),
            }
        })?;

        tracing::warn!(backend = %backend.id, task_type, "no backend scored above zero, using fallback");

        Ok(Selection {
            backend_id: backend.id.clone(),
            score: 0.0,
            estimated_cost: backend.estimate_task_cost(complexity),
            reason: SelectionReason::Fallback,
            alternatives: Vec::new(),
        })
    }

    fn note_selection(&self, backend_id: &str) {
        let mut state = self.state();
        state.selections += 1;
        if state.current.as_deref() != Some(backend_id) {
            if state.current.is_some() {
                state.switches += 1;
            }
            state.current = Some(backend_id.to_string());
        }
    }

    fn state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("backends", &self.catalog.len())
            .field("fallback_chain", &self.fallback_chain)
            .finish_non_exhaustive()
    }
}

/// Index of the highest score; equal scores prefer the lower cost, then
/// the earlier entry
fn best_candidate(scored: &[(&BackendDescriptor, f64, f64)]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (i, &(_, score, cost)) in scored.iter().enumerate() {
        let Some(current) = best else {
            best = Some(i);
            continue;
        };
        let (_, best_score, best_cost) = scored[current];

        let better = if (score - best_score).abs() <= TIE_EPSILON {
            cost < best_cost
        } else {
            score > best_score
        };
        if better {
            best = Some(i);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tiergate_core::{BackendClass, MemoryStore, TokenRates};

    use super::*;
    use crate::{ExecutionSample, StaticAvailability};

    fn backend(id: &str, class: BackendClass, rates: (f64, f64), quality: f64, speed: f64) -> BackendDescriptor {
        BackendDescriptor {
            id: id.to_string(),
            class,
            rates: TokenRates::new(rates.0, rates.1),
            max_output_tokens: 8192,
            quality,
            speed,
            specializations: Vec::new(),
            credential_env: None,
            health_url: None,
        }
    }

    fn default_catalog() -> Vec<BackendDescriptor> {
        let mut coder = backend("ollama/qwen2.5-coder", BackendClass::LocalFree, (0.0, 0.0), 0.7, 0.9);
        coder.specializations = vec!["code".into(), "analysis".into()];
        let mut llama = backend("ollama/llama3.2", BackendClass::LocalFree, (0.0, 0.0), 0.65, 0.8);
        llama.specializations = vec!["general".into(), "analysis".into()];
        let mut sonnet = backend("claude-3.5-sonnet", BackendClass::Premium, (3.0, 15.0), 0.95, 0.7);
        sonnet.specializations = vec!["code".into(), "analysis".into(), "architecture".into()];

        vec![
            coder,
            llama,
            backend("gemini-2.0-flash-lite", BackendClass::Cheap, (0.075, 0.3), 0.75, 0.95),
            backend("claude-3.5-haiku", BackendClass::Balanced, (1.0, 5.0), 0.85, 0.85),
            sonnet,
            backend("claude-3-opus", BackendClass::Max, (15.0, 75.0), 0.98, 0.5),
        ]
    }

    fn selector_with(backends: Vec<BackendDescriptor>, available: &[&str], fallback: &[&str]) -> BackendSelector {
        let config = RoutingConfig {
            fallback_chain: fallback.iter().map(ToString::to_string).collect(),
            ..RoutingConfig::default()
        };
        BackendSelector::new(
            &config,
            Arc::new(BackendCatalog::new(backends)),
            Arc::new(PerformanceHistory::new(Arc::new(MemoryStore::new()))),
            Arc::new(StaticAvailability::new(available.iter().copied())),
        )
    }

    fn all_available() -> BackendSelector {
        let backends = default_catalog();
        let ids: Vec<String> = backends.iter().map(|b| b.id.clone()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        selector_with(backends, &refs, &["ollama/llama3.2"])
    }

    fn ctx(task_type: &str, quality_requirement: f64, remaining_budget: f64) -> ScoreContext<'_> {
        ScoreContext {
            task_type,
            complexity: 0.5,
            quality_requirement,
            remaining_budget,
            urgency: Urgency::Normal,
        }
    }

    #[test]
    fn score_combines_fit_and_bonuses() {
        let weights = SelectorWeights::default();
        let mut b = backend("local", BackendClass::LocalFree, (0.0, 0.0), 0.7, 0.9);
        b.specializations = vec!["code".into()];

        // 0.7 + 0.1 + (1 - |0.7 - 0.8|)
        let score = score_backend(&b, &ctx("code", 0.8, 1.0), None, true, &weights);
        assert!((score - 1.7).abs() < 1e-9);

        let urgent = ScoreContext {
            urgency: Urgency::High,
            ..ctx("code", 0.8, 1.0)
        };
        let score = score_backend(&b, &urgent, None, true, &weights);
        assert!((score - 1.79).abs() < 1e-9);
    }

    #[test]
    fn history_adds_weighted_bonus() {
        let weights = SelectorWeights::default();
        let b = backend("local", BackendClass::LocalFree, (0.0, 0.0), 0.7, 0.9);
        let history = PerformanceAggregate {
            runs: 4,
            successes: 3,
            quality_sum: 3.0,
            time_sum: 4.0,
            cost_sum: 0.0,
        };

        let without = score_backend(&b, &ctx("fix", 0.7, 1.0), None, true, &weights);
        let with = score_backend(&b, &ctx("fix", 0.7, 1.0), Some(&history), true, &weights);
        // 0.05 * (0.75 + 0.75)
        assert!((with - without - 0.075).abs() < 1e-9);
    }

    #[test]
    fn unavailable_or_unaffordable_scores_zero() {
        let weights = SelectorWeights::default();
        let paid = backend("paid", BackendClass::Premium, (3.0, 15.0), 0.95, 0.7);

        assert!(score_backend(&paid, &ctx("fix", 0.9, 1.0), None, false, &weights).abs() < f64::EPSILON);
        assert!(score_backend(&paid, &ctx("fix", 0.9, 0.0), None, true, &weights).abs() < f64::EPSILON);
        assert!(score_backend(&paid, &ctx("fix", 0.9, -1.0), None, true, &weights).abs() < f64::EPSILON);
    }

    #[test]
    fn expensive_backend_penalized_against_small_budget() {
        let weights = SelectorWeights::default();
        let opus = backend("opus", BackendClass::Max, (15.0, 75.0), 0.98, 0.5);

        let rich = score_backend(&opus, &ctx("fix", 0.95, 10.0), None, true, &weights);
        // 0.0585 estimate against 0.05 remaining: ratio 1.17, penalty 0.351
        let poor = score_backend(&opus, &ctx("fix", 0.95, 0.05), None, true, &weights);
        assert!((rich - poor - 0.351).abs() < 1e-9);
    }

    #[test]
    fn quality_requirement_steers_selection() {
        let selector = all_available();

        let low = selector.select("general", 0.3, 0.6, 3.0, Urgency::Normal).unwrap();
        assert!(low.backend_id.starts_with("ollama/"), "got {}", low.backend_id);

        let high = selector.select("architecture", 0.9, 0.95, 3.0, Urgency::Normal).unwrap();
        assert_eq!(high.backend_id, "claude-3.5-sonnet");
        assert_eq!(high.reason, SelectionReason::Scored);
        assert!(!high.alternatives.is_empty());
    }

    #[test]
    fn selection_is_deterministic() {
        let selector = all_available();
        let first = selector.select("fix", 0.6, 0.8, 1.0, Urgency::Normal).unwrap();

        for _ in 0..10 {
            let again = selector.select("fix", 0.6, 0.8, 1.0, Urgency::Normal).unwrap();
            assert_eq!(again.backend_id, first.backend_id);
            assert!((again.score - first.score).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ties_prefer_cheaper_then_declaration_order() {
        let a = backend("a-free", BackendClass::LocalFree, (0.0, 0.0), 0.8, 0.5);
        let b = backend("b-free", BackendClass::LocalFree, (0.0, 0.0), 0.8, 0.5);
        let selector = selector_with(vec![a, b], &["a-free", "b-free"], &[]);
        assert_eq!(selector.select("t", 0.5, 0.8, 1.0, Urgency::Normal).unwrap().backend_id, "a-free");

        // With a huge budget the paid backend has no penalty and ties on score
        let paid = backend("a-paid", BackendClass::Cheap, (0.01, 0.01), 0.8, 0.5);
        let free = backend("z-free", BackendClass::LocalFree, (0.0, 0.0), 0.8, 0.5);
        let selector = selector_with(vec![paid, free], &["a-paid", "z-free"], &[]);
        assert_eq!(selector.select("t", 0.5, 0.8, 1e6, Urgency::Normal).unwrap().backend_id, "z-free");
    }

    #[test]
    fn config_declaration_order_breaks_ties() {
        let config = tiergate_config::Config::from_toml_str(
            r#"
[routing.backends.zeta]
class = "local_free"
quality = 0.8
speed = 0.5

[routing.backends.alpha]
class = "local_free"
quality = 0.8
speed = 0.5
"#,
        )
        .unwrap();
        let catalog = BackendCatalog::from_config(&config.routing);
        let selector = BackendSelector::new(
            &config.routing,
            Arc::new(catalog),
            Arc::new(PerformanceHistory::new(Arc::new(MemoryStore::new()))),
            Arc::new(StaticAvailability::new(["zeta", "alpha"])),
        );

        assert_eq!(selector.select("t", 0.5, 0.8, 1.0, Urgency::Normal).unwrap().backend_id, "zeta");
    }

    #[test]
    fn preview_leaves_counters_alone() {
        let selector = all_available();
        let preview = selector.preview("general", 0.3, 0.6, 3.0, Urgency::Normal).unwrap();
        assert_eq!(selector.stats().selections, 0);
        assert_eq!(selector.stats().current_backend, None);

        let selection = selector.select("general", 0.3, 0.6, 3.0, Urgency::Normal).unwrap();
        assert_eq!(preview.backend_id, selection.backend_id);
        assert_eq!(selector.stats().selections, 1);
    }

    #[test]
    fn falls_back_when_nothing_scores() {
        let backends = default_catalog();
        let selector = selector_with(backends, &["claude-3.5-haiku"], &["ollama/llama3.2", "claude-3.5-haiku"]);

        // Only a paid backend is available and the budget is spent
        let selection = selector.select("fix", 0.5, 0.8, 0.0, Urgency::Normal).unwrap();
        assert_eq!(selection.backend_id, "claude-3.5-haiku");
        assert_eq!(selection.reason, SelectionReason::Fallback);
    }

    #[test]
    fn no_usable_fallback_is_an_error() {
        let selector = selector_with(default_catalog(), &[], &["ollama/llama3.2"]);
        let err = selector.select("fix", 0.5, 0.8, 1.0, Urgency::Normal).unwrap_err();
        assert!(matches!(err, RoutingError::NoBackendAvailable { task_type } if task_type == "fix"));
    }

    #[test]
    fn history_breaks_otherwise_equal_scores() {
        let a = backend("a", BackendClass::LocalFree, (0.0, 0.0), 0.8, 0.5);
        let b = backend("b", BackendClass::LocalFree, (0.0, 0.0), 0.8, 0.5);
        let selector = selector_with(vec![a, b], &["a", "b"], &[]);

        selector.history().record(
            "b",
            "review",
            &ExecutionSample {
                success: true,
                quality: 1.0,
                elapsed: Duration::from_secs(1),
                cost: 0.0,
            },
        );

        assert_eq!(selector.select("review", 0.5, 0.8, 1.0, Urgency::Normal).unwrap().backend_id, "b");
        assert_eq!(selector.select("fix", 0.5, 0.8, 1.0, Urgency::Normal).unwrap().backend_id, "a");
    }

    #[test]
    fn stats_track_switches() {
        let selector = all_available();
        selector.select("general", 0.3, 0.6, 3.0, Urgency::Normal).unwrap();
        selector.select("general", 0.3, 0.6, 3.0, Urgency::Normal).unwrap();
        selector.select("architecture", 0.9, 0.95, 3.0, Urgency::Normal).unwrap();

        let stats = selector.stats();
        assert_eq!(stats.selections, 3);
        assert_eq!(stats.switches, 1);
        assert_eq!(stats.current_backend.as_deref(), Some("claude-3.5-sonnet"));
        assert_eq!(stats.available_backends, 6);
    }
}
