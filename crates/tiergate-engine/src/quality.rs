use tiergate_config::QualityConfig;

use crate::{
    executor::ExecutionOutcome,
    parse::{DEFAULT_CONFIDENCE, DEFAULT_REPORTED_COST, parse_confidence, parse_dollars},
};

/// Scores executor outputs against per-task completeness checks
#[derive(Debug, Clone, Default)]
pub struct QualityEvaluator {
    config: QualityConfig,
}

impl QualityEvaluator {
    pub const fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Quality in `[0, 1]`
    ///
    /// A failed outcome scores 0. Task types with required fields score the
    /// fraction of those fields that are present and non-blank; others are
    /// checked for any content and for a minimum combined length. A
    /// self-reported confidence caps the score, and one that cannot be read
    /// caps it at 0.5.
    pub fn evaluate(&self, task_type: &str, outcome: &ExecutionOutcome) -> f64 {
        if !outcome.success {
            return 0.0;
        }

        let required = self.config.required_for(task_type);
        let score = if required.is_empty() {
            self.generic_score(outcome)
        } else {
            let present = required
                .iter()
                .filter(|field| outcome.outputs.get(*field).is_some_and(|v| !v.trim().is_empty()))
                .count();
            present as f64 / required.len() as f64
        };

        match outcome.outputs.get(&self.config.confidence_field) {
            Some(raw) => score.min(parse_confidence(raw).unwrap_or(DEFAULT_CONFIDENCE)),
            None => score,
        }
    }

    /// Cost the executor reported, if it reported one
    ///
    /// A cost field that cannot be parsed counts as a flat $0.02.
    pub fn reported_cost(&self, outcome: &ExecutionOutcome) -> Option<f64> {
        outcome
            .outputs
            .get(&self.config.cost_field)
            .map(|raw| parse_dollars(raw).unwrap_or(DEFAULT_REPORTED_COST))
    }

    fn generic_score(&self, outcome: &ExecutionOutcome) -> f64 {
        let content: Vec<&str> = outcome
            .outputs
            .iter()
            .filter(|(name, _)| **name != self.config.confidence_field && **name != self.config.cost_field)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .collect();

        let chars: usize = content.iter().map(|v| v.chars().count()).sum();
        let checks = [!content.is_empty(), chars >= self.config.min_content_chars];

        checks.iter().filter(|ok| **ok).count() as f64 / checks.len() as f64
    }
}
