//! Scenario recommendations
//!
//! Answers "which backend would you use if..." without selecting anything,
//! so it never touches the selector's counters.

use serde::Serialize;

use crate::{catalog::BackendDescriptor, selector::BackendSelector};

/// Complexity assumed when estimating costs for recommendations
const REFERENCE_COMPLEXITY: f64 = 0.5;

/// Added to cost when ranking by quality per dollar, so free backends stay finite
const COST_FLOOR: f64 = 0.01;

/// Suggested backend per scenario; `None` when no available backend fits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    /// Best free backend
    pub cost_optimal: Option<String>,
    /// Best backend whose estimate fits the remaining budget
    pub quality_optimal: Option<String>,
    /// Best quality per estimated dollar among affordable backends
    pub balanced: Option<String>,
    /// First usable fallback, or the first available backend
    pub emergency_fallback: Option<String>,
}

impl BackendSelector {
    pub fn recommend(&self, task_type: &str, remaining_budget: f64) -> Recommendations {
        let available: Vec<&BackendDescriptor> = self.catalog().iter().filter(|b| self.is_available(b)).collect();
        if available.is_empty() {
            return Recommendations::default();
        }

        let fit = |b: &BackendDescriptor| {
            if b.specializes_in(task_type) {
                b.quality + 0.1
            } else {
                b.quality
            }
        };
        let affordable: Vec<_> = available
            .iter()
            .copied()
            .filter(|b| !b.is_paid() || b.estimate_task_cost(REFERENCE_COMPLEXITY) <= remaining_budget)
            .collect();

        Recommendations {
            cost_optimal: first_best(available.iter().copied().filter(|b| !b.is_paid()), fit),
            quality_optimal: first_best(affordable.iter().copied(), fit),
            balanced: first_best(affordable.iter().copied(), |b| {
                b.quality / (b.estimate_task_cost(REFERENCE_COMPLEXITY) + COST_FLOOR)
            }),
            emergency_fallback: self
                .fallback_backend()
                .or_else(|| available.first().copied())
                .map(|b| b.id.clone()),
        }
    }
}

/// Id of the highest-keyed backend, keeping the earliest on ties
fn first_best<'a>(
    backends: impl Iterator<Item = &'a BackendDescriptor>,
    key: impl Fn(&BackendDescriptor) -> f64,
) -> Option<String> {
    backends
        .fold(None::<(&'a BackendDescriptor, f64)>, |best, b| {
            let k = key(b);
            match best {
                Some((_, best_k)) if best_k >= k => best,
                _ => Some((b, k)),
            }
        })
        .map(|(b, _)| b.id.clone())
}
