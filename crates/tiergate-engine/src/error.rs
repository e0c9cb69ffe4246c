use thiserror::Error;
use tiergate_core::Tier;

/// Errors surfaced by the escalation controller
///
/// Every variant carries the tier the request had reached and what it had
/// already spent, so callers can account for partial work.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The daily budget cannot cover the next attempt and nothing usable was produced
    #[error("budget exceeded at {tier} tier after spending ${cost_spent:.4}: {detail}")]
    BudgetExceeded { tier: Tier, cost_spent: f64, detail: String },

    /// No backend scored above zero and the fallback chain is unusable
    #[error("no backend available at {tier} tier after spending ${cost_spent:.4}: {detail}")]
    NoBackendAvailable { tier: Tier, cost_spent: f64, detail: String },

    /// The final attempt's executor call failed
    #[error("execution failed at {tier} tier after spending ${cost_spent:.4}: {detail}")]
    ExecutionFailed { tier: Tier, cost_spent: f64, detail: String },

    /// No executor is registered for the task type
    #[error("no executor registered for task type: {task_type}")]
    NoExecutor { task_type: String },

    /// Shutdown was requested before a usable result was produced
    #[error("cancelled at {tier} tier after spending ${cost_spent:.4}")]
    Cancelled { tier: Tier, cost_spent: f64 },
}

impl EngineError {
    /// Whether running the same request again later may succeed
    ///
    /// Executor failures and budget exhaustion are transient (a flaky
    /// backend, a new day); configuration problems are not.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExecutionFailed { .. } | Self::BudgetExceeded { .. } | Self::NoBackendAvailable { .. }
        )
    }

    /// Total spend recorded before the error
    pub const fn cost_spent(&self) -> f64 {
        match self {
            Self::BudgetExceeded { cost_spent, .. }
            | Self::NoBackendAvailable { cost_spent, .. }
            | Self::ExecutionFailed { cost_spent, .. }
            | Self::Cancelled { cost_spent, .. } => *cost_spent,
            Self::NoExecutor { .. } => 0.0,
        }
    }
}
