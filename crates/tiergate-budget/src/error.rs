use thiserror::Error;

/// Errors from budget operations
#[derive(Debug, Error)]
pub enum BudgetError {
    /// The request would push spend past the daily cap
    #[error("daily budget exceeded: requested ${requested:.4}, remaining ${remaining:.4}")]
    Exceeded { requested: f64, remaining: f64 },

    /// Negative, NaN, or infinite amounts are never recorded
    #[error("invalid cost amount: {0}")]
    InvalidAmount(f64),
}
