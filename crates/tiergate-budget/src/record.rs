use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// Persisted daily spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub daily_budget: f64,
    pub current_cost: f64,
    pub calls_made: u64,
    /// Local date the counters were last zeroed
    pub last_reset: Date,
}

impl CostRecord {
    pub const fn fresh(daily_budget: f64, today: Date) -> Self {
        Self {
            daily_budget,
            current_cost: 0.0,
            calls_made: 0,
            last_reset: today,
        }
    }
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub daily_budget: f64,
    pub spent: f64,
    /// Held by outstanding reservations
    pub pending: f64,
    pub remaining: f64,
    pub calls_made: u64,
    pub last_reset: Date,
    /// Spent share of the cap, 0.0 when the cap is zero
    pub utilization: f64,
}
