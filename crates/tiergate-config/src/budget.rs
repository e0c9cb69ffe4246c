use serde::Deserialize;

/// Budget ledger configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Hard daily spending cap in USD
    #[serde(default = "default_daily_budget")]
    pub daily_budget: f64,
    /// Fraction of the cap after which each recorded spend logs a warning
    #[serde(default = "default_warning_ratio")]
    pub warning_ratio: f64,
    /// Smallest cost recorded for a call against a paid backend
    #[serde(default = "default_min_call_cost")]
    pub min_call_cost: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_budget: default_daily_budget(),
            warning_ratio: default_warning_ratio(),
            min_call_cost: default_min_call_cost(),
        }
    }
}

const fn default_daily_budget() -> f64 {
    3.0
}

const fn default_warning_ratio() -> f64 {
    0.8
}

const fn default_min_call_cost() -> f64 {
    0.001
}
