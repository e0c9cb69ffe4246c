//! Token-rate cost model
//!
//! The budget ledger's estimates and the selector's cost penalty both go
//! through these functions so the two never disagree about what a call
//! costs.

use serde::{Deserialize, Serialize};

/// Minimum tokens assumed for any task
const BASE_TASK_TOKENS: f64 = 500.0;

/// Additional tokens per unit of complexity
const COMPLEXITY_TOKENS: f64 = 2000.0;

/// Share of estimated task tokens attributed to input
const INPUT_SHARE: f64 = 0.6;

/// Approximate bytes per token for English text and code
const BYTES_PER_TOKEN: usize = 4;

/// Per-million-token pricing of a backend (USD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRates {
    /// Cost per million input tokens
    pub input_per_mtok: f64,
    /// Cost per million output tokens
    pub output_per_mtok: f64,
}

impl TokenRates {
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Whether both rates are zero
    pub fn is_free(&self) -> bool {
        self.input_per_mtok <= 0.0 && self.output_per_mtok <= 0.0
    }
}

/// Cost of a call with the given token counts
pub fn estimate_cost(rates: &TokenRates, input_tokens: usize, output_tokens: usize) -> f64 {
    let input_cost = (input_tokens as f64 / 1_000_000.0) * rates.input_per_mtok;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * rates.output_per_mtok;
    input_cost + output_cost
}

/// Up-front cost estimate for a task of the given complexity (0.0 to 1.0)
///
/// Assumes `500 + 2000 × complexity` tokens split 60/40 between input and
/// output.
pub fn estimate_task_cost(rates: &TokenRates, complexity: f64) -> f64 {
    let total = complexity.clamp(0.0, 1.0).mul_add(COMPLEXITY_TOKENS, BASE_TASK_TOKENS);
    let input = total * INPUT_SHARE;
    let output = total - input;
    (input / 1_000_000.0).mul_add(rates.input_per_mtok, (output / 1_000_000.0) * rates.output_per_mtok)
}

/// Approximate token count of a payload from its byte length
pub const fn tokens_from_bytes(bytes: usize) -> usize {
    bytes.div_ceil(BYTES_PER_TOKEN)
}
