use std::time::Duration;

use duration_str::deserialize_duration;
use indexmap::IndexMap;
use serde::Deserialize;
use tiergate_core::{BackendClass, TokenRates};
use url::Url;

/// Backend catalog and selection weights
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Backends in declaration order; order breaks selection ties
    #[serde(default)]
    pub backends: IndexMap<String, BackendConfig>,
    /// Backends tried in order when no candidate scores above zero
    #[serde(default)]
    pub fallback_chain: Vec<String>,
    /// Scoring weights
    #[serde(default)]
    pub weights: SelectorWeights,
    /// Timeout for local service reachability probes
    #[serde(default = "default_probe_timeout", deserialize_with = "deserialize_duration")]
    pub probe_timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            backends: IndexMap::new(),
            fallback_chain: Vec::new(),
            weights: SelectorWeights::default(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// One backend entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub class: BackendClass,
    /// USD per million input tokens
    #[serde(default)]
    pub input_per_mtok: f64,
    /// USD per million output tokens
    #[serde(default)]
    pub output_per_mtok: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    pub quality: f64,
    pub speed: f64,
    #[serde(default)]
    pub specializations: Vec<String>,
    /// Environment variable that must be set for the backend to be usable
    #[serde(default)]
    pub credential_env: Option<String>,
    /// URL that must answer for a local backend to be usable
    #[serde(default)]
    pub health_url: Option<Url>,
}

impl BackendConfig {
    pub const fn rates(&self) -> TokenRates {
        TokenRates::new(self.input_per_mtok, self.output_per_mtok)
    }
}

/// Scoring weights for backend selection
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorWeights {
    /// Bonus when the task type is one of the backend's specializations
    #[serde(default = "default_specialization_bonus")]
    pub specialization_bonus: f64,
    /// Multiplier on the speed score for high urgency requests
    #[serde(default = "default_speed_weight")]
    pub speed_weight: f64,
    /// Multiplier on `success_rate + avg_quality` from history
    #[serde(default = "default_history_weight")]
    pub history_weight: f64,
    /// Cost to remaining budget ratio above which a penalty applies
    #[serde(default = "default_cost_ratio_threshold")]
    pub cost_ratio_threshold: f64,
    /// Penalty multiplier on the cost ratio
    #[serde(default = "default_cost_penalty")]
    pub cost_penalty: f64,
    /// Floor for the remaining budget when computing the ratio
    #[serde(default = "default_budget_epsilon")]
    pub budget_epsilon: f64,
}

impl Default for SelectorWeights {
    fn default() -> Self {
        Self {
            specialization_bonus: default_specialization_bonus(),
            speed_weight: default_speed_weight(),
            history_weight: default_history_weight(),
            cost_ratio_threshold: default_cost_ratio_threshold(),
            cost_penalty: default_cost_penalty(),
            budget_epsilon: default_budget_epsilon(),
        }
    }
}

const fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

const fn default_max_output_tokens() -> u32 {
    8192
}

const fn default_specialization_bonus() -> f64 {
    0.1
}

const fn default_speed_weight() -> f64 {
    0.1
}

const fn default_history_weight() -> f64 {
    0.05
}

const fn default_cost_ratio_threshold() -> f64 {
    0.5
}

const fn default_cost_penalty() -> f64 {
    0.3
}

const fn default_budget_epsilon() -> f64 {
    1e-6
}
