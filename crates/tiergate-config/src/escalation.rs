use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;
use tiergate_core::{Tier, TierPreference};

/// Escalation policy and per-tier limits
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Quality score at or above which a result is accepted
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Maximum number of tier escalations per request
    #[serde(default = "default_max_escalations")]
    pub max_escalations: u32,
    /// Tier overrides
    #[serde(default)]
    pub tiers: TierConfigs,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            max_escalations: default_max_escalations(),
            tiers: TierConfigs::default(),
        }
    }
}

/// Limits for each of the three tiers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfigs {
    #[serde(default = "TierConfig::quick")]
    pub quick: TierConfig,
    #[serde(default = "TierConfig::detailed")]
    pub detailed: TierConfig,
    #[serde(default = "TierConfig::comprehensive")]
    pub comprehensive: TierConfig,
}

impl TierConfigs {
    pub const fn get(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Quick => &self.quick,
            Tier::Detailed => &self.detailed,
            Tier::Comprehensive => &self.comprehensive,
        }
    }
}

impl Default for TierConfigs {
    fn default() -> Self {
        Self {
            quick: TierConfig::quick(),
            detailed: TierConfig::detailed(),
            comprehensive: TierConfig::comprehensive(),
        }
    }
}

/// Limits applied while a request runs at one tier
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Input token ceiling; larger string inputs are compressed
    pub max_tokens: u32,
    /// Expected spend for one call at this tier in USD
    pub cost_target: f64,
    /// Executor timeout, e.g. `"30s"` or `"2m"`
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Backend class preference used by the selector
    pub preference: TierPreference,
}

impl TierConfig {
    pub const fn quick() -> Self {
        Self {
            max_tokens: 1000,
            cost_target: 0.002,
            timeout: Duration::from_secs(30),
            preference: TierPreference::Fast,
        }
    }

    pub const fn detailed() -> Self {
        Self {
            max_tokens: 3000,
            cost_target: 0.01,
            timeout: Duration::from_secs(60),
            preference: TierPreference::Balanced,
        }
    }

    pub const fn comprehensive() -> Self {
        Self {
            max_tokens: 8000,
            cost_target: 0.05,
            timeout: Duration::from_secs(120),
            preference: TierPreference::Quality,
        }
    }
}

const fn default_quality_threshold() -> f64 {
    0.8
}

const fn default_max_escalations() -> u32 {
    2
}
