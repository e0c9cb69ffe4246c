use serde::Deserialize;

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Whether cached results are reused
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Entry count above which eviction runs
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Fraction of `max_entries` kept after eviction
    #[serde(default = "default_retain_ratio")]
    pub retain_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            retain_ratio: default_retain_ratio(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_max_entries() -> usize {
    10_000
}

const fn default_retain_ratio() -> f64 {
    0.8
}
