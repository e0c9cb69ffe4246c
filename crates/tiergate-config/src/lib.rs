#![allow(clippy::must_use_candidate)]

pub mod budget;
pub mod cache;
mod env;
pub mod escalation;
pub mod executor;
mod loader;
pub mod quality;
pub mod routing;
pub mod storage;
pub mod telemetry;

use serde::Deserialize;

pub use budget::*;
pub use cache::*;
pub use escalation::*;
pub use executor::*;
pub use quality::*;
pub use routing::*;
pub use storage::*;
pub use telemetry::TelemetryConfig;

/// Top-level Tiergate configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Daily spend cap and ledger behavior
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Result cache sizing
    #[serde(default)]
    pub cache: CacheConfig,
    /// Where persisted state lives
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tier definitions and escalation gates
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// Backend catalog and selector weights
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Output completeness checks
    #[serde(default)]
    pub quality: QualityConfig,
    /// External task executor commands
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
