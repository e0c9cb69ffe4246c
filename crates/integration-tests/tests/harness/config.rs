//! Programmatic configuration builder for integration tests

use std::path::Path;

use tiergate_config::{BackendConfig, Config};
use tiergate_core::BackendClass;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with no backends and default limits
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Add a local backend with no per-token charge
    pub fn with_free_backend(self, id: &str, quality: f64) -> Self {
        self.with_backend(id, BackendClass::LocalFree, quality, 0.0, 0.0)
    }

    /// Add a paid backend with the given per-million-token rates
    pub fn with_paid_backend(self, id: &str, quality: f64, input_per_mtok: f64, output_per_mtok: f64) -> Self {
        self.with_backend(id, BackendClass::Premium, quality, input_per_mtok, output_per_mtok)
    }

    fn with_backend(
        mut self,
        id: &str,
        class: BackendClass,
        quality: f64,
        input_per_mtok: f64,
        output_per_mtok: f64,
    ) -> Self {
        self.config.routing.backends.insert(
            id.to_owned(),
            BackendConfig {
                class,
                input_per_mtok,
                output_per_mtok,
                max_output_tokens: 4096,
                quality,
                speed: 0.8,
                specializations: Vec::new(),
                credential_env: None,
                health_url: None,
            },
        );
        self
    }

    pub fn with_fallback(mut self, chain: &[&str]) -> Self {
        self.config.routing.fallback_chain = chain.iter().map(|id| (*id).to_owned()).collect();
        self
    }

    pub fn with_daily_budget(mut self, daily_budget: f64) -> Self {
        self.config.budget.daily_budget = daily_budget;
        self
    }

    pub fn with_max_escalations(mut self, max_escalations: u32) -> Self {
        self.config.escalation.max_escalations = max_escalations;
        self
    }

    pub fn with_state_dir(mut self, dir: &Path) -> Self {
        self.config.storage.state_dir = dir.to_path_buf();
        self
    }

    /// Build the final config, panicking if it would not load from a file
    pub fn build(self) -> Config {
        self.config.validate().expect("test config must be valid");
        self.config
    }
}
