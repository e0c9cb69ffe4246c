use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus the file read
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_budget()?;
        self.validate_cache()?;
        self.validate_escalation()?;
        self.validate_routing()?;

        if let Some(ref telemetry) = self.telemetry {
            ensure_unit("telemetry.sampling_rate", telemetry.sampling_rate)?;
        }

        Ok(())
    }

    fn validate_budget(&self) -> anyhow::Result<()> {
        let budget = &self.budget;

        if !budget.daily_budget.is_finite() || budget.daily_budget < 0.0 {
            anyhow::bail!("budget.daily_budget must be a non-negative number");
        }
        ensure_unit("budget.warning_ratio", budget.warning_ratio)?;
        if budget.min_call_cost < 0.0 {
            anyhow::bail!("budget.min_call_cost must not be negative");
        }

        Ok(())
    }

    fn validate_cache(&self) -> anyhow::Result<()> {
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be greater than 0");
        }
        ensure_unit("cache.retain_ratio", self.cache.retain_ratio)
    }

    fn validate_escalation(&self) -> anyhow::Result<()> {
        ensure_unit("escalation.quality_threshold", self.escalation.quality_threshold)?;

        for tier in tiergate_core::Tier::ALL {
            let limits = self.escalation.tiers.get(tier);
            if limits.max_tokens == 0 {
                anyhow::bail!("escalation.tiers.{tier}.max_tokens must be greater than 0");
            }
            if limits.timeout.is_zero() {
                anyhow::bail!("escalation.tiers.{tier}.timeout must be greater than 0");
            }
            if limits.cost_target < 0.0 {
                anyhow::bail!("escalation.tiers.{tier}.cost_target must not be negative");
            }
        }

        Ok(())
    }

    fn validate_routing(&self) -> anyhow::Result<()> {
        let routing = &self.routing;

        if routing.backends.is_empty() {
            anyhow::bail!("at least one backend must be configured under [routing.backends]");
        }

        for (id, backend) in &routing.backends {
            ensure_unit(&format!("routing.backends.\"{id}\".quality"), backend.quality)?;
            ensure_unit(&format!("routing.backends.\"{id}\".speed"), backend.speed)?;

            if backend.input_per_mtok < 0.0 || backend.output_per_mtok < 0.0 {
                anyhow::bail!("backend '{id}' must not have negative token rates");
            }
            if backend.class.requires_payment() && backend.rates().is_free() {
                tracing::warn!(backend = %id, class = ?backend.class, "paid backend class configured without token rates");
            }
        }

        for id in &routing.fallback_chain {
            if !routing.backends.contains_key(id) {
                anyhow::bail!("fallback chain references unknown backend '{id}'");
            }
        }

        if routing.weights.budget_epsilon <= 0.0 {
            anyhow::bail!("routing.weights.budget_epsilon must be greater than 0");
        }

        Ok(())
    }
}

fn ensure_unit(name: &str, value: f64) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{name} must be between 0 and 1, got {value}");
    }
    Ok(())
}
