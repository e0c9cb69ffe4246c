//! Backend catalog
//!
//! Immutable descriptors built once from configuration. Declaration order is
//! preserved and used to break selection ties.

use tiergate_config::RoutingConfig;
use tiergate_core::{BackendClass, TokenRates, estimate_cost, estimate_task_cost};
use url::Url;

/// One backend the controller can route work to
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub id: String,
    pub class: BackendClass,
    pub rates: TokenRates,
    pub max_output_tokens: u32,
    /// Static quality score (0.0 to 1.0)
    pub quality: f64,
    /// Static speed score (0.0 to 1.0)
    pub speed: f64,
    pub specializations: Vec<String>,
    /// Environment variable that must be set for the backend to be usable
    pub credential_env: Option<String>,
    /// Endpoint that must answer for the backend to be usable
    pub health_url: Option<Url>,
}

impl BackendDescriptor {
    /// Whether calls to this backend cost money
    pub fn is_paid(&self) -> bool {
        !self.rates.is_free()
    }

    pub fn specializes_in(&self, task_type: &str) -> bool {
        self.specializations.iter().any(|s| s == task_type)
    }

    /// Up-front cost estimate for a task of the given complexity
    pub fn estimate_task_cost(&self, complexity: f64) -> f64 {
        estimate_task_cost(&self.rates, complexity)
    }

    /// Cost of a call with known token counts
    pub fn estimate_cost(&self, input_tokens: usize, output_tokens: usize) -> f64 {
        estimate_cost(&self.rates, input_tokens, output_tokens)
    }
}

/// All configured backends in declaration order
#[derive(Debug, Default)]
pub struct BackendCatalog {
    backends: Vec<BackendDescriptor>,
}

impl BackendCatalog {
    pub fn from_config(config: &RoutingConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .map(|(id, c)| BackendDescriptor {
                id: id.clone(),
                class: c.class,
                rates: c.rates(),
                max_output_tokens: c.max_output_tokens,
                quality: c.quality,
                speed: c.speed,
                specializations: c.specializations.clone(),
                credential_env: c.credential_env.clone(),
                health_url: c.health_url.clone(),
            })
            .collect();

        Self { backends }
    }

    pub const fn new(backends: Vec<BackendDescriptor>) -> Self {
        Self { backends }
    }

    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BackendDescriptor> {
        self.backends.iter()
    }

    pub const fn len(&self) -> usize {
        self.backends.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl<'a> IntoIterator for &'a BackendCatalog {
    type Item = &'a BackendDescriptor;
    type IntoIter = std::slice::Iter<'a, BackendDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use tiergate_config::Config;

    use super::*;

    #[test]
    fn builds_from_config_in_order() {
        let config = Config::from_toml_str(
            r#"
[routing.backends."ollama/qwen2.5-coder"]
class = "local_free"
quality = 0.7
speed = 0.9
specializations = ["code", "analysis"]

[routing.backends."claude-3.5-sonnet"]
class = "premium"
input_per_mtok = 3.0
output_per_mtok = 15.0
quality = 0.95
speed = 0.7
credential_env = "ANTHROPIC_API_KEY"
"#,
        )
        .unwrap();

        let catalog = BackendCatalog::from_config(&config.routing);
        let ids: Vec<_> = catalog.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["ollama/qwen2.5-coder", "claude-3.5-sonnet"]);

        let local = catalog.get("ollama/qwen2.5-coder").unwrap();
        assert!(!local.is_paid());
        assert!(local.specializes_in("code"));
        assert!(!local.specializes_in("architecture"));
        assert!(local.estimate_task_cost(1.0).abs() < f64::EPSILON);

        let sonnet = catalog.get("claude-3.5-sonnet").unwrap();
        assert!(sonnet.is_paid());
        // 1500 tokens: 900 in at $3/M + 600 out at $15/M
        assert!((sonnet.estimate_task_cost(0.5) - 0.0117).abs() < 1e-9);
        assert!(catalog.get("missing").is_none());
    }
}
