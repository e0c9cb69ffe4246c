use indexmap::IndexMap;
use serde::Deserialize;

/// Completeness checks applied to executor outputs
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    /// Output fields each task type must produce, keyed by task type
    #[serde(default = "default_required_fields")]
    pub required_fields: IndexMap<String, Vec<String>>,
    /// Minimum combined output length for task types without required fields
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    /// Output field holding a self-reported confidence, if any
    #[serde(default = "default_confidence_field")]
    pub confidence_field: String,
    /// Output field holding a self-reported dollar cost, if any
    #[serde(default = "default_cost_field")]
    pub cost_field: String,
}

impl QualityConfig {
    /// Fields the given task type must produce; empty when unconfigured
    pub fn required_for(&self, task_type: &str) -> &[String] {
        self.required_fields.get(task_type).map_or(&[], Vec::as_slice)
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
            min_content_chars: default_min_content_chars(),
            confidence_field: default_confidence_field(),
            cost_field: default_cost_field(),
        }
    }
}

fn default_required_fields() -> IndexMap<String, Vec<String>> {
    [
        ("fix", &["fixed_output", "explanation"][..]),
        ("generate", &["code", "explanation"][..]),
        ("analyze", &["analysis", "issues"][..]),
        ("review", &["review", "issues"][..]),
    ]
    .into_iter()
    .map(|(task, fields)| (task.to_string(), fields.iter().map(ToString::to_string).collect()))
    .collect()
}

const fn default_min_content_chars() -> usize {
    50
}

fn default_confidence_field() -> String {
    "confidence".to_string()
}

fn default_cost_field() -> String {
    "cost".to_string()
}
