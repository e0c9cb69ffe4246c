use std::{collections::BTreeMap, time::Duration};

use duration_str::deserialize_duration;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Log format and optional OTLP export
///
/// Without an `exporter` only the local log output is installed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Extra resource attributes attached to exported spans and metrics
    #[serde(default)]
    pub resource_attributes: BTreeMap<String, String>,
    /// Write logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
    /// Fraction of root spans exported, 0.0 to 1.0
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            resource_attributes: BTreeMap::new(),
            json_logs: false,
            sampling_rate: default_sampling_rate(),
            exporter: None,
        }
    }
}

/// OTLP collector used for both spans and metrics
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Sent with every export; only honored over HTTP
    #[serde(default)]
    pub headers: BTreeMap<String, SecretString>,
    /// Metric push interval
    #[serde(default = "default_export_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    #[default]
    Grpc,
    HttpProto,
}

fn default_service_name() -> String {
    "tiergate".to_string()
}

const fn default_sampling_rate() -> f64 {
    1.0
}

const fn default_export_interval() -> Duration {
    Duration::from_secs(30)
}
