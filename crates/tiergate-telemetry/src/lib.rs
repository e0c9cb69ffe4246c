//! Telemetry for Tiergate
//!
//! Logs always go to stderr, so JSON printed on stdout stays clean. Spans
//! and metrics are exported over OTLP only when an exporter is configured.

mod export;
pub mod metrics;

use opentelemetry::{global, trace::TracerProvider};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::SdkTracerProvider};
use tiergate_config::TelemetryConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use metrics::EngineMetrics;

/// Flushes and shuts down exporters when dropped
#[derive(Default)]
pub struct TelemetryGuard {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Push buffered spans and metrics now
    ///
    /// # Errors
    ///
    /// Returns an error if either provider fails to flush
    pub fn force_flush(&self) -> anyhow::Result<()> {
        if let Some(ref tracer) = self.tracer {
            tracer
                .force_flush()
                .map_err(|e| anyhow::anyhow!("failed to flush spans: {e}"))?;
        }
        if let Some(ref meter) = self.meter {
            meter
                .force_flush()
                .map_err(|e| anyhow::anyhow!("failed to flush metrics: {e}"))?;
        }
        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // The subscriber may already be gone, so report on stderr directly
        if let Some(tracer) = self.tracer.take()
            && let Err(e) = tracer.shutdown()
        {
            eprintln!("tiergate: span exporter shutdown failed: {e}");
        }
        if let Some(meter) = self.meter.take()
            && let Err(e) = meter.shutdown()
        {
            eprintln!("tiergate: metric exporter shutdown failed: {e}");
        }
    }
}

/// Install the global subscriber and, if configured, OTLP export
///
/// `log_filter` uses `EnvFilter` syntax and is ignored when `RUST_LOG` is
/// set.
///
/// # Errors
///
/// Returns an error if an OTLP exporter cannot be built
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = config.is_some_and(|c| c.json_logs);
    let text_layer = (!json_logs).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let mut guard = TelemetryGuard::default();
    let otel_layer = match config.and_then(|c| c.exporter.as_ref().map(|e| (c, e))) {
        Some((telemetry, exporter)) => {
            let providers = export::Providers::build(telemetry, exporter)?;
            let tracer = providers.tracer.tracer("tiergate");

            global::set_tracer_provider(providers.tracer.clone());
            global::set_meter_provider(providers.meter.clone());
            guard.tracer = Some(providers.tracer);
            guard.meter = Some(providers.meter);

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .init();

    if let Some(exporter) = config.and_then(|c| c.exporter.as_ref()) {
        tracing::debug!(endpoint = %exporter.endpoint, protocol = ?exporter.protocol, "otlp export enabled");
    }

    Ok(guard)
}
