//! OTLP span and metric export

use std::collections::HashMap;

use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::resource as semconv;
use secrecy::ExposeSecret;
use tiergate_config::{
    TelemetryConfig,
    telemetry::{ExportProtocol, ExporterConfig},
};

/// Tracer and meter providers sharing one collector
pub(crate) struct Providers {
    pub tracer: SdkTracerProvider,
    pub meter: SdkMeterProvider,
}

impl Providers {
    pub fn build(config: &TelemetryConfig, exporter: &ExporterConfig) -> anyhow::Result<Self> {
        let resource = resource(config);

        let spans = match exporter.protocol {
            ExportProtocol::Grpc => SpanExporter::builder()
                .with_tonic()
                .with_endpoint(exporter.endpoint.as_str())
                .build(),
            ExportProtocol::HttpProto => SpanExporter::builder()
                .with_http()
                .with_endpoint(exporter.endpoint.as_str())
                .with_headers(headers(exporter))
                .build(),
        }
        .map_err(|e| anyhow::anyhow!("failed to build span exporter for {}: {e}", exporter.endpoint))?;

        let metrics = match exporter.protocol {
            ExportProtocol::Grpc => MetricExporter::builder()
                .with_tonic()
                .with_endpoint(exporter.endpoint.as_str())
                .build(),
            ExportProtocol::HttpProto => MetricExporter::builder()
                .with_http()
                .with_endpoint(exporter.endpoint.as_str())
                .with_headers(headers(exporter))
                .build(),
        }
        .map_err(|e| anyhow::anyhow!("failed to build metric exporter for {}: {e}", exporter.endpoint))?;

        let tracer = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_sampler(sampler(config.sampling_rate))
            .with_batch_exporter(spans)
            .build();

        let meter = SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(PeriodicReader::builder(metrics).with_interval(exporter.interval).build())
            .build();

        Ok(Self { tracer, meter })
    }
}

fn resource(config: &TelemetryConfig) -> Resource {
    let extra = config
        .resource_attributes
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()));

    Resource::builder()
        .with_attributes(
            [
                KeyValue::new(semconv::SERVICE_NAME, config.service_name.clone()),
                KeyValue::new(semconv::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
            ]
            .into_iter()
            .chain(extra),
        )
        .build()
}

/// Ratio sampling of root spans; children follow their parent
fn sampler(rate: f64) -> Sampler {
    let root = if rate >= 1.0 {
        Sampler::AlwaysOn
    } else if rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(rate)
    };
    Sampler::ParentBased(Box::new(root))
}

fn headers(exporter: &ExporterConfig) -> HashMap<String, String> {
    exporter
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.expose_secret().to_string()))
        .collect()
}
