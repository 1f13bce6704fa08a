//! OTLP export for the gateway's spans and instruments.
//!
//! Compiled with the `metrics` feature only. Spans and metric readings share
//! one collector endpoint and one resource (`service.name = hexgate` plus the
//! crate version), so a collector can join a denied tool call's span with
//! the `hexgate.policy.decisions` counter that recorded it.

use std::time::Duration;

use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Service name reported to the collector.
pub const SERVICE_NAME: &str = "hexgate";

/// How often metric readings are pushed.
const READING_INTERVAL: Duration = Duration::from_secs(15);

/// Per-export deadline; a dead collector must not stall shutdown.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error("OpenTelemetry SDK error: {0}")]
    Sdk(#[from] opentelemetry_sdk::error::OTelSdkError),
}

/// Owns the installed providers. Nothing is flushed on drop.
pub struct MetricsGuard {
    spans: SdkTracerProvider,
    readings: SdkMeterProvider,
}

impl MetricsGuard {
    /// Flush and stop both providers. Both are stopped even if the first
    /// fails; the first error is returned.
    pub fn shutdown(self) -> Result<(), MetricsError> {
        let readings = self.readings.shutdown();
        let spans = self.spans.shutdown();
        readings?;
        spans?;
        Ok(())
    }
}

fn gateway_resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

fn span_provider(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider, MetricsError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;
    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

fn reading_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider, MetricsError> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;
    let reader = PeriodicReader::builder(exporter)
        .with_interval(READING_INTERVAL)
        .build();
    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build())
}

/// Build both providers against `endpoint` (gRPC, e.g.
/// `http://localhost:4317`) and install them as the global providers.
///
/// Nothing is installed unless both exporters build.
pub fn init_metrics(endpoint: &str) -> Result<MetricsGuard, MetricsError> {
    let resource = gateway_resource();
    let spans = span_provider(endpoint, resource.clone())?;
    let readings = reading_provider(endpoint, resource)?;

    global::set_tracer_provider(spans.clone());
    global::set_meter_provider(readings.clone());
    Ok(MetricsGuard { spans, readings })
}
