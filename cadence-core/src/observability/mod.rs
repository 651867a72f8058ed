//! Observability infrastructure: tracing and self-metrics.
//!
//! Logs go through `tracing`. The daemon's own counters and gauges go through
//! the `metrics` facade and are exported by a Prometheus listener when one is
//! configured; without a recorder they are no-ops.

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TraceError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{self, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

const SERVICE_NAME: &str = "cadenced";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// OTLP collector endpoint, if span export is wanted.
///
/// `OTEL_EXPORTER_OTLP_ENDPOINT` enables export to that endpoint;
/// `CADENCE_OTLP_ENABLED` enables it with the default endpoint.
fn otlp_endpoint() -> Option<String> {
    match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => Some(endpoint),
        Err(_) if std::env::var_os("CADENCE_OTLP_ENABLED").is_some() => {
            Some(DEFAULT_OTLP_ENDPOINT.to_string())
        }
        Err(_) => None,
    }
}

fn otlp_tracer(endpoint: &str) -> Result<Tracer, TraceError> {
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(trace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])))
        .install_batch(runtime::Tokio)
}

/// Log filter from `RUST_LOG`, `info` when unset or unparseable.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global observability infrastructure.
///
/// Call once at startup, from inside the tokio runtime.
///
/// # Errors
/// Fails if a global subscriber or metrics recorder is already installed, or
/// the OTLP pipeline or Prometheus listener cannot be set up.
pub fn init(telemetry: &TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = otlp_endpoint();
    let tracer = endpoint.as_deref().map(otlp_tracer).transpose()?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .try_init()?;

    match &endpoint {
        Some(endpoint) => info!(%endpoint, "OTLP trace export enabled"),
        None => debug!("OTLP trace export disabled"),
    }

    if let Some(addr) = telemetry.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("service", SERVICE_NAME)
            .install()?;
        info!(%addr, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();
    Ok(())
}

/// Flush pending spans.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
