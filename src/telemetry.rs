//! OpenTelemetry integration for distributed tracing
//!
//! Exports the `drain_cycle` spans and everything beneath them over OTLP, next
//! to the regular log output chosen by [`LogFormat`].

use crate::LogFormat;
use opentelemetry::global;
use opentelemetry::trace::TraceError;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler},
    Resource,
};
use opentelemetry_semantic_conventions::resource::{
    DEPLOYMENT_ENVIRONMENT, SERVICE_NAME, SERVICE_VERSION,
};
use thiserror::Error;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry};

/// Telemetry setup failures
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install OTLP pipeline: {0}")]
    Pipeline(#[from] TraceError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// OpenTelemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317")
    pub endpoint: String,
    pub service_name: String,
    pub service_version: String,
    /// Deployment environment (e.g., "production", "staging")
    pub environment: String,
    /// Sampling rate (0.0 to 1.0)
    pub sampling_rate: f64,
    /// Enable trace propagation
    pub propagation: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4317".to_string(),
            service_name: "queue-relay".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            sampling_rate: 1.0,
            propagation: true,
        }
    }
}

impl TelemetryConfig {
    /// Read the standard `OTEL_*` variables, keeping defaults for absent ones
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.endpoint),
            service_name: std::env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: std::env::var("OTEL_SERVICE_VERSION")
                .unwrap_or(defaults.service_version),
            environment: std::env::var("DEPLOYMENT_ENVIRONMENT").unwrap_or(defaults.environment),
            sampling_rate: std::env::var("OTEL_TRACES_SAMPLER_ARG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sampling_rate),
            propagation: std::env::var("OTEL_PROPAGATION_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.propagation),
        }
    }
}

/// Install logging plus an OTLP trace exporter
pub fn init_telemetry(
    config: TelemetryConfig,
    format: LogFormat,
    default_level: &str,
) -> Result<(), TelemetryError> {
    if config.propagation {
        global::set_text_map_propagator(TraceContextPropagator::new());
    }

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&config.endpoint);

    let resource = Resource::new(vec![
        opentelemetry::KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        opentelemetry::KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
        opentelemetry::KeyValue::new(DEPLOYMENT_ENVIRONMENT, config.environment.clone()),
    ]);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::TraceIdRatioBased(config.sampling_rate))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    let json = matches!(format, LogFormat::Json);
    Registry::default()
        .with(crate::env_filter(default_level))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

/// Flush and shut down the exporter
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
