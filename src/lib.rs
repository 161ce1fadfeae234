//! Scheduled queue drain relay
//!
//! A periodically triggered job drains a message queue, normalizes every
//! message into a canonical [`Document`] and fans it out to up to three
//! independent, individually optional sinks:
//!
//! - durable document storage ([`sink::StorageSink`])
//! - a replication queue, in batches with partial-batch retry
//!   ([`sink::ReplicationSink`])
//! - a threshold alert publisher ([`sink::AlertNotifier`])
//!
//! Every received message is acknowledged after the sinks ran, whatever
//! their outcome. Sink failures are logged and reported, never raised.
//!
//! # Example
//!
//! ```no_run
//! use queue_relay::{DrainOrchestrator, RelayConfig};
//! use queue_relay::source::SourceConnector;
//! use std::sync::Arc;
//!
//! # async fn example(connector: Arc<dyn SourceConnector>) {
//! let config = RelayConfig::from_env();
//! let orchestrator = DrainOrchestrator::builder(config.source.clone(), connector).build();
//!
//! let report = orchestrator.drain().await;
//! println!("received {} message(s)", report.received);
//! # }
//! ```
//!
//! Concrete backends live in [`backends`] behind the `aws` and `mongo`
//! features.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod backends;
pub mod config;
pub mod document;
pub mod error;
pub mod normalizer;
pub mod relay;
pub mod sink;
pub mod source;

/// OpenTelemetry integration for distributed tracing
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use config::{ConfigResolver, RelayConfig, SinkConfig, SinkKind};
pub use document::{Document, Payload, RawMessage};
pub use error::{ConfigError, RelayError, Result, SinkError, SourceError};
pub use normalizer::Normalizer;
pub use relay::{DrainOrchestrator, DrainReport, DrainStatus, RelayMetrics, Scheduler};
pub use sink::SinkOutcome;

use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Plain,
    /// One JSON object per event
    #[default]
    Json,
}

/// `RUST_LOG` when set, otherwise `default_level`
pub(crate) fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber with default settings
pub fn init_tracing() {
    init_tracing_with(LogFormat::Json, "info");
}

/// Initialize the tracing subscriber with the given format and default level
///
/// Does nothing when a global subscriber is already installed.
pub fn init_tracing_with(format: LogFormat, default_level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let json = matches!(format, LogFormat::Json);
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init();
}
