//! One drain cycle: receive, normalize, fan out, acknowledge

use super::metrics::RelayMetrics;
use crate::config::{RelayConfig, SourceConfig, SourceSettings};
use crate::document::{Document, RawMessage};
use crate::normalizer::Normalizer;
use crate::sink::{AlertNotifier, ReplicationSink, SinkOutcome, StorageSink};
use crate::source::{SourceConnector, SourceQueue};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// How a drain cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    /// Source connection settings are missing
    Misconfigured,
    /// The source client could not be created
    SourceUnavailable,
    /// The receive call failed; nothing was acknowledged
    ReceiveFailed,
    /// The queue had no messages
    Idle,
    /// Messages were processed and acknowledged
    Completed,
}

/// Summary of one drain cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrainReport {
    pub status: DrainStatus,
    pub received: usize,
    pub acknowledged: usize,
    pub ack_failures: usize,
    pub storage: SinkOutcome,
    pub replication: SinkOutcome,
    /// Alert outcomes of every message, combined
    pub alerts: SinkOutcome,
    pub duration: Duration,
}

impl DrainReport {
    fn new(status: DrainStatus) -> Self {
        Self {
            status,
            received: 0,
            acknowledged: 0,
            ack_failures: 0,
            storage: SinkOutcome::Skipped,
            replication: SinkOutcome::Skipped,
            alerts: SinkOutcome::Skipped,
            duration: Duration::ZERO,
        }
    }

    /// The cycle reached the acknowledgment step or found nothing to do
    pub fn is_success(&self) -> bool {
        matches!(self.status, DrainStatus::Idle | DrainStatus::Completed)
    }
}

/// Runs drain cycles against the source queue and the configured sinks
pub struct DrainOrchestrator {
    source: SourceConfig,
    connector: Arc<dyn SourceConnector>,
    normalizer: Normalizer,
    storage: StorageSink,
    replication: ReplicationSink,
    alert: AlertNotifier,
    metrics: RelayMetrics,
}

impl DrainOrchestrator {
    /// Create a new orchestrator builder
    pub fn builder(source: SourceConfig, connector: Arc<dyn SourceConnector>) -> DrainOrchestratorBuilder {
        DrainOrchestratorBuilder::new(source, connector)
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Whether any sink will receive documents
    pub fn any_sink_enabled(&self) -> bool {
        self.storage.is_enabled() || self.replication.is_enabled() || self.alert.is_enabled()
    }

    /// Run one drain cycle
    pub async fn drain(&self) -> DrainReport {
        let start = Instant::now();
        self.metrics.increment_cycles();

        let report = match self.source.settings() {
            Ok(settings) => {
                let span = info_span!("drain_cycle", queue = %settings.queue_name);
                self.drain_queue(&settings).instrument(span).await
            }
            Err(e) => {
                error!(error = %e, "Source queue is not configured; skipping drain cycle");
                self.metrics.record_error("config");
                DrainReport::new(DrainStatus::Misconfigured)
            }
        };

        let duration = start.elapsed();
        self.metrics.record_cycle_duration(duration);
        debug!(metrics = ?self.metrics.snapshot(), "Relay metrics");
        DrainReport { duration, ..report }
    }

    async fn drain_queue(&self, settings: &SourceSettings) -> DrainReport {
        let mut queue = match self.connector.connect(settings).await {
            Ok(queue) => queue,
            Err(e) => {
                error!(error = %e, "Failed to connect to source queue");
                self.metrics.record_error("connect");
                return DrainReport::new(DrainStatus::SourceUnavailable);
            }
        };

        let report = self.drain_connected(queue.as_mut(), settings).await;

        if let Err(e) = queue.close().await {
            warn!(error = %e, "Failed to close source queue client");
        }
        report
    }

    async fn drain_connected(
        &self,
        queue: &mut dyn SourceQueue,
        settings: &SourceSettings,
    ) -> DrainReport {
        let messages = match queue
            .receive(settings.max_message_count, settings.max_wait_time)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Failed to receive messages");
                self.metrics.record_error("receive");
                return DrainReport::new(DrainStatus::ReceiveFailed);
            }
        };

        if messages.is_empty() {
            info!("No messages in queue {}", settings.queue_name);
            return DrainReport::new(DrainStatus::Idle);
        }

        let mut report = DrainReport::new(DrainStatus::Completed);
        report.received = messages.len();
        self.metrics.add_received(messages.len());
        info!("Received {} message(s)", messages.len());

        let documents = self.process_messages(&messages, &settings.queue_name, &mut report).await;

        report.storage = self.storage.persist(&documents).await;
        self.metrics.record_storage(&report.storage);

        report.replication = self.replication.replicate(&documents).await;
        self.metrics.record_replication(&report.replication);

        for message in &messages {
            match queue.complete(message).await {
                Ok(()) => report.acknowledged += 1,
                Err(e) => {
                    report.ack_failures += 1;
                    error!(
                        error = %e,
                        message_id = message.id().unwrap_or_default(),
                        "Failed to acknowledge message"
                    );
                }
            }
        }
        self.metrics.add_acknowledged(report.acknowledged);
        self.metrics.add_ack_failures(report.ack_failures);
        if report.ack_failures > 0 {
            self.metrics.record_error("acknowledge");
        }

        info!(
            received = report.received,
            acknowledged = report.acknowledged,
            storage = ?report.storage,
            replication = ?report.replication,
            alerts = ?report.alerts,
            "Drain cycle complete"
        );
        report
    }

    async fn process_messages(
        &self,
        messages: &[RawMessage],
        queue_name: &str,
        report: &mut DrainReport,
    ) -> Vec<Document> {
        let any_sink = self.any_sink_enabled();
        let mut documents = Vec::with_capacity(if any_sink { messages.len() } else { 0 });

        for message in messages {
            info!(
                message_id = message.id().unwrap_or_default(),
                delivery_count = message.delivery_count,
                sequence_number = ?message.sequence_number,
                enqueued_time = ?message.enqueued_time,
                dead_letter_source = message.dead_letter_source.as_deref(),
                "Processing message"
            );
            debug!(body = %String::from_utf8_lossy(&message.body), "Message body");

            if !any_sink {
                continue;
            }

            let document = self.normalizer.normalize(message, queue_name);
            let outcome = self.alert.maybe_notify(&document).await;
            self.metrics.record_alert(&outcome);
            report.alerts = report.alerts.combine(outcome);
            documents.push(document);
        }

        documents
    }
}

/// Builder for DrainOrchestrator; sinks default to disabled
pub struct DrainOrchestratorBuilder {
    source: SourceConfig,
    connector: Arc<dyn SourceConnector>,
    normalizer: Normalizer,
    storage: Option<StorageSink>,
    replication: Option<ReplicationSink>,
    alert: Option<AlertNotifier>,
    metrics: RelayMetrics,
}

impl DrainOrchestratorBuilder {
    pub fn new(source: SourceConfig, connector: Arc<dyn SourceConnector>) -> Self {
        Self {
            source,
            connector,
            normalizer: Normalizer::default(),
            storage: None,
            replication: None,
            alert: None,
            metrics: RelayMetrics::new(),
        }
    }

    /// Take the source settings and partition field from a loaded configuration
    pub fn from_config(config: &RelayConfig, connector: Arc<dyn SourceConnector>) -> Self {
        Self::new(config.source.clone(), connector)
            .normalizer(Normalizer::new(config.storage.partition_field.clone()))
    }

    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn storage(mut self, storage: StorageSink) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn replication(mut self, replication: ReplicationSink) -> Self {
        self.replication = Some(replication);
        self
    }

    pub fn alert(mut self, alert: AlertNotifier) -> Self {
        self.alert = Some(alert);
        self
    }

    /// Share an existing metrics collector
    pub fn metrics(mut self, metrics: RelayMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> DrainOrchestrator {
        DrainOrchestrator {
            source: self.source,
            connector: self.connector,
            normalizer: self.normalizer,
            storage: self.storage.unwrap_or_else(StorageSink::disabled),
            replication: self.replication.unwrap_or_else(ReplicationSink::disabled),
            alert: self.alert.unwrap_or_else(AlertNotifier::disabled),
            metrics: self.metrics,
        }
    }
}
