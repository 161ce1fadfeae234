//! Batched replication of documents to a secondary queue

use super::{BatchEntry, BatchSender, LazyClient, SinkOutcome};
use crate::config::ReplicationConfig;
use crate::document::Document;
use crate::error::SinkError;
use crate::relay::retry::RetryPolicy;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Forwards documents in fixed-size batches, re-sending only failed entries
#[derive(Debug)]
pub struct ReplicationSink {
    config: ReplicationConfig,
    policy: RetryPolicy,
    sender: LazyClient<dyn BatchSender>,
}

impl ReplicationSink {
    pub fn new(config: ReplicationConfig, sender: LazyClient<dyn BatchSender>) -> Self {
        let policy = RetryPolicy::with_attempts(config.max_retries);
        Self {
            config,
            policy,
            sender,
        }
    }

    /// Sink that never replicates anything
    pub fn disabled() -> Self {
        Self::new(
            ReplicationConfig::default(),
            LazyClient::new("replication", || async {
                Err(SinkError::Config("replication sink is disabled".to_string()))
            }),
        )
    }

    /// Override the backoff between attempts; the attempt count stays the configured one
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            max_attempts: self.policy.max_attempts,
            ..policy
        };
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Replicate the documents; failures are logged, never raised
    pub async fn replicate(&self, documents: &[Document]) -> SinkOutcome {
        if !self.is_enabled() {
            debug!("Replication disabled or misconfigured; skipping send");
            return SinkOutcome::Disabled;
        }
        if documents.is_empty() {
            return SinkOutcome::Skipped;
        }

        let sender = match self.sender.get().await {
            Ok(sender) => sender,
            Err(e) => {
                error!(error = %e, "Failed to create replication client");
                return SinkOutcome::Failed {
                    count: documents.len(),
                };
            }
        };

        let batch_size = self.config.batch_size.max(1);
        let mut outcome = SinkOutcome::Skipped;
        for batch in documents.chunks(batch_size) {
            let batch_outcome = self.send_batch(sender.as_ref(), batch).await;
            outcome = outcome.combine(batch_outcome);
        }
        outcome
    }

    async fn send_batch(&self, sender: &dyn BatchSender, batch: &[Document]) -> SinkOutcome {
        let (mut remaining, unserializable) = build_entries(batch);
        let total = remaining.len();
        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;

        while !remaining.is_empty() && attempts < max_attempts {
            if attempts > 0 {
                tokio::time::sleep(self.policy.next_backoff(attempts)).await;
            }
            attempts += 1;

            match sender.send_batch(&remaining).await {
                Ok(failed_ids) if failed_ids.is_empty() => {
                    info!(
                        "Replicated {} event(s) to queue {}",
                        remaining.len(),
                        self.queue_url()
                    );
                    remaining.clear();
                }
                Ok(failed_ids) => {
                    let failed: HashSet<&str> = failed_ids.iter().map(String::as_str).collect();
                    remaining.retain(|entry| failed.contains(entry.id.as_str()));
                    warn!(
                        "Batch send partially failed (attempt {}/{}). Retrying {} message(s)",
                        attempts,
                        max_attempts,
                        remaining.len()
                    );
                }
                Err(e) => {
                    warn!(
                        "Batch send failed (attempt {}/{}): {}",
                        attempts, max_attempts, e
                    );
                }
            }
        }

        if !remaining.is_empty() {
            error!(
                "Failed to replicate {} event(s) to queue {} after {} attempts",
                remaining.len(),
                self.queue_url(),
                attempts
            );
        }

        let failed = remaining.len() + unserializable;
        SinkOutcome::from_counts(total - remaining.len(), failed)
    }

    fn queue_url(&self) -> &str {
        self.config.queue_url.as_deref().unwrap_or_default()
    }
}

/// Serialize a batch into entries with batch-unique ids
fn build_entries(batch: &[Document]) -> (Vec<BatchEntry>, usize) {
    let mut seen = HashSet::with_capacity(batch.len());
    let mut entries = Vec::with_capacity(batch.len());
    let mut unserializable = 0;

    for (index, doc) in batch.iter().enumerate() {
        let body = match serde_json::to_string(doc) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, id = %doc.id, "Failed to serialize document for replication");
                unserializable += 1;
                continue;
            }
        };
        let mut id = doc.id.clone();
        let mut suffix = index;
        while !seen.insert(id.clone()) {
            id = format!("{}-{}", doc.id, suffix);
            suffix += 1;
        }
        entries.push(BatchEntry { id, body });
    }

    (entries, unserializable)
}
