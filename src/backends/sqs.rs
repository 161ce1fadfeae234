//! SQS as source queue and replication target

use super::sdk_config;
use crate::config::{AwsSettings, SourceSettings};
use crate::document::RawMessage;
use crate::error::{SinkError, SourceError};
use crate::sink::{BatchEntry, BatchSender};
use crate::source::{SourceConnector, SourceQueue};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Most messages a single receive call returns
const MAX_RECEIVE_BATCH: usize = 10;
/// Longest long-poll wait SQS accepts
const MAX_WAIT_SECS: u64 = 20;

/// Opens an SQS client per drain cycle
///
/// The source connection string is the SQS endpoint URL. The queue name is
/// resolved with `GetQueueUrl` unless it already is a queue URL.
#[derive(Debug, Clone)]
pub struct SqsSourceConnector {
    aws: AwsSettings,
}

impl SqsSourceConnector {
    pub fn new(aws: AwsSettings) -> Self {
        Self { aws }
    }
}

#[async_trait]
impl SourceConnector for SqsSourceConnector {
    async fn connect(&self, settings: &SourceSettings) -> Result<Box<dyn SourceQueue>, SourceError> {
        let endpoint = settings.connection.expose();
        let endpoint = endpoint.starts_with("http").then_some(endpoint);
        let client = Client::new(&sdk_config(&self.aws, endpoint).await);

        let queue_url = if settings.queue_name.starts_with("http") {
            settings.queue_name.clone()
        } else {
            client
                .get_queue_url()
                .queue_name(&settings.queue_name)
                .send()
                .await
                .map_err(|e| SourceError::Connection(DisplayErrorContext(&e).to_string()))?
                .queue_url
                .ok_or_else(|| {
                    SourceError::Connection(format!("no URL for queue {}", settings.queue_name))
                })?
        };

        debug!(queue_url = %queue_url, "Connected to source queue");
        Ok(Box::new(SqsQueue {
            client,
            queue_url,
            queue_name: settings.queue_name.clone(),
        }))
    }
}

struct SqsQueue {
    client: Client,
    queue_url: String,
    queue_name: String,
}

#[async_trait]
impl SourceQueue for SqsQueue {
    async fn receive(
        &mut self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let deadline = Instant::now() + max_wait;
        let mut messages = Vec::with_capacity(max_messages);

        while messages.len() < max_messages {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let count = (max_messages - messages.len()).min(MAX_RECEIVE_BATCH);

            let output = self
                .client
                .receive_message()
                .queue_url(&self.queue_url)
                .max_number_of_messages(count as i32)
                .message_attribute_names("All")
                .message_system_attribute_names(MessageSystemAttributeName::All)
                .wait_time_seconds(remaining.as_secs().min(MAX_WAIT_SECS) as i32)
                .send()
                .await
                .map_err(|e| SourceError::Receive(DisplayErrorContext(&e).to_string()))?;

            let batch = output.messages.unwrap_or_default();
            if batch.is_empty() {
                break;
            }
            messages.extend(batch.into_iter().map(to_raw_message));

            if Instant::now() >= deadline {
                break;
            }
        }

        debug!(queue = %self.queue_name, count = messages.len(), "Received from SQS");
        Ok(messages)
    }

    async fn complete(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        let receipt_handle = message.ack_handle.as_deref().ok_or_else(|| {
            SourceError::Acknowledge(format!(
                "message {} has no receipt handle",
                message.id().unwrap_or_default()
            ))
        })?;

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| SourceError::Acknowledge(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), SourceError> {
        debug!(queue = %self.queue_name, "Closing SQS source client");
        Ok(())
    }
}

/// Convert an SQS message, mapping system attributes onto delivery metadata
fn to_raw_message(message: Message) -> RawMessage {
    let system = message.attributes.unwrap_or_default();
    let attribute = |name: MessageSystemAttributeName| system.get(&name).cloned();

    let mut builder = RawMessage::builder();
    if let Some(id) = message.message_id {
        builder = builder.message_id(id);
    }
    if let Some(count) = attribute(MessageSystemAttributeName::ApproximateReceiveCount)
        .and_then(|c| c.parse::<u32>().ok())
    {
        builder = builder.delivery_count(count);
    }
    if let Some(raw) = attribute(MessageSystemAttributeName::SequenceNumber) {
        match raw.parse::<u128>() {
            Ok(sequence) => builder = builder.sequence_number(sequence),
            Err(e) => warn!(sequence = %raw, error = %e, "Unparseable SQS sequence number"),
        }
    }
    if let Some(sent) = attribute(MessageSystemAttributeName::SentTimestamp)
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    {
        builder = builder.enqueued_time(sent);
    }
    if let Some(source) = attribute(MessageSystemAttributeName::DeadLetterQueueSourceArn) {
        builder = builder.dead_letter_source(source);
    }
    if let Some(handle) = message.receipt_handle {
        builder = builder.ack_handle(handle);
    }

    for (key, value) in message.message_attributes.unwrap_or_default() {
        let Some(text) = value.string_value() else {
            if let Some(blob) = value.binary_value() {
                let encoded = BASE64_STANDARD.encode(blob.as_ref());
                builder = builder.property(key, Value::String(encoded));
            }
            continue;
        };
        let property = if value.data_type().starts_with("Number") {
            serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()))
        } else {
            Value::String(text.to_string())
        };
        builder = match key.as_str() {
            "ContentType" => builder.content_type(text),
            "CorrelationId" => builder.correlation_id(text),
            _ => builder.property(key, property),
        };
    }

    builder.body(message.body.unwrap_or_default()).build()
}

/// Sends replication batches with `SendMessageBatch`
#[derive(Debug, Clone)]
pub struct SqsBatchSender {
    client: Client,
    queue_url: String,
}

impl SqsBatchSender {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a client from region and credentials
    pub async fn connect(aws: &AwsSettings, queue_url: impl Into<String>) -> Self {
        let client = Client::new(&sdk_config(aws, None).await);
        info!("Created SQS client for replication");
        Self::new(client, queue_url)
    }
}

#[async_trait]
impl BatchSender for SqsBatchSender {
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<String>, SinkError> {
        let mut request = Vec::with_capacity(entries.len());
        let mut id_correlation = HashMap::with_capacity(entries.len());

        for (index, entry) in entries.iter().enumerate() {
            let batch_id = format!("msg_{}", index);
            id_correlation.insert(batch_id.clone(), entry.id.as_str());
            request.push(
                SendMessageBatchRequestEntry::builder()
                    .id(batch_id)
                    .message_body(&entry.body)
                    .build()
                    .map_err(|e| SinkError::Config(format!("Failed to build entry: {}", e)))?,
            );
        }

        let output = self
            .client
            .send_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(request))
            .send()
            .await
            .map_err(|e| SinkError::Transport(DisplayErrorContext(&e).to_string()))?;

        let mut failed = Vec::new();
        for failure in output.failed() {
            match id_correlation.get(failure.id()) {
                Some(id) => {
                    debug!(
                        id,
                        code = failure.code(),
                        sender_fault = failure.sender_fault(),
                        "Batch entry rejected"
                    );
                    failed.push(id.to_string());
                }
                None => warn!(batch_id = failure.id(), "SQS returned unknown batch id"),
            }
        }
        Ok(failed)
    }
}
