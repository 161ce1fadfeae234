//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use queue_relay::config::{
    AlertConfig, AwsSettings, ReplicationConfig, Secret, SourceConfig, SourceSettings,
    StorageConfig,
};
use queue_relay::document::RawMessage;
use queue_relay::error::{SinkError, SourceError};
use queue_relay::sink::{AlertPublisher, BatchEntry, BatchSender, DocumentStore};
use queue_relay::source::{SourceConnector, SourceQueue};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const QUEUE: &str = "telemetry-in";

/// What the fake source saw during a test
#[derive(Debug, Default)]
pub struct SourceState {
    pub pending: Vec<RawMessage>,
    pub fail_connect: bool,
    pub fail_receive: bool,
    /// Message ids whose acknowledgment fails
    pub fail_ack: HashSet<String>,
    pub connects: usize,
    pub receive_calls: usize,
    pub completed: Vec<String>,
    pub closed: usize,
}

/// Source connector handing out queues backed by one shared state
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub state: Arc<Mutex<SourceState>>,
}

impl FakeSource {
    pub fn with_messages(messages: Vec<RawMessage>) -> Self {
        let source = Self::default();
        source.state.lock().pending = messages;
        source
    }

    pub fn completed(&self) -> Vec<String> {
        self.state.lock().completed.clone()
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }
}

#[async_trait]
impl SourceConnector for FakeSource {
    async fn connect(&self, _settings: &SourceSettings) -> Result<Box<dyn SourceQueue>, SourceError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail_connect {
            return Err(SourceError::Connection("broker unreachable".to_string()));
        }
        Ok(Box::new(FakeQueue {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeQueue {
    state: Arc<Mutex<SourceState>>,
}

#[async_trait]
impl SourceQueue for FakeQueue {
    async fn receive(
        &mut self,
        max_messages: usize,
        _max_wait: Duration,
    ) -> Result<Vec<RawMessage>, SourceError> {
        let mut state = self.state.lock();
        state.receive_calls += 1;
        if state.fail_receive {
            return Err(SourceError::Receive("receive timed out".to_string()));
        }
        let count = max_messages.min(state.pending.len());
        Ok(state.pending.drain(..count).collect())
    }

    async fn complete(&mut self, message: &RawMessage) -> Result<(), SourceError> {
        let id = message.id().unwrap_or_default().to_string();
        let mut state = self.state.lock();
        if state.fail_ack.contains(&id) {
            return Err(SourceError::Acknowledge(format!("lock lost for {}", id)));
        }
        state.completed.push(id);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), SourceError> {
        self.state.lock().closed += 1;
        Ok(())
    }
}

/// Document store recording every insert
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inserts: Mutex<Vec<Vec<Value>>>,
    pub fail: bool,
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn insert_many(&self, documents: Vec<Value>) -> Result<usize, SinkError> {
        if self.fail {
            return Err(SinkError::Transport("connection reset".to_string()));
        }
        let count = documents.len();
        self.inserts.lock().push(documents);
        Ok(count)
    }
}

/// Batch sender replaying scripted responses, then accepting everything
#[derive(Debug, Default)]
pub struct ScriptedSender {
    pub calls: Mutex<Vec<Vec<BatchEntry>>>,
    pub script: Mutex<VecDeque<Result<Vec<String>, SinkError>>>,
}

impl ScriptedSender {
    pub fn with_script(script: Vec<Result<Vec<String>, SinkError>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<BatchEntry>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BatchSender for ScriptedSender {
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<String>, SinkError> {
        self.calls.lock().push(entries.to_vec());
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Alert publisher recording every message
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AlertPublisher for RecordingPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), SinkError> {
        self.published
            .lock()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

pub fn aws() -> AwsSettings {
    AwsSettings {
        region: Some("us-east-1".to_string()),
        access_key_id: Some("AKIATEST".to_string()),
        secret_access_key: Some(Secret::new("secret")),
        session_token: None,
    }
}

pub fn source_config() -> SourceConfig {
    SourceConfig {
        connection: Some(Secret::new("Endpoint=sb://relay.test/")),
        queue_name: Some(QUEUE.to_string()),
        ..Default::default()
    }
}

pub fn storage_config() -> StorageConfig {
    StorageConfig {
        enabled: true,
        connection_string: Some(Secret::new("mongodb://localhost:27017")),
        database: Some("iot".to_string()),
        collection: Some("readings".to_string()),
        ..Default::default()
    }
}

pub fn replication_config() -> ReplicationConfig {
    ReplicationConfig {
        enabled: true,
        queue_url: Some("https://sqs.us-east-1.amazonaws.com/123456789012/replica".to_string()),
        aws: aws(),
        ..Default::default()
    }
}

pub fn alert_config() -> AlertConfig {
    AlertConfig {
        enabled: true,
        topic_arn: Some("arn:aws:sns:us-east-1:123456789012:alerts".to_string()),
        aws: aws(),
        ..Default::default()
    }
}

/// Message with a JSON body and a deterministic id
pub fn reading(index: usize, humidity: f64, temperature: f64) -> RawMessage {
    RawMessage::builder()
        .message_id(format!("msg-{}", index))
        .sequence_number(index as u128 + 1)
        .delivery_count(1)
        .json_body(&json!({
            "deviceId": format!("sensor-{}", index),
            "humidity": humidity,
            "temperature": temperature,
        }))
        .ack_handle(format!("receipt-{}", index))
        .build()
}

pub fn readings(count: usize) -> Vec<RawMessage> {
    (0..count).map(|i| reading(i, 45.0, 22.0)).collect()
}
