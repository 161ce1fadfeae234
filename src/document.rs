//! Raw queue messages and the canonical documents derived from them

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

pub use builder::RawMessageBuilder;

mod builder;

/// Key of an application property as delivered by the source queue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Text key
    Text(String),
    /// Binary key, decoded lossily when normalized
    Binary(Vec<u8>),
}

impl PropertyKey {
    /// Text form of the key
    pub fn decode(&self) -> String {
        match self {
            PropertyKey::Text(key) => key.clone(),
            PropertyKey::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        PropertyKey::Text(key.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        PropertyKey::Text(key)
    }
}

impl From<Vec<u8>> for PropertyKey {
    fn from(key: Vec<u8>) -> Self {
        PropertyKey::Binary(key)
    }
}

/// Message as received from the source queue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMessage {
    /// Broker-assigned message identifier
    pub message_id: Option<String>,
    /// Number of times the message was delivered
    pub delivery_count: Option<u32>,
    /// Broker sequence number; FIFO brokers assign up to 128 bits
    pub sequence_number: Option<u128>,
    /// Time the message was enqueued
    pub enqueued_time: Option<DateTime<Utc>>,
    /// Queue the message was dead-lettered from, if any
    pub dead_letter_source: Option<String>,
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    /// Message body
    pub body: Bytes,
    /// Application-level properties in delivery order
    pub application_properties: Option<Vec<(PropertyKey, Value)>>,
    /// Source-specific token used to acknowledge the message
    pub ack_handle: Option<String>,
}

impl RawMessage {
    /// Create a new message builder
    pub fn builder() -> RawMessageBuilder {
        RawMessageBuilder::new()
    }

    /// Message id, treating an empty id as absent
    pub fn id(&self) -> Option<&str> {
        self.message_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Body of a document: parsed JSON or the raw text when parsing failed
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Value),
    Text(String),
}

impl Payload {
    /// Parse text into a payload; never fails
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Text(text.to_string()),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Structured(_) => None,
            Payload::Text(text) => Some(text),
        }
    }
}

/// Delivery metadata copied from the raw message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub message_id: Option<String>,
    pub delivery_count: Option<u32>,
    #[serde(serialize_with = "serialize_sequence")]
    pub sequence_number: Option<u128>,
    pub enqueued_time_utc: Option<String>,
    pub dead_letter_source: Option<String>,
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    pub queue_name: String,
}

impl Metadata {
    pub fn from_message(message: &RawMessage, queue_name: &str) -> Self {
        Self {
            message_id: message.message_id.clone(),
            delivery_count: message.delivery_count,
            sequence_number: message.sequence_number,
            enqueued_time_utc: message.enqueued_time.map(format_timestamp),
            dead_letter_source: message.dead_letter_source.clone(),
            content_type: message.content_type.clone(),
            correlation_id: message.correlation_id.clone(),
            queue_name: queue_name.to_string(),
        }
    }
}

/// JSON number while it fits in 64 bits, decimal text beyond that
fn serialize_sequence<S>(sequence: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match sequence.map(|seq| u64::try_from(seq).map_err(|_| seq)) {
        None => serializer.serialize_none(),
        Some(Ok(seq)) => serializer.serialize_u64(seq),
        Some(Err(seq)) => serializer.collect_str(&seq),
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Fields every serialized document carries; the partition field never overrides them
pub const RESERVED_FIELDS: &[&str] = &[
    "_id",
    "queueName",
    "metadata",
    "receivedAtUtc",
    "applicationProperties",
    "payload",
    "payloadText",
];

/// Canonical record derived from one queue message
///
/// Created once per message by the normalizer and shared read-only by every
/// sink of the drain cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub queue_name: String,
    pub metadata: Metadata,
    pub received_at: DateTime<Utc>,
    pub application_properties: Option<Map<String, Value>>,
    pub payload: Payload,
    pub partition_key: String,
    /// Name under which the partition key is serialized
    pub partition_field: String,
}

impl Document {
    /// Canonical JSON record of the document
    pub fn to_json(&self) -> Value {
        let mut record = Map::new();
        record.insert("_id".to_string(), Value::String(self.id.clone()));
        record.insert(
            "queueName".to_string(),
            Value::String(self.queue_name.clone()),
        );
        record.insert(
            "metadata".to_string(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        record.insert(
            "receivedAtUtc".to_string(),
            Value::String(format_timestamp(self.received_at)),
        );
        if let Some(props) = &self.application_properties {
            record.insert(
                "applicationProperties".to_string(),
                Value::Object(props.clone()),
            );
        }
        match &self.payload {
            Payload::Structured(value) => {
                record.insert("payload".to_string(), value.clone());
            }
            Payload::Text(text) => {
                record.insert("payloadText".to_string(), Value::String(text.clone()));
            }
        }
        if !RESERVED_FIELDS.contains(&self.partition_field.as_str()) {
            record.insert(
                self.partition_field.clone(),
                Value::String(self.partition_key.clone()),
            );
        }
        Value::Object(record)
    }

    /// Message id from the metadata, if the source assigned one
    pub fn message_id(&self) -> Option<&str> {
        self.metadata.message_id.as_deref()
    }
}

impl Serialize for Document {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(payload: Payload, partition_field: &str) -> Document {
        let message = RawMessage::builder().message_id("m-1").build();
        Document {
            id: "m-1".to_string(),
            queue_name: "telemetry".to_string(),
            metadata: Metadata::from_message(&message, "telemetry"),
            received_at: Utc::now(),
            application_properties: None,
            payload,
            partition_key: "device-7".to_string(),
            partition_field: partition_field.to_string(),
        }
    }

    #[test]
    fn test_payload_parse() {
        assert_eq!(Payload::parse("{\"a\":1}"), Payload::Structured(json!({"a": 1})));
        assert_eq!(Payload::parse("42"), Payload::Structured(json!(42)));
        assert_eq!(Payload::parse("not json"), Payload::Text("not json".to_string()));
    }

    #[test]
    fn test_structured_document_json() {
        let doc = document(Payload::Structured(json!({"t": 21})), "partitionKey");
        let record = doc.to_json();

        assert_eq!(record["_id"], "m-1");
        assert_eq!(record["payload"], json!({"t": 21}));
        assert!(record.get("payloadText").is_none());
        assert!(record.get("applicationProperties").is_none());
        assert_eq!(record["partitionKey"], "device-7");
        assert_eq!(record["metadata"]["queue_name"], "telemetry");
    }

    #[test]
    fn test_text_document_json() {
        let doc = document(Payload::Text("raw".to_string()), "pk");
        let record = doc.to_json();

        assert_eq!(record["payloadText"], "raw");
        assert!(record.get("payload").is_none());
        assert_eq!(record["pk"], "device-7");
    }

    #[test]
    fn test_partition_field_never_overrides_reserved_fields() {
        let doc = document(Payload::Text("raw".to_string()), "queueName");
        assert_eq!(doc.to_json()["queueName"], "telemetry");
    }

    #[test]
    fn test_sequence_number_serialization() {
        let small = RawMessage::builder().sequence_number(42).build();
        let large = RawMessage::builder()
            .sequence_number(u128::from(u64::MAX) + 1)
            .build();

        let small = serde_json::to_value(Metadata::from_message(&small, "q")).unwrap();
        let large = serde_json::to_value(Metadata::from_message(&large, "q")).unwrap();
        assert_eq!(small["sequence_number"], json!(42));
        assert_eq!(large["sequence_number"], json!("18446744073709551616"));
    }

    #[test]
    fn test_binary_property_key_decodes() {
        assert_eq!(PropertyKey::Binary(b"tenantId".to_vec()).decode(), "tenantId");
        assert_eq!(PropertyKey::Binary(vec![0xff, b'a']).decode(), "\u{fffd}a");
    }
}
