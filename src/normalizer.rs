//! Converts raw queue messages into canonical documents

use crate::config::DEFAULT_PARTITION_FIELD;
use crate::document::{Document, Metadata, Payload, RawMessage};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Property names consulted for an explicit partition hint, in priority order
const PROPERTY_PARTITION_HINTS: &[&str] = &["partitionKey", "tenantId"];
/// Payload fields consulted for a partition hint, in priority order
const PAYLOAD_PARTITION_HINTS: &[&str] = &["tenantId", "deviceId"];

/// Normalizes raw messages into [`Document`]s
#[derive(Debug, Clone)]
pub struct Normalizer {
    partition_field: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION_FIELD)
    }
}

impl Normalizer {
    /// Create a normalizer writing the partition key under `partition_field`
    pub fn new(partition_field: impl Into<String>) -> Self {
        Self {
            partition_field: partition_field.into(),
        }
    }

    pub fn partition_field(&self) -> &str {
        &self.partition_field
    }

    /// Build the canonical document for one message
    ///
    /// Never fails: a body that is not valid JSON is kept as text, and invalid
    /// UTF-8 sequences are replaced.
    pub fn normalize(&self, message: &RawMessage, queue_name: &str) -> Document {
        let text = String::from_utf8_lossy(&message.body);
        let payload = Payload::parse(&text);
        let application_properties = decode_properties(message);

        let id = document_id(message, queue_name);
        let partition_key = partition_hint(application_properties.as_ref(), &payload)
            .or_else(|| message.id().map(str::to_string))
            .or_else(|| {
                message
                    .sequence_number
                    .filter(|seq| *seq != 0)
                    .map(|seq| seq.to_string())
            })
            .or_else(|| Some(queue_name.to_string()).filter(|q| !q.is_empty()))
            .unwrap_or_else(|| id.clone());

        Document {
            id,
            queue_name: queue_name.to_string(),
            metadata: Metadata::from_message(message, queue_name),
            received_at: Utc::now(),
            application_properties,
            payload,
            partition_key,
            partition_field: self.partition_field.clone(),
        }
    }
}

/// Message id, or `{queue}-{sequence}-{random}` when the source assigned none
fn document_id(message: &RawMessage, queue_name: &str) -> String {
    match message.id() {
        Some(id) => id.to_string(),
        None => {
            let sequence = message
                .sequence_number
                .map(|seq| seq.to_string())
                .unwrap_or_else(|| "none".to_string());
            format!("{}-{}-{}", queue_name, sequence, Uuid::new_v4().simple())
        }
    }
}

fn decode_properties(message: &RawMessage) -> Option<Map<String, Value>> {
    let props = message.application_properties.as_ref()?;
    if props.is_empty() {
        return None;
    }
    Some(
        props
            .iter()
            .map(|(key, value)| (key.decode(), value.clone()))
            .collect(),
    )
}

fn partition_hint(properties: Option<&Map<String, Value>>, payload: &Payload) -> Option<String> {
    let from_properties = properties.and_then(|props| {
        PROPERTY_PARTITION_HINTS
            .iter()
            .find_map(|key| props.get(*key).and_then(hint_value))
    });
    if from_properties.is_some() {
        return from_properties;
    }

    match payload {
        Payload::Structured(Value::Object(fields)) => PAYLOAD_PARTITION_HINTS
            .iter()
            .find_map(|key| fields.get(*key).and_then(hint_value)),
        _ => None,
    }
}

/// Usable hint text; empty strings, zero, false and null are not hints
fn hint_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_structured_body() {
        let message = RawMessage::builder()
            .message_id("abc")
            .json_body(&json!({"deviceId": "esp-1", "temperature": 30}))
            .build();
        let doc = Normalizer::default().normalize(&message, "telemetry");

        assert_eq!(doc.id, "abc");
        assert_eq!(
            doc.payload,
            Payload::Structured(json!({"deviceId": "esp-1", "temperature": 30}))
        );
        assert_eq!(doc.partition_key, "esp-1");
        assert!(doc.application_properties.is_none());
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_text() {
        let message = RawMessage::builder()
            .sequence_number(9)
            .body(vec![b'h', b'i', 0xff])
            .build();
        let doc = Normalizer::default().normalize(&message, "telemetry");

        assert_eq!(doc.payload, Payload::Text("hi\u{fffd}".to_string()));
        assert_eq!(doc.partition_key, "9");
        assert!(doc.id.starts_with("telemetry-9-"));
    }

    #[test]
    fn test_property_hint_beats_payload() {
        let message = RawMessage::builder()
            .message_id("abc")
            .property(b"tenantId".to_vec(), "tenant-a")
            .json_body(&json!({"deviceId": "esp-1"}))
            .build();
        let doc = Normalizer::default().normalize(&message, "telemetry");

        assert_eq!(doc.partition_key, "tenant-a");
        let props = doc.application_properties.unwrap();
        assert_eq!(props.get("tenantId"), Some(&json!("tenant-a")));
    }

    #[test]
    fn test_partition_key_on_text_payload_ignores_body() {
        let message = RawMessage::builder()
            .message_id("abc")
            .body("tenantId=xyz")
            .build();
        let doc = Normalizer::default().normalize(&message, "telemetry");
        assert_eq!(doc.partition_key, "abc");
    }

    #[test]
    fn test_queue_name_is_last_named_fallback() {
        let message = RawMessage::builder().body("plain").build();
        let doc = Normalizer::default().normalize(&message, "telemetry");

        assert_eq!(doc.partition_key, "telemetry");
        assert!(doc.id.starts_with("telemetry-none-"));
    }

    #[test]
    fn test_empty_queue_name_still_yields_partition_key() {
        let message = RawMessage::builder().body("plain").build();
        let doc = Normalizer::default().normalize(&message, "");
        assert!(!doc.partition_key.is_empty());
        assert_eq!(doc.partition_key, doc.id);
    }
}
