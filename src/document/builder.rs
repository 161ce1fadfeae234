use super::{PropertyKey, RawMessage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Builder for raw queue messages, used by sources and tests
pub struct RawMessageBuilder {
    message: RawMessage,
}

impl RawMessageBuilder {
    /// Create a new RawMessageBuilder
    pub fn new() -> Self {
        Self {
            message: RawMessage::default(),
        }
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message.message_id = Some(id.into());
        self
    }

    pub fn delivery_count(mut self, count: u32) -> Self {
        self.message.delivery_count = Some(count);
        self
    }

    pub fn sequence_number(mut self, sequence: u128) -> Self {
        self.message.sequence_number = Some(sequence);
        self
    }

    pub fn enqueued_time(mut self, time: DateTime<Utc>) -> Self {
        self.message.enqueued_time = Some(time);
        self
    }

    pub fn dead_letter_source(mut self, source: impl Into<String>) -> Self {
        self.message.dead_letter_source = Some(source.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.message.content_type = Some(content_type.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.message.correlation_id = Some(id.into());
        self
    }

    /// Set the body bytes
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.message.body = body.into();
        self
    }

    /// Set the body to the serialized form of a JSON value
    pub fn json_body(self, value: &Value) -> Self {
        let text = value.to_string();
        self.body(text)
    }

    /// Add an application property
    pub fn property(mut self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.message
            .application_properties
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn ack_handle(mut self, handle: impl Into<String>) -> Self {
        self.message.ack_handle = Some(handle.into());
        self
    }

    /// Build the RawMessage
    pub fn build(self) -> RawMessage {
        self.message
    }
}

impl Default for RawMessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
