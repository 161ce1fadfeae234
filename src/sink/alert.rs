//! Threshold alerts on environmental readings

use super::{AlertPublisher, LazyClient, SinkOutcome};
use crate::config::AlertConfig;
use crate::document::{format_timestamp, Document, Payload};
use crate::error::SinkError;
use crate::relay::retry::{RetryExecutor, RetryPolicy, RetryResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, error, info};

const HUMIDITY_ALIASES: &[&str] = &["humidity", "umidade", "humidade"];
const TEMPERATURE_ALIASES: &[&str] = &["temperature", "temperatura"];

/// Humidity and temperature extracted from a payload
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricReadings {
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

impl MetricReadings {
    /// Read the metrics from a JSON object, accepting any alias of each field
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            humidity: find_metric(object, HUMIDITY_ALIASES),
            temperature: find_metric(object, TEMPERATURE_ALIASES),
        }
    }
}

fn find_metric(object: &Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|alias| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
            .map(|(_, value)| lenient_number(value))
    })?
}

/// Number from a JSON number or numeric text; a decimal comma is accepted
fn lenient_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Thresholds a reading must stay within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertRule {
    pub min_humidity: f64,
    pub max_temperature: f64,
}

impl AlertRule {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            min_humidity: config.min_humidity,
            max_temperature: config.max_temperature,
        }
    }

    /// Human-readable reason for every violated threshold
    pub fn violations(&self, readings: &MetricReadings) -> Vec<String> {
        let mut reasons = Vec::new();
        if let Some(h) = readings.humidity.filter(|h| *h < self.min_humidity) {
            reasons.push(format!("Humidity {}% below {}%", h, self.min_humidity));
        }
        if let Some(t) = readings.temperature.filter(|t| *t > self.max_temperature) {
            reasons.push(format!(
                "Temperature {}°C above {}°C",
                t, self.max_temperature
            ));
        }
        reasons
    }
}

/// Alert message body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub reasons: Vec<String>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub queue_name: String,
    pub message_id: Option<String>,
    pub received_at_utc: String,
    pub payload: Value,
}

impl Alert {
    /// Evaluate a document against the rule; `None` when nothing is violated
    pub fn evaluate(document: &Document, rule: &AlertRule) -> Option<Self> {
        let payload = structured_payload(&document.payload)?;
        let object = payload.as_object()?;
        let readings = MetricReadings::from_object(object);
        let reasons = rule.violations(&readings);
        if reasons.is_empty() {
            return None;
        }

        Some(Self {
            reasons,
            humidity: readings.humidity,
            temperature: readings.temperature,
            queue_name: document.queue_name.clone(),
            message_id: document.message_id().map(str::to_string),
            received_at_utc: format_timestamp(document.received_at),
            payload: payload.into_owned(),
        })
    }
}

fn structured_payload(payload: &Payload) -> Option<Cow<'_, Value>> {
    match payload {
        Payload::Structured(value) => Some(Cow::Borrowed(value)),
        Payload::Text(text) => serde_json::from_str::<Value>(text).ok().map(Cow::Owned),
    }
}

/// Publishes an alert when a document's readings cross a threshold
#[derive(Debug)]
pub struct AlertNotifier {
    config: AlertConfig,
    rule: AlertRule,
    executor: RetryExecutor,
    publisher: LazyClient<dyn AlertPublisher>,
}

impl AlertNotifier {
    pub fn new(config: AlertConfig, publisher: LazyClient<dyn AlertPublisher>) -> Self {
        let rule = AlertRule::from_config(&config);
        let executor = RetryExecutor::new(RetryPolicy::with_attempts(config.max_retries));
        Self {
            config,
            rule,
            executor,
            publisher,
        }
    }

    /// Notifier that never publishes
    pub fn disabled() -> Self {
        Self::new(
            AlertConfig::default(),
            LazyClient::new("alert", || async {
                Err(SinkError::Config("alert sink is disabled".to_string()))
            }),
        )
    }

    /// Override the backoff between attempts; the attempt count stays the configured one
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        let max_attempts = self.executor.policy().max_attempts;
        self.executor = RetryExecutor::new(RetryPolicy {
            max_attempts,
            ..policy
        });
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn rule(&self) -> &AlertRule {
        &self.rule
    }

    /// Publish an alert for the document if it violates a threshold
    pub async fn maybe_notify(&self, document: &Document) -> SinkOutcome {
        if !self.is_enabled() {
            return SinkOutcome::Disabled;
        }

        let alert = match Alert::evaluate(document, &self.rule) {
            Some(alert) => alert,
            None => {
                debug!(id = %document.id, "No threshold violated");
                return SinkOutcome::Skipped;
            }
        };

        let message = match serde_json::to_string(&alert) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, id = %document.id, "Failed to serialize alert");
                return SinkOutcome::Failed { count: 1 };
            }
        };

        let publisher = match self.publisher.get().await {
            Ok(publisher) => publisher,
            Err(e) => {
                error!(error = %e, "Failed to create alert client");
                return SinkOutcome::Failed { count: 1 };
            }
        };

        let subject = self.config.subject.as_str();
        let result = self
            .executor
            .execute_with_predicate(
                || publisher.publish(subject, &message),
                SinkError::is_retryable,
            )
            .await;

        match result {
            RetryResult::Success { attempts, .. } => {
                info!(
                    reasons = ?alert.reasons,
                    attempts,
                    "Alert published for message {}",
                    document.message_id().unwrap_or(&document.id)
                );
                SinkOutcome::Delivered { count: 1 }
            }
            RetryResult::Failed { error, attempts } => {
                error!(
                    error = %error,
                    attempts,
                    "Failed to publish alert for message {}",
                    document.message_id().unwrap_or(&document.id)
                );
                SinkOutcome::Failed { count: 1 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn readings(payload: Value) -> MetricReadings {
        MetricReadings::from_object(payload.as_object().unwrap())
    }

    #[test]
    fn test_aliases_and_case() {
        let r = readings(json!({"Umidade": 40, "TEMPERATURA": "21.5"}));
        assert_eq!(r.humidity, Some(40.0));
        assert_eq!(r.temperature, Some(21.5));
    }

    #[test]
    fn test_first_alias_wins() {
        let r = readings(json!({"humidade": 10, "humidity": 55}));
        assert_eq!(r.humidity, Some(55.0));
    }

    #[test]
    fn test_unparseable_metric_is_absent() {
        let r = readings(json!({"humidity": "wet", "temperature": true}));
        assert_eq!(r, MetricReadings::default());
    }

    #[test]
    fn test_reason_formatting() {
        let rule = AlertRule {
            min_humidity: 20.0,
            max_temperature: 32.0,
        };
        let reasons = rule.violations(&MetricReadings {
            humidity: Some(15.0),
            temperature: Some(33.5),
        });
        assert_eq!(
            reasons,
            vec![
                "Humidity 15% below 20%".to_string(),
                "Temperature 33.5°C above 32°C".to_string()
            ]
        );
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let rule = AlertRule {
            min_humidity: 20.0,
            max_temperature: 32.0,
        };
        assert!(rule
            .violations(&MetricReadings {
                humidity: Some(20.0),
                temperature: Some(32.0),
            })
            .is_empty());
    }

    #[test]
    fn test_alert_json_keys() {
        let alert = Alert {
            reasons: vec!["x".to_string()],
            humidity: Some(15.0),
            temperature: None,
            queue_name: "q".to_string(),
            message_id: None,
            received_at_utc: "now".to_string(),
            payload: json!({}),
        };
        let value = serde_json::to_value(&alert).unwrap();
        for key in [
            "reasons",
            "humidity",
            "temperature",
            "queueName",
            "messageId",
            "receivedAtUtc",
            "payload",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
