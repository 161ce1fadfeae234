//! Relay configuration resolved from the process environment
//!
//! All settings are read once at startup through [`RelayConfig::load`]; nothing
//! in the relay reads the environment afterwards. Each sink is enabled only when
//! its explicit flag is truthy and every required parameter is present.

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Environment variable names understood by the relay
pub mod keys {
    pub const SOURCE_CONNECTION: &str = "RELAY_SOURCE_CONNECTION";
    pub const SOURCE_QUEUE: &str = "RELAY_SOURCE_QUEUE";
    pub const MAX_MESSAGE_COUNT: &str = "RELAY_MAX_MESSAGE_COUNT";
    pub const MAX_WAIT_TIME: &str = "RELAY_MAX_WAIT_TIME";
    pub const SCHEDULE_INTERVAL_SECS: &str = "RELAY_SCHEDULE_INTERVAL_SECS";
    pub const RUN_ON_STARTUP: &str = "RELAY_RUN_ON_STARTUP";

    pub const MONGO_ENABLED: &str = "MONGO_ENABLED";
    pub const MONGO_CONN_STRING: &str = "MONGO_CONN_STRING";
    pub const MONGO_DB: &str = "MONGO_DB";
    pub const MONGO_COLLECTION: &str = "MONGO_COLLECTION";
    pub const MONGO_PARTITION_FIELD: &str = "MONGO_PARTITION_FIELD";

    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
    pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

    pub const SQS_ENABLED: &str = "SQS_ENABLED";
    pub const SQS_QUEUE_URL: &str = "SQS_QUEUE_URL";
    pub const SQS_BATCH_SIZE: &str = "SQS_BATCH_SIZE";
    pub const SQS_MAX_RETRIES: &str = "SQS_MAX_RETRIES";

    pub const SNS_ENABLED: &str = "SNS_ENABLED";
    pub const SNS_TOPIC_ARN: &str = "SNS_TOPIC_ARN";
    pub const SNS_SUBJECT: &str = "SNS_SUBJECT";
    pub const SNS_MIN_HUMIDITY: &str = "SNS_MIN_HUMIDITY";
    pub const SNS_MAX_TEMPERATURE: &str = "SNS_MAX_TEMPERATURE";
    pub const SNS_MAX_RETRIES: &str = "SNS_MAX_RETRIES";
}

/// Default receive batch size
pub const DEFAULT_MAX_MESSAGE_COUNT: usize = 25;
/// Default receive wait in seconds
pub const DEFAULT_MAX_WAIT_SECS: u64 = 5;
/// Default scheduler period (every five minutes)
pub const DEFAULT_SCHEDULE_INTERVAL_SECS: u64 = 300;
/// Default partition field written into stored documents
pub const DEFAULT_PARTITION_FIELD: &str = "partitionKey";
/// Largest batch the replication queue accepts per call
pub const MAX_REPLICATION_BATCH_SIZE: usize = 10;
/// Default replication batch size
pub const DEFAULT_REPLICATION_BATCH_SIZE: usize = 10;
/// Default attempt count for replication and alert publishing
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default alert subject
pub const DEFAULT_ALERT_SUBJECT: &str = "IoT Environmental Alert";
/// Default minimum humidity (percent)
pub const DEFAULT_MIN_HUMIDITY: f64 = 20.0;
/// Default maximum temperature (Celsius)
pub const DEFAULT_MAX_TEMPERATURE: f64 = 32.0;

/// Source of configuration variables
pub trait Environment {
    /// Raw value of a variable, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads variables from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: Environment + ?Sized> Environment for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// Interpret a flag value; `1`, `true`, `yes` and `on` are truthy
pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn lookup<E: Environment>(env: &E, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<E, T>(env: &E, key: &str, default: T) -> T
where
    E: Environment,
    T: FromStr + fmt::Debug,
{
    match lookup(env, key) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, ?default, "Invalid numeric setting, using default");
                default
            }
        },
        None => default,
    }
}

fn parse_finite_or<E: Environment>(env: &E, key: &str, default: f64) -> f64 {
    let value = parse_or(env, key, default);
    if value.is_finite() {
        value
    } else {
        warn!(key, value, default, "Non-finite threshold, using default");
        default
    }
}

/// String that never appears in logs
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a sensitive value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the wrapped value
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// Source queue settings
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Queue connection string
    pub connection: Option<Secret>,
    /// Queue name
    pub queue_name: Option<String>,
    /// Maximum messages pulled per drain cycle
    pub max_message_count: usize,
    /// Maximum time to wait for messages
    pub max_wait_time: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection: None,
            queue_name: None,
            max_message_count: DEFAULT_MAX_MESSAGE_COUNT,
            max_wait_time: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
        }
    }
}

/// Source settings with every required parameter present
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub connection: Secret,
    pub queue_name: String,
    pub max_message_count: usize,
    pub max_wait_time: Duration,
}

impl SourceConfig {
    /// Check the required parameters; a missing one aborts the drain cycle
    pub fn settings(&self) -> Result<SourceSettings, ConfigError> {
        let connection = self
            .connection
            .clone()
            .ok_or_else(|| ConfigError::Missing(keys::SOURCE_CONNECTION.to_string()))?;
        let queue_name = self
            .queue_name
            .clone()
            .ok_or_else(|| ConfigError::Missing(keys::SOURCE_QUEUE.to_string()))?;

        Ok(SourceSettings {
            connection,
            queue_name,
            max_message_count: self.max_message_count,
            max_wait_time: self.max_wait_time,
        })
    }
}

/// AWS region and credentials shared by the replication and alert sinks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<Secret>,
    pub session_token: Option<Secret>,
}

impl AwsSettings {
    fn load<E: Environment>(env: &E) -> Self {
        Self {
            region: lookup(env, keys::AWS_REGION),
            access_key_id: lookup(env, keys::AWS_ACCESS_KEY_ID),
            secret_access_key: lookup(env, keys::AWS_SECRET_ACCESS_KEY).map(Secret::new),
            session_token: lookup(env, keys::AWS_SESSION_TOKEN).map(Secret::new),
        }
    }

    /// Region, access key and secret key are all present
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Variables that must be set before an AWS client can be built
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.region.is_none() {
            missing.push(keys::AWS_REGION);
        }
        if self.access_key_id.is_none() {
            missing.push(keys::AWS_ACCESS_KEY_ID);
        }
        if self.secret_access_key.is_none() {
            missing.push(keys::AWS_SECRET_ACCESS_KEY);
        }
        missing
    }
}

/// Document storage sink settings
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub enabled: bool,
    pub connection_string: Option<Secret>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub partition_field: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            connection_string: None,
            database: None,
            collection: None,
            partition_field: DEFAULT_PARTITION_FIELD.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.missing_required().is_empty()
    }

    /// Required variables that are unset or blank
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (keys::MONGO_CONN_STRING, self.connection_string.is_none()),
            (keys::MONGO_DB, self.database.is_none()),
            (keys::MONGO_COLLECTION, self.collection.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, missing)| missing.then_some(key))
        .collect()
    }
}

/// Replication queue sink settings
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationConfig {
    pub enabled: bool,
    pub queue_url: Option<String>,
    pub aws: AwsSettings,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_url: None,
            aws: AwsSettings::default(),
            batch_size: DEFAULT_REPLICATION_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ReplicationConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.missing_required().is_empty()
    }

    /// Required variables that are unset or blank
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = self.aws.missing_required();
        if self.queue_url.is_none() {
            missing.insert(0, keys::SQS_QUEUE_URL);
        }
        missing
    }
}

/// Threshold alert sink settings
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub enabled: bool,
    pub topic_arn: Option<String>,
    pub aws: AwsSettings,
    pub subject: String,
    pub min_humidity: f64,
    pub max_temperature: f64,
    pub max_retries: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            topic_arn: None,
            aws: AwsSettings::default(),
            subject: DEFAULT_ALERT_SUBJECT.to_string(),
            min_humidity: DEFAULT_MIN_HUMIDITY,
            max_temperature: DEFAULT_MAX_TEMPERATURE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl AlertConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.missing_required().is_empty()
    }

    /// Required variables that are unset or blank
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = self.aws.missing_required();
        if self.topic_arn.is_none() {
            missing.insert(0, keys::SNS_TOPIC_ARN);
        }
        missing
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Time between drain cycles
    pub interval: Duration,
    /// Fire a cycle as soon as the scheduler starts
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SCHEDULE_INTERVAL_SECS),
            run_on_startup: false,
        }
    }
}

/// Sink identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Storage,
    Replication,
    Alert,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Storage => "storage",
            SinkKind::Replication => "replication",
            SinkKind::Alert => "alert",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved configuration of one sink
#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
    Storage(StorageConfig),
    Replication(ReplicationConfig),
    Alert(AlertConfig),
}

impl SinkConfig {
    pub fn kind(&self) -> SinkKind {
        match self {
            SinkConfig::Storage(_) => SinkKind::Storage,
            SinkConfig::Replication(_) => SinkKind::Replication,
            SinkConfig::Alert(_) => SinkKind::Alert,
        }
    }

    /// Flag truthy and every required parameter present
    pub fn is_enabled(&self) -> bool {
        match self {
            SinkConfig::Storage(c) => c.is_enabled(),
            SinkConfig::Replication(c) => c.is_enabled(),
            SinkConfig::Alert(c) => c.is_enabled(),
        }
    }

    /// Whether the sink's flag is truthy, regardless of its parameters
    pub fn is_requested(&self) -> bool {
        match self {
            SinkConfig::Storage(c) => c.enabled,
            SinkConfig::Replication(c) => c.enabled,
            SinkConfig::Alert(c) => c.enabled,
        }
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        match self {
            SinkConfig::Storage(c) => c.missing_required(),
            SinkConfig::Replication(c) => c.missing_required(),
            SinkConfig::Alert(c) => c.missing_required(),
        }
    }
}

/// Resolves per-sink settings from an [`Environment`]
#[derive(Debug, Clone)]
pub struct ConfigResolver<E> {
    env: E,
}

impl<E: Environment> ConfigResolver<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Resolve the settings of one sink
    pub fn resolve(&self, kind: SinkKind) -> SinkConfig {
        match kind {
            SinkKind::Storage => SinkConfig::Storage(self.storage()),
            SinkKind::Replication => SinkConfig::Replication(self.replication()),
            SinkKind::Alert => SinkConfig::Alert(self.alert()),
        }
    }

    pub fn source(&self) -> SourceConfig {
        let env = &self.env;
        SourceConfig {
            connection: lookup(env, keys::SOURCE_CONNECTION).map(Secret::new),
            queue_name: lookup(env, keys::SOURCE_QUEUE),
            max_message_count: parse_or(env, keys::MAX_MESSAGE_COUNT, DEFAULT_MAX_MESSAGE_COUNT)
                .max(1),
            max_wait_time: Duration::from_secs(parse_or(
                env,
                keys::MAX_WAIT_TIME,
                DEFAULT_MAX_WAIT_SECS,
            )),
        }
    }

    pub fn storage(&self) -> StorageConfig {
        let env = &self.env;
        StorageConfig {
            enabled: is_truthy(env.var(keys::MONGO_ENABLED).as_deref()),
            connection_string: lookup(env, keys::MONGO_CONN_STRING).map(Secret::new),
            database: lookup(env, keys::MONGO_DB),
            collection: lookup(env, keys::MONGO_COLLECTION),
            partition_field: lookup(env, keys::MONGO_PARTITION_FIELD)
                .unwrap_or_else(|| DEFAULT_PARTITION_FIELD.to_string()),
        }
    }

    pub fn replication(&self) -> ReplicationConfig {
        let env = &self.env;
        ReplicationConfig {
            enabled: is_truthy(env.var(keys::SQS_ENABLED).as_deref()),
            queue_url: lookup(env, keys::SQS_QUEUE_URL),
            aws: AwsSettings::load(env),
            batch_size: parse_or(env, keys::SQS_BATCH_SIZE, DEFAULT_REPLICATION_BATCH_SIZE)
                .clamp(1, MAX_REPLICATION_BATCH_SIZE),
            max_retries: parse_or(env, keys::SQS_MAX_RETRIES, DEFAULT_MAX_RETRIES).max(1),
        }
    }

    pub fn alert(&self) -> AlertConfig {
        let env = &self.env;
        AlertConfig {
            enabled: is_truthy(env.var(keys::SNS_ENABLED).as_deref()),
            topic_arn: lookup(env, keys::SNS_TOPIC_ARN),
            aws: AwsSettings::load(env),
            subject: lookup(env, keys::SNS_SUBJECT)
                .unwrap_or_else(|| DEFAULT_ALERT_SUBJECT.to_string()),
            min_humidity: parse_finite_or(env, keys::SNS_MIN_HUMIDITY, DEFAULT_MIN_HUMIDITY),
            max_temperature: parse_finite_or(
                env,
                keys::SNS_MAX_TEMPERATURE,
                DEFAULT_MAX_TEMPERATURE,
            ),
            max_retries: parse_or(env, keys::SNS_MAX_RETRIES, DEFAULT_MAX_RETRIES).max(1),
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        let env = &self.env;
        ScheduleConfig {
            interval: Duration::from_secs(
                parse_or(
                    env,
                    keys::SCHEDULE_INTERVAL_SECS,
                    DEFAULT_SCHEDULE_INTERVAL_SECS,
                )
                .max(1),
            ),
            run_on_startup: is_truthy(env.var(keys::RUN_ON_STARTUP).as_deref()),
        }
    }
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayConfig {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub replication: ReplicationConfig,
    pub alert: AlertConfig,
    pub schedule: ScheduleConfig,
}

impl RelayConfig {
    /// Load every section from the given environment
    pub fn load<E: Environment>(env: E) -> Self {
        let resolver = ConfigResolver::new(env);
        let config = Self {
            source: resolver.source(),
            storage: resolver.storage(),
            replication: resolver.replication(),
            alert: resolver.alert(),
            schedule: resolver.schedule(),
        };
        for (kind, missing) in config.misconfigured_sinks() {
            warn!(
                sink = %kind,
                missing = %missing.join(", "),
                "Sink requested but disabled: required settings are missing"
            );
        }
        config
    }

    /// Sinks whose flag is truthy but which lack required settings
    pub fn misconfigured_sinks(&self) -> Vec<(SinkKind, Vec<&'static str>)> {
        [
            SinkConfig::Storage(self.storage.clone()),
            SinkConfig::Replication(self.replication.clone()),
            SinkConfig::Alert(self.alert.clone()),
        ]
        .into_iter()
        .filter(|sink| sink.is_requested())
        .filter_map(|sink| {
            let missing = sink.missing_required();
            (!missing.is_empty()).then(|| (sink.kind(), missing))
        })
        .collect()
    }

    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::load(ProcessEnv)
    }

    /// Create a new relay config builder
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }

    /// Whether at least one sink will receive documents
    pub fn any_sink_enabled(&self) -> bool {
        self.storage.is_enabled() || self.replication.is_enabled() || self.alert.is_enabled()
    }
}

/// Builder for RelayConfig
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Create a builder with every sink disabled
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    /// Set the source queue connection and name
    pub fn source(mut self, connection: impl Into<String>, queue_name: impl Into<String>) -> Self {
        self.config.source.connection = Some(Secret::new(connection));
        self.config.source.queue_name = Some(queue_name.into());
        self
    }

    /// Set the receive batch size
    pub fn max_message_count(mut self, count: usize) -> Self {
        self.config.source.max_message_count = count;
        self
    }

    /// Set the receive wait time
    pub fn max_wait_time(mut self, wait: Duration) -> Self {
        self.config.source.max_wait_time = wait;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn replication(mut self, replication: ReplicationConfig) -> Self {
        self.config.replication = replication;
        self
    }

    pub fn alert(mut self, alert: AlertConfig) -> Self {
        self.config.alert = alert;
        self
    }

    pub fn schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.config.schedule = schedule;
        self
    }

    /// Build the relay configuration
    pub fn build(self) -> RelayConfig {
        self.config
    }
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(is_truthy(Some(value)), "{value} should be truthy");
        }
        for value in ["0", "false", "", "enabled"] {
            assert!(!is_truthy(Some(value)), "{value} should be falsy");
        }
        assert!(!is_truthy(None));
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RelayConfig::load(HashMap::new());
        assert_eq!(config.source.max_message_count, 25);
        assert_eq!(config.source.max_wait_time, Duration::from_secs(5));
        assert_eq!(config.storage.partition_field, "partitionKey");
        assert_eq!(config.replication.batch_size, 10);
        assert_eq!(config.replication.max_retries, 3);
        assert_eq!(config.alert.subject, "IoT Environmental Alert");
        assert_eq!(config.schedule.interval, Duration::from_secs(300));
        assert!(!config.any_sink_enabled());
    }

    #[test]
    fn test_missing_source_settings() {
        let config = RelayConfig::load(env(&[(keys::SOURCE_CONNECTION, "Endpoint=sb://x")]));
        assert_eq!(
            config.source.settings(),
            Err(ConfigError::Missing(keys::SOURCE_QUEUE.to_string()))
        );
    }

    #[test]
    fn test_flag_without_parameters_stays_disabled() {
        let resolver = ConfigResolver::new(env(&[(keys::MONGO_ENABLED, "true")]));
        assert!(!resolver.resolve(SinkKind::Storage).is_enabled());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let resolver = ConfigResolver::new(env(&[
            (keys::SQS_BATCH_SIZE, "lots"),
            (keys::SNS_MIN_HUMIDITY, "dry"),
        ]));
        assert_eq!(resolver.replication().batch_size, DEFAULT_REPLICATION_BATCH_SIZE);
        assert_eq!(resolver.alert().min_humidity, DEFAULT_MIN_HUMIDITY);
    }

    #[test]
    fn test_misconfigured_sinks_name_missing_keys() {
        let config = RelayConfig::load(env(&[
            (keys::SQS_ENABLED, "true"),
            ("SQS_QUEUE_ULR", "https://sqs/replica"),
            (keys::AWS_REGION, "us-east-1"),
            (keys::MONGO_ENABLED, "1"),
            (keys::MONGO_CONN_STRING, "mongodb://db:27017"),
            (keys::MONGO_DB, "iot"),
            (keys::MONGO_COLLECTION, "readings"),
        ]));

        assert!(config.storage.is_enabled());
        assert_eq!(
            config.misconfigured_sinks(),
            vec![(
                SinkKind::Replication,
                vec![
                    keys::SQS_QUEUE_URL,
                    keys::AWS_ACCESS_KEY_ID,
                    keys::AWS_SECRET_ACCESS_KEY,
                ],
            )]
        );
    }

    #[test]
    fn test_unrequested_sinks_are_not_reported() {
        let config = RelayConfig::load(env(&[(keys::SNS_TOPIC_ARN, "arn:aws:sns:x")]));
        assert!(config.misconfigured_sinks().is_empty());
        assert_eq!(
            config.alert.missing_required(),
            vec![
                keys::AWS_REGION,
                keys::AWS_ACCESS_KEY_ID,
                keys::AWS_SECRET_ACCESS_KEY,
            ]
        );
    }

    #[test]
    fn test_non_finite_thresholds_fall_back() {
        let resolver = ConfigResolver::new(env(&[
            (keys::SNS_MIN_HUMIDITY, "NaN"),
            (keys::SNS_MAX_TEMPERATURE, "inf"),
        ]));
        let alert = resolver.alert();
        assert_eq!(alert.min_humidity, DEFAULT_MIN_HUMIDITY);
        assert_eq!(alert.max_temperature, DEFAULT_MAX_TEMPERATURE);
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let resolver = ConfigResolver::new(env(&[(keys::SQS_BATCH_SIZE, "50")]));
        assert_eq!(resolver.replication().batch_size, MAX_REPLICATION_BATCH_SIZE);
    }

    #[test]
    fn test_secrets_are_redacted() {
        let aws = AwsSettings {
            secret_access_key: Some(Secret::new("hunter2")),
            ..Default::default()
        };
        assert!(!format!("{:?}", aws).contains("hunter2"));
    }
}
