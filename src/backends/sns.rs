//! SNS topic publisher for alerts

use super::sdk_config;
use crate::config::AwsSettings;
use crate::error::SinkError;
use crate::sink::AlertPublisher;
use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use tracing::{debug, info};

/// Publishes alert messages to one SNS topic
#[derive(Debug, Clone)]
pub struct SnsAlertPublisher {
    client: Client,
    topic_arn: String,
}

impl SnsAlertPublisher {
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    /// Build a client from region and credentials
    pub async fn connect(aws: &AwsSettings, topic_arn: impl Into<String>) -> Self {
        let client = Client::new(&sdk_config(aws, None).await);
        info!("Created SNS client for alerts");
        Self::new(client, topic_arn)
    }
}

#[async_trait]
impl AlertPublisher for SnsAlertPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), SinkError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| SinkError::Transport(DisplayErrorContext(&e).to_string()))?;

        debug!(message_id = output.message_id(), "Alert published to SNS");
        Ok(())
    }
}
