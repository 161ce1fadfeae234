//! Concrete collaborators for the source and sink seams
//!
//! - `aws`: [`sqs::SqsSourceConnector`], [`sqs::SqsBatchSender`] and
//!   [`sns::SnsAlertPublisher`]
//! - `mongo`: [`mongo::MongoDocumentStore`]

#[cfg(feature = "mongo")]
pub mod mongo;
#[cfg(feature = "aws")]
pub mod sns;
#[cfg(feature = "aws")]
pub mod sqs;

#[cfg(feature = "aws")]
pub use aws::sdk_config;

#[cfg(feature = "aws")]
mod aws {
    use crate::config::AwsSettings;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use aws_sdk_sqs::config::Credentials;

    /// Shared AWS configuration built from explicit region and credentials
    ///
    /// Missing credentials fall back to the default provider chain.
    pub async fn sdk_config(settings: &AwsSettings, endpoint_url: Option<&str>) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access_key), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret.expose().to_string(),
                settings
                    .session_token
                    .as_ref()
                    .map(|token| token.expose().to_string()),
                None,
                "queue-relay",
            ));
        }
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        tracing::info!(region = ?settings.region, "Loading AWS configuration");
        loader.load().await
    }
}
