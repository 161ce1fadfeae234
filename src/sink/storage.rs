//! Best-effort bulk persistence of documents

use super::{DocumentStore, LazyClient, SinkOutcome};
use crate::config::StorageConfig;
use crate::document::Document;
use tracing::{debug, error, info};

/// Persists each drain cycle's documents with a single unordered insert
#[derive(Debug)]
pub struct StorageSink {
    config: StorageConfig,
    store: LazyClient<dyn DocumentStore>,
}

impl StorageSink {
    pub fn new(config: StorageConfig, store: LazyClient<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    /// Sink that never persists anything
    pub fn disabled() -> Self {
        Self::new(
            StorageConfig::default(),
            LazyClient::new("storage", || async {
                Err(crate::error::SinkError::Config(
                    "storage sink is disabled".to_string(),
                ))
            }),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Insert the documents; failures are logged, never raised
    pub async fn persist(&self, documents: &[Document]) -> SinkOutcome {
        if !self.is_enabled() {
            debug!("Storage disabled or misconfigured; skipping insert");
            return SinkOutcome::Disabled;
        }
        if documents.is_empty() {
            return SinkOutcome::Skipped;
        }

        let records: Vec<_> = documents.iter().map(Document::to_json).collect();
        let count = records.len();
        let collection = self.config.collection.as_deref().unwrap_or_default();

        let store = match self.store.get().await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, collection, "Failed to connect to document storage");
                return SinkOutcome::Failed { count };
            }
        };

        match store.insert_many(records).await {
            Ok(inserted) => {
                info!("Persisted {} document(s) to collection '{}'", inserted, collection);
                SinkOutcome::from_counts(inserted, count.saturating_sub(inserted))
            }
            Err(e) => {
                error!(error = %e, collection, count, "Failed to persist documents");
                SinkOutcome::Failed { count }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::document::RawMessage;
    use crate::error::SinkError;
    use crate::normalizer::Normalizer;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    /// Store that keeps at most `capacity` documents per insert
    struct CappedStore {
        capacity: usize,
    }

    #[async_trait]
    impl DocumentStore for CappedStore {
        async fn insert_many(&self, documents: Vec<Value>) -> Result<usize, SinkError> {
            Ok(documents.len().min(self.capacity))
        }
    }

    fn config() -> StorageConfig {
        StorageConfig {
            enabled: true,
            connection_string: Some(Secret::new("mongodb://localhost:27017")),
            database: Some("iot".to_string()),
            collection: Some("readings".to_string()),
            ..Default::default()
        }
    }

    fn documents(count: usize) -> Vec<Document> {
        (0..count)
            .map(|i| {
                let message = RawMessage::builder()
                    .message_id(format!("m-{}", i))
                    .body("{}")
                    .build();
                Normalizer::default().normalize(&message, "q")
            })
            .collect()
    }

    fn sink(capacity: usize) -> StorageSink {
        StorageSink::new(
            config(),
            LazyClient::ready("storage", Arc::new(CappedStore { capacity }) as Arc<dyn DocumentStore>),
        )
    }

    #[tokio::test]
    async fn test_partial_insert_is_counted() {
        let outcome = sink(2).persist(&documents(3)).await;
        assert_eq!(outcome, SinkOutcome::Partial { delivered: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_empty_batch_is_skipped() {
        assert_eq!(sink(10).persist(&[]).await, SinkOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_missing_collection_disables_sink() {
        let sink = StorageSink::new(
            StorageConfig {
                collection: None,
                ..config()
            },
            LazyClient::ready("storage", Arc::new(CappedStore { capacity: 10 }) as Arc<dyn DocumentStore>),
        );
        assert!(!sink.is_enabled());
        assert_eq!(sink.persist(&documents(1)).await, SinkOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_connection_failure_fails_whole_batch() {
        let sink = StorageSink::new(
            config(),
            LazyClient::new("storage", || async {
                Err(SinkError::Connection("refused".to_string()))
            }),
        );
        assert_eq!(sink.persist(&documents(4)).await, SinkOutcome::Failed { count: 4 });
    }
}
