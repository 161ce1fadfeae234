//! MongoDB document storage

use crate::config::StorageConfig;
use crate::error::SinkError;
use crate::sink::DocumentStore;
use async_trait::async_trait;
use mongodb::bson::{self, Document as BsonDocument};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection};
use serde_json::Value;
use tracing::{info, warn};

/// Inserts documents into one MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoDocumentStore {
    collection: Collection<BsonDocument>,
}

impl MongoDocumentStore {
    pub fn new(collection: Collection<BsonDocument>) -> Self {
        Self { collection }
    }

    /// Connect using the storage connection string, database and collection
    pub async fn connect(config: &StorageConfig) -> Result<Self, SinkError> {
        let (Some(uri), Some(database), Some(collection)) = (
            config.connection_string.as_ref(),
            config.database.as_deref(),
            config.collection.as_deref(),
        ) else {
            return Err(SinkError::Config(
                "storage connection string, database and collection are required".to_string(),
            ));
        };

        let client = Client::with_uri_str(uri.expose())
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;
        info!(database, collection, "Connected to MongoDB");
        Ok(Self::new(client.database(database).collection(collection)))
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert_many(&self, documents: Vec<Value>) -> Result<usize, SinkError> {
        let total = documents.len();
        let records = documents
            .iter()
            .map(bson::to_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SinkError::Config(format!("Document is not BSON-compatible: {}", e)))?;

        match self.collection.insert_many(records).ordered(false).await {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(e) => match e.kind.as_ref() {
                ErrorKind::InsertMany(failure) => {
                    let failed = failure
                        .write_errors
                        .as_ref()
                        .map(|errors| errors.len())
                        .unwrap_or(total);
                    warn!(failed, total, "Bulk insert partially failed");
                    Ok(total.saturating_sub(failed))
                }
                _ => Err(SinkError::Transport(e.to_string())),
            },
        }
    }
}
