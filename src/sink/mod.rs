//! Downstream sinks fed with canonical documents
//!
//! Three independent, individually optional sinks consume the documents of a
//! drain cycle:
//! - [`StorageSink`]: one unordered bulk insert per cycle
//! - [`ReplicationSink`]: fixed-size batches to a secondary queue, retrying
//!   only the failed subset of a batch
//! - [`AlertNotifier`]: threshold evaluation per document, publishing an alert
//!   when a rule is violated
//!
//! No sink ever returns an error to the caller; failures are logged and
//! reported through [`SinkOutcome`].
//!
//! The backend each sink talks to is a trait ([`DocumentStore`],
//! [`BatchSender`], [`AlertPublisher`]) so the concrete service can be swapped
//! or faked.

pub mod alert;
pub mod lazy;
pub mod replication;
pub mod storage;

pub use alert::{Alert, AlertNotifier, AlertRule, MetricReadings};
pub use lazy::LazyClient;
pub use replication::ReplicationSink;
pub use storage::StorageSink;

use crate::error::SinkError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Bulk document insert into a named collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert documents without ordering guarantees, returning how many were stored
    async fn insert_many(&self, documents: Vec<Value>) -> Result<usize, SinkError>;
}

/// One message of a replication batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Identifier unique within the batch
    pub id: String,
    /// Message body
    pub body: String,
}

/// Batched text message sender
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Send a batch, returning the ids of the entries that were not accepted
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<Vec<String>, SinkError>;
}

/// Topic publisher for alert messages
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    /// Publish one message with a subject
    async fn publish(&self, subject: &str, message: &str) -> Result<(), SinkError>;
}

/// What a sink did with the documents it was handed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkOutcome {
    /// The sink is disabled
    Disabled,
    /// There was nothing to do
    Skipped,
    /// Everything was delivered
    Delivered { count: usize },
    /// Some items were delivered, the rest failed permanently
    Partial { delivered: usize, failed: usize },
    /// Nothing was delivered
    Failed { count: usize },
}

impl SinkOutcome {
    /// Number of items delivered
    pub fn delivered(&self) -> usize {
        match self {
            SinkOutcome::Delivered { count } => *count,
            SinkOutcome::Partial { delivered, .. } => *delivered,
            _ => 0,
        }
    }

    /// Number of items that failed permanently
    pub fn failed(&self) -> usize {
        match self {
            SinkOutcome::Partial { failed, .. } => *failed,
            SinkOutcome::Failed { count } => *count,
            _ => 0,
        }
    }

    /// Merge the outcome of another delivery into this one
    pub fn combine(self, other: SinkOutcome) -> SinkOutcome {
        match (self, other) {
            (SinkOutcome::Disabled, o) | (o, SinkOutcome::Disabled) => o,
            (SinkOutcome::Skipped, o) | (o, SinkOutcome::Skipped) => o,
            (a, b) => SinkOutcome::from_counts(
                a.delivered() + b.delivered(),
                a.failed() + b.failed(),
            ),
        }
    }

    /// Outcome for a delivery of `delivered + failed` items
    pub fn from_counts(delivered: usize, failed: usize) -> SinkOutcome {
        match (delivered, failed) {
            (0, 0) => SinkOutcome::Skipped,
            (count, 0) => SinkOutcome::Delivered { count },
            (0, count) => SinkOutcome::Failed { count },
            (delivered, failed) => SinkOutcome::Partial { delivered, failed },
        }
    }
}
