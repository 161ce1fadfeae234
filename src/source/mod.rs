//! Source queue seam
//!
//! A [`SourceConnector`] opens a fresh [`SourceQueue`] for every drain cycle.
//! The queue hands out [`RawMessage`]s and acknowledges them one at a time;
//! it is closed when the cycle ends, whatever the outcome.

use crate::config::SourceSettings;
use crate::document::RawMessage;
use crate::error::SourceError;
use async_trait::async_trait;
use std::time::Duration;

/// Opens receiving clients for the source queue
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Connect to the queue named in `settings`
    async fn connect(&self, settings: &SourceSettings) -> Result<Box<dyn SourceQueue>, SourceError>;
}

/// Receiving client bound to one queue for one drain cycle
#[async_trait]
pub trait SourceQueue: Send {
    /// Receive up to `max_messages`, waiting at most `max_wait` for the first one
    async fn receive(
        &mut self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<RawMessage>, SourceError>;

    /// Mark a message as processed so the broker does not redeliver it
    async fn complete(&mut self, message: &RawMessage) -> Result<(), SourceError>;

    /// Release the client
    async fn close(self: Box<Self>) -> Result<(), SourceError>;
}
