/// Error types for the queue relay
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Configuration errors raised while resolving settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or empty
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// A variable is present but cannot be interpreted
    #[error("Invalid value for {key}: {value}")]
    Invalid {
        /// Variable name
        key: String,
        /// Offending value
        value: String,
    },
}

/// Errors raised by the source queue collaborator
#[derive(Error, Debug)]
pub enum SourceError {
    /// The queue client could not be created
    #[error("Source connection error: {0}")]
    Connection(String),

    /// The receive call failed as a whole
    #[error("Source receive error: {0}")]
    Receive(String),

    /// A message could not be marked complete
    #[error("Source acknowledge error: {0}")]
    Acknowledge(String),
}

/// Errors raised by sink collaborators
#[derive(Error, Debug)]
pub enum SinkError {
    /// Client construction failed
    #[error("Sink connection error: {0}")]
    Connection(String),

    /// The remote call failed
    #[error("Sink transport error: {0}")]
    Transport(String),

    /// The sink is not configured for use
    #[error("Sink configuration error: {0}")]
    Config(String),

    /// A document could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SinkError {
    /// Check if a call that failed with this error may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Connection(_) | SinkError::Transport(_) => true,
            SinkError::Config(_) | SinkError::Serialization(_) => false,
        }
    }
}

/// Umbrella error for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration is invalid or incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Source queue failure
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Sink failure
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
