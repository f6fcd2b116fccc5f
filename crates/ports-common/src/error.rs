//! Error types for port ingestion

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, PortsError>;

/// Main error type for port ingestion
#[derive(Error, Debug)]
pub enum PortsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The source document could not be opened; raised before streaming starts.
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document stopped decoding part way through (or never started).
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store error: {0}")]
    Store(String),

    /// The consuming side of the pipeline has gone away.
    #[error("Pipeline is no longer accepting records")]
    PipelineClosed,

    #[error("Buffer capacity must be greater than 0, got {0}")]
    InvalidCapacity(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl PortsError {
    /// Whether this error means the input ended before it was fully ingested.
    pub fn is_truncation(&self) -> bool {
        matches!(self, PortsError::Decode { .. } | PortsError::InvalidRecord(_))
    }
}
