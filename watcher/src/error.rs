//! Error types for the change detector.

use thiserror::Error;

use crate::node::NodeId;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the change detector.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Poll interval is not a positive, finite number of seconds.
    #[error("invalid poll interval: {0}s")]
    InvalidPollInterval(f64),

    /// A node id was resolved against an index that does not hold it.
    #[error("node not found in index: {0}")]
    NodeNotFound(NodeId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
