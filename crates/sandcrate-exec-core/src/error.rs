//! Error types for the Sandcrate plugin executor.

use thiserror::Error;

/// Main error type for plugin execution operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No open connection to send on
    #[error("Not connected")]
    NotConnected,

    /// Connection refused, dropped, or failed mid-stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound payload is not JSON or carries an absent/unknown type tag
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Caller-supplied parameters are not valid JSON
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Command rejected locally because another one is outstanding
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
