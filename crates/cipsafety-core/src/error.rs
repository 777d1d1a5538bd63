//! Error types for the analysis core

use thiserror::Error;

/// Errors that can occur while analyzing safety traffic
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Payload references a connection that was never registered
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// Payload could not be resolved or decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] cipsafety_protocol::ProtocolError),

    /// IO error (persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
