//! Error types for the world server.

use blockworld_protocol::ProtocolError;

/// Failures surfaced by the world server.
///
/// State errors such as duplicate adds or moves of unknown players are benign
/// no-ops and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket, listener, or WebSocket transport failure
    #[error("Network error: {0}")]
    Network(String),
    /// A frame could not be decoded or encoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Invariant violation inside the server
    #[error("Internal error: {0}")]
    Internal(String),
}
