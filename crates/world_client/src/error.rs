//! Error types for the client.

use blockworld_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The WebSocket connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),
    /// The session ended; reconnecting is the only way back
    #[error("Connection closed")]
    Closed,
    /// The server did not open the session with `initialState`
    #[error("Expected initialState, received {0}")]
    UnexpectedMessage(&'static str),
    /// No `initialState` arrived in time
    #[error("Timed out waiting for the initial state")]
    Timeout,
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
