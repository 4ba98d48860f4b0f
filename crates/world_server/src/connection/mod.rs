//! Connection management for client connections.
//!
//! Each accepted socket is driven by one handler task that walks the
//! [`ConnectionState`] machine: handshake, join the world, route inbound
//! frames, and clean up exactly once on close.

mod handler;
mod state;

pub use handler::{handle_connection, route_message};
pub use state::ConnectionState;

/// Type alias for connection identifiers.
///
/// Connection IDs are allocated by the accept loop and identify a
/// subscriber in the broadcast router for the lifetime of its socket.
pub type ConnectionId = usize;
