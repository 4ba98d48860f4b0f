//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the world server.

use crate::world::FlatTerrain;
use glam::Vec3;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration structure for the world server.
///
/// Contains the network settings, per-connection limits, and the parameters
/// of the world that is generated at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Seconds a client is given to complete the WebSocket handshake
    pub connection_timeout: u64,

    /// Capacity of each connection's outbound queue. A subscriber whose
    /// queue is full is considered stalled and is disconnected.
    pub outbound_queue_capacity: usize,

    /// Position assigned to every newly connected player
    pub spawn_position: Vec3,

    /// Terrain generated into the block store at startup
    pub terrain: FlatTerrain,
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 9001)),
            max_connections: 1000,
            connection_timeout: 60,
            outbound_queue_capacity: 1024,
            spawn_position: Vec3::new(0.0, 1.0, 0.0),
            terrain: FlatTerrain::default(),
        }
    }
}
