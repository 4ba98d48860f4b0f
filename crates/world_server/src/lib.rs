//! # World Server - Authoritative Voxel World
//!
//! The server side of the blockworld synchronization layer. It owns the only
//! authoritative copy of the world, accepts WebSocket connections and fans
//! every mutation out to the connected clients.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Block Store** - Keyed map of blocks; adds are idempotent by key
//! * **Player Registry** - Positions of connected players, one entry per open connection
//! * **Broadcast Router** - `blocks` and `players` channels with bounded per-subscriber queues
//! * **Connection Handler** - Per-socket state machine bridging the transport to the world
//!
//! ### Message Flow
//!
//! 1. A client sends a `blockUpdate` or `playerMove` text frame
//! 2. The connection handler decodes it into a [`blockworld_protocol::Message`]
//! 3. The matching store applies the mutation under its lock
//! 4. The store publishes the result on its channel before releasing the lock
//! 5. Every subscriber's writer task forwards the frame to its socket
//!
//! ## Error Handling
//!
//! Protocol errors are logged and the frame dropped; state errors such as
//! duplicate adds are silent no-ops. A stalled subscriber is evicted instead of
//! back-pressuring the publisher. Nothing a client sends is fatal to the
//! process. [`ServerError`] only covers transport and startup failures.
//!
//! ## Thread Safety
//!
//! * Each store is guarded by its own `tokio::sync::RwLock`
//! * Channel membership lives in a `DashMap`
//! * Joining takes the block store's read lock and the registry's write lock,
//!   always in that order, so the initial snapshot and the subscription agree

pub use config::ServerConfig;
pub use connection::{ConnectionId, ConnectionState};
pub use error::ServerError;
pub use router::{BroadcastRouter, Channel, Subscriber};
pub use server::WorldServer;
pub use world::{BlockStore, FlatTerrain, PlayerRegistry, World};

pub mod config;
pub mod connection;
pub mod error;
pub mod router;
pub mod server;
pub mod world;

/// Creates a server with default configuration.
pub fn create_server() -> WorldServer {
    WorldServer::new(ServerConfig::default())
}

/// Creates a server with the given configuration.
pub fn create_server_with_config(config: ServerConfig) -> WorldServer {
    WorldServer::new(config)
}
