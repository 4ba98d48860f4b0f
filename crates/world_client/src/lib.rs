//! # World Client
//!
//! Client side of the shared block world: a WebSocket transport, a local
//! replica of blocks and players rebuilt from server messages, a fixed-step
//! movement solver with step-up and sliding, raycast block selection, a
//! mining state machine and a rate-limited position reporter.
//!
//! The client never mutates its replica optimistically. Placing or mining a
//! block sends an intent; the replica changes when the server broadcasts the
//! result back, which keeps every client converging on the server's order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use world_client::{ClientSession, MovementInput};
//! use blockworld_protocol::Vec3;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), world_client::ClientError> {
//!     let mut session = ClientSession::connect("ws://127.0.0.1:9001").await?;
//!     let input = MovementInput { forward: true, ..Default::default() };
//!     for _ in 0..60 {
//!         session.tick(&input, Vec3::NEG_Z, Duration::from_millis(16))?;
//!         tokio::time::sleep(Duration::from_millis(16)).await;
//!     }
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod aabb;
pub mod error;
pub mod mining;
pub mod movement;
pub mod network;
pub mod replica;
pub mod reporter;
pub mod selection;
pub mod session;

pub use aabb::Aabb;
pub use error::ClientError;
pub use mining::{Miner, MiningState};
pub use movement::{MovementInput, MovementOutcome, PlayerBody, Resolution, SolidQuery};
pub use network::NetworkClient;
pub use replica::{ClientReplica, ReplicaChange};
pub use reporter::PositionReporter;
pub use selection::{RaycastHit, MAX_REACH};
pub use session::{ClientSession, TickReport};
