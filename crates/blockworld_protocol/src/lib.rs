//! # Blockworld Protocol
//!
//! Shared wire protocol for the blockworld server and its clients. Every
//! message is a JSON text frame tagged by a `type` field; the set of kinds is
//! closed and modelled by [`Message`], so adding a kind forces every consumer
//! to handle it at compile time.
//!
//! Frames carrying an unknown `type` decode to [`ProtocolError::UnknownType`];
//! consumers log and drop them without closing the connection.

pub mod message;
pub mod types;

pub use glam::{IVec3, Vec3};
pub use message::{BlockUpdate, Message};
pub use types::{Block, BlockKey, BlockRef, BlockType, PlayerId, PlayerState};

/// Errors that can occur while decoding or encoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The frame has no string `type` field
    #[error("Message has no type field")]
    MissingType,
    /// The `type` field names no known message kind
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    /// A known message kind whose fields failed to decode
    #[error("Invalid {kind} message: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    /// A block `type` integer outside the known materials
    #[error("Unknown block type: {0}")]
    UnknownBlockType(u8),
    /// Serialization failed when encoding a message
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}
