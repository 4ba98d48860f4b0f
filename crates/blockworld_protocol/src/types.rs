//! # Core Type Definitions
//!
//! The fundamental types shared by the server and clients: player identity,
//! block records, and the canonical block key.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Server-assigned identifier of a connected player
//! - [`BlockKey`] - Canonical `"x-y-z"` identity of an occupied grid cell
//! - [`BlockType`] - Material of a block, carried on the wire as an integer
//! - [`Block`] - A single placed block
//! - [`PlayerState`] - A player id paired with its last known position

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

/// Unique identifier for a connected player.
///
/// Assigned by the server when a connection opens and used as the key of the
/// player registry and of every replica's other-players map. Clients treat it
/// as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Generates a fresh identifier from a random UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical identity of an occupied grid cell.
///
/// The key is the string form of the block's integer coordinates joined by
/// dashes, e.g. `"3-0-12"`. At most one live block exists per key in any
/// store or replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(pub String);

impl BlockKey {
    /// Builds the canonical key for a grid position.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blockworld_protocol::{BlockKey, IVec3};
    ///
    /// assert_eq!(BlockKey::from_position(IVec3::new(1, 0, -2)).as_str(), "1-0--2");
    /// ```
    pub fn from_position(position: IVec3) -> Self {
        Self(format!("{}-{}-{}", position.x, position.y, position.z))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Material of a block.
///
/// Serialized as its integer discriminant. Decoding an integer outside the
/// known range fails with [`ProtocolError::UnknownBlockType`], which drops the
/// enclosing message instead of aborting the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BlockType {
    #[default]
    Dirt = 0,
    Grass = 1,
    Wood = 2,
    Stone = 3,
    Sand = 4,
}

impl BlockType {
    pub const ALL: [BlockType; 5] = [
        BlockType::Dirt,
        BlockType::Grass,
        BlockType::Wood,
        BlockType::Stone,
        BlockType::Sand,
    ];

    /// The next type in placement order, wrapping around after `Sand`.
    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }
}

impl TryFrom<u8> for BlockType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ProtocolError::UnknownBlockType(value))
    }
}

impl From<BlockType> for u8 {
    fn from(value: BlockType) -> Self {
        value as u8
    }
}

/// A single placed block.
///
/// `key` is the occupancy identity; `uuid` only distinguishes block instances
/// for client-side selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub key: BlockKey,
    pub position: IVec3,
    pub uuid: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
}

impl Block {
    /// Creates a block at `position` with its canonical key and a fresh uuid.
    pub fn new(position: IVec3, block_type: BlockType) -> Self {
        Self {
            key: BlockKey::from_position(position),
            position,
            uuid: Uuid::new_v4().simple().to_string(),
            block_type,
        }
    }
}

/// Reference to a block by key only.
///
/// Removal intents and broadcasts carry just the key; any additional block
/// fields present on the wire are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub key: BlockKey,
}

/// A player id paired with its last known position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    pub position: Vec3,
}
