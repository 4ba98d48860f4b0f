//! Message type definitions for client-server communication.
//!
//! Every frame on the wire is a JSON object whose `type` field selects one of
//! the five [`Message`] kinds. Decoding distinguishes malformed JSON, unknown
//! kinds, and known kinds with invalid payloads so callers can log the exact
//! reason before dropping the frame.
//!
//! # Example Messages
//!
//! ```json
//! { "type": "blockUpdate",
//!   "blockUpdate": { "action": "add",
//!                    "block": { "key": "0-0-0", "position": [0, 0, 0], "uuid": "u1", "type": 1 } } }
//!
//! { "type": "playerMove", "playerId": "p1", "position": [1.0, 0.0, 1.0] }
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{Block, BlockKey, BlockRef, PlayerId, PlayerState};
use crate::ProtocolError;

/// A block mutation, either as a client intent or as a server broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "block", rename_all = "lowercase")]
pub enum BlockUpdate {
    /// Place a block; ignored if its key is already occupied.
    Add(Block),
    /// Remove whatever block occupies the key; ignored if the key is empty.
    Remove(BlockRef),
}

impl BlockUpdate {
    pub fn remove(key: BlockKey) -> Self {
        Self::Remove(BlockRef { key })
    }

    /// The key this update targets.
    pub fn key(&self) -> &BlockKey {
        match self {
            BlockUpdate::Add(block) => &block.key,
            BlockUpdate::Remove(block) => &block.key,
        }
    }
}

/// The closed set of protocol messages.
///
/// | type           | direction                     |
/// |----------------|-------------------------------|
/// | `initialState` | server → one client, on open  |
/// | `blockUpdate`  | both directions               |
/// | `playerMove`   | both directions               |
/// | `playerJoin`   | server → all but the origin   |
/// | `playerLeave`  | server → all but the origin   |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    InitialState {
        player_id: PlayerId,
        blocks: Vec<Block>,
        /// Every other player connected at the moment of the join.
        #[serde(default)]
        players: Vec<PlayerState>,
        /// Where the server placed the joining player.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Vec3>,
    },
    #[serde(rename_all = "camelCase")]
    BlockUpdate { block_update: BlockUpdate },
    #[serde(rename_all = "camelCase")]
    PlayerMove { player_id: PlayerId, position: Vec3 },
    #[serde(rename_all = "camelCase")]
    PlayerJoin { player_id: PlayerId, position: Vec3 },
    #[serde(rename_all = "camelCase")]
    PlayerLeave { player_id: PlayerId },
}

impl Message {
    /// Wire names of every known message kind.
    pub const KINDS: [&'static str; 5] = [
        "initialState",
        "blockUpdate",
        "playerMove",
        "playerJoin",
        "playerLeave",
    ];

    /// The wire name of this message's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::InitialState { .. } => "initialState",
            Message::BlockUpdate { .. } => "blockUpdate",
            Message::PlayerMove { .. } => "playerMove",
            Message::PlayerJoin { .. } => "playerJoin",
            Message::PlayerLeave { .. } => "playerLeave",
        }
    }

    /// Parses a text frame into a message.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::Malformed`] - the frame is not a JSON object
    /// * [`ProtocolError::MissingType`] - there is no string `type` field
    /// * [`ProtocolError::UnknownType`] - `type` names no known message kind
    /// * [`ProtocolError::Invalid`] - a known kind with fields that do not fit
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        if !Self::KINDS.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|source| ProtocolError::Invalid { kind, source })
    }

    /// Serializes this message into a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialization)
    }
}
