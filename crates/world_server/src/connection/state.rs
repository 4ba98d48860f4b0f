//! Per-connection lifecycle state machine.

use blockworld_protocol::PlayerId;

/// Lifecycle of a single connection: `Connecting → Open → Closed`.
///
/// `Closed` is terminal. The transition out of `Open` hands back the player
/// id exactly once, which is what guarantees a single registry cleanup no
/// matter how many exit paths race to close the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open { player_id: PlayerId },
    Closed,
}

impl ConnectionState {
    /// Moves `Connecting → Open`. Returns `false` from any other state.
    pub fn open(&mut self, player_id: PlayerId) -> bool {
        match self {
            ConnectionState::Connecting => {
                *self = ConnectionState::Open { player_id };
                true
            }
            _ => false,
        }
    }

    /// Moves to `Closed`, returning the player id if the connection was open.
    pub fn close(&mut self) -> Option<PlayerId> {
        match std::mem::replace(self, ConnectionState::Closed) {
            ConnectionState::Open { player_id } => Some(player_id),
            _ => None,
        }
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        match self {
            ConnectionState::Open { player_id } => Some(player_id),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}
