//! The shared world: block store, player registry, and their broadcast router.
//!
//! [`World`] is the handle every connection handler receives. It owns the two
//! authoritative stores and implements the join and leave sequences that
//! have to touch both of them at once.

mod block_store;
mod player_registry;
mod terrain;

pub use block_store::BlockStore;
pub use player_registry::PlayerRegistry;
pub use terrain::FlatTerrain;

use crate::connection::ConnectionId;
use crate::error::ServerError;
use crate::router::{BroadcastRouter, Channel, Subscriber};
use blockworld_protocol::{Message, PlayerId, Vec3};
use std::sync::Arc;
use tracing::info;

/// Authoritative world state shared by all connections.
#[derive(Debug)]
pub struct World {
    blocks: BlockStore,
    players: PlayerRegistry,
    router: Arc<BroadcastRouter>,
}

impl World {
    /// Builds a world seeded with `terrain` whose players spawn at `spawn`.
    pub fn new(terrain: FlatTerrain, spawn: Vec3) -> Self {
        let router = Arc::new(BroadcastRouter::new());
        let blocks = BlockStore::with_blocks(router.clone(), terrain.generate());
        let players = PlayerRegistry::new(router.clone(), spawn);
        Self { blocks, players, router }
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Admits a new connection into the world.
    ///
    /// Registers a player, subscribes the connection to every channel, queues
    /// its `initialState` and announces `playerJoin` to everybody else. The
    /// block store is read-locked and the registry write-locked for the whole
    /// sequence, so the snapshot and the subscription see the same instant:
    /// no mutation is missing from both or present in both.
    pub async fn join(&self, subscriber: Subscriber) -> Result<PlayerId, ServerError> {
        let blocks = self.blocks.read().await;
        let mut players = self.players.write().await;

        let player_id = self.players.insert(&mut players);
        let initial = Message::InitialState {
            player_id: player_id.clone(),
            blocks: blocks.values().cloned().collect(),
            players: player_registry::collect_others(&players, &player_id),
            position: Some(self.players.spawn_position()),
        };

        let payload = match initial.encode() {
            Ok(text) => Arc::<str>::from(text),
            Err(e) => {
                players.remove(&player_id);
                return Err(e.into());
            }
        };
        if subscriber.send(payload).is_err() {
            players.remove(&player_id);
            return Err(ServerError::Internal(format!(
                "outbound queue of connection {} rejected the initial state",
                subscriber.id()
            )));
        }

        for channel in Channel::ALL {
            self.router.subscribe(channel, subscriber.clone());
        }
        self.router
            .publish_except(Channel::Players, &self.players.join_message(&player_id), subscriber.id());

        info!(
            "👋 Player {} joined on connection {} ({} block(s), {} other player(s))",
            player_id,
            subscriber.id(),
            blocks.len(),
            players.len() - 1
        );
        Ok(player_id)
    }

    /// Removes a connection from the world. Safe to call more than once;
    /// `playerLeave` is published only by the call that removed the player.
    pub async fn leave(&self, connection: ConnectionId, player_id: &PlayerId) -> bool {
        self.router.unsubscribe_all(connection);
        let removed = self.players.disconnect(player_id).await;
        if removed {
            info!("👋 Player {} left (connection {})", player_id, connection);
        }
        removed
    }
}
