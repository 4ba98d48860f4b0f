//! Authoritative registry of connected players.

use crate::router::{BroadcastRouter, Channel};
use blockworld_protocol::{Message, PlayerId, PlayerState, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::debug;

pub(crate) type PlayerMap = HashMap<PlayerId, Vec3>;

/// Server-owned mapping from player id to last reported position.
///
/// An entry exists exactly while the player's connection is open. Every
/// successful mutation is announced on the `players` channel under the
/// registry lock.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: RwLock<PlayerMap>,
    spawn: Vec3,
    router: Arc<BroadcastRouter>,
}

impl PlayerRegistry {
    pub fn new(router: Arc<BroadcastRouter>, spawn: Vec3) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            spawn,
            router,
        }
    }

    pub fn spawn_position(&self) -> Vec3 {
        self.spawn
    }

    /// Registers a new player at the spawn position and publishes
    /// `playerJoin` to every current subscriber.
    pub async fn connect(&self) -> PlayerId {
        let mut players = self.players.write().await;
        let player_id = self.insert(&mut players);
        self.router.publish(Channel::Players, &self.join_message(&player_id));
        player_id
    }

    /// Removes the player and publishes `playerLeave`. Returns `false` when
    /// the player was not registered, in which case nothing is published.
    pub async fn disconnect(&self, player_id: &PlayerId) -> bool {
        let mut players = self.players.write().await;
        if players.remove(player_id).is_none() {
            return false;
        }
        debug!("Player {} removed from registry", player_id);
        self.router.publish(
            Channel::Players,
            &Message::PlayerLeave {
                player_id: player_id.clone(),
            },
        );
        true
    }

    /// Records a new position for a registered player and publishes
    /// `playerMove`. Unknown players are ignored.
    pub async fn set_position(&self, player_id: &PlayerId, position: Vec3) -> bool {
        let mut players = self.players.write().await;
        let Some(current) = players.get_mut(player_id) else {
            debug!("Move for unknown player {} ignored", player_id);
            return false;
        };
        *current = position;
        self.router.publish(
            Channel::Players,
            &Message::PlayerMove {
                player_id: player_id.clone(),
                position,
            },
        );
        true
    }

    pub async fn position(&self, player_id: &PlayerId) -> Option<Vec3> {
        self.players.read().await.get(player_id).copied()
    }

    pub async fn contains(&self, player_id: &PlayerId) -> bool {
        self.players.read().await.contains_key(player_id)
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every registered player except `exclude`.
    pub async fn others(&self, exclude: &PlayerId) -> Vec<PlayerState> {
        collect_others(&*self.players.read().await, exclude)
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, PlayerMap> {
        self.players.write().await
    }

    /// Allocates a fresh id at the spawn position inside an already held lock.
    pub(crate) fn insert(&self, players: &mut PlayerMap) -> PlayerId {
        let mut player_id = PlayerId::generate();
        while players.contains_key(&player_id) {
            player_id = PlayerId::generate();
        }
        players.insert(player_id.clone(), self.spawn);
        player_id
    }

    pub(crate) fn join_message(&self, player_id: &PlayerId) -> Message {
        Message::PlayerJoin {
            player_id: player_id.clone(),
            position: self.spawn,
        }
    }
}

pub(crate) fn collect_others(players: &PlayerMap, exclude: &PlayerId) -> Vec<PlayerState> {
    players
        .iter()
        .filter(|(id, _)| *id != exclude)
        .map(|(id, position)| PlayerState {
            player_id: id.clone(),
            position: *position,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Subscriber;
    use tokio::sync::{mpsc, Notify};

    fn watched_registry() -> (PlayerRegistry, mpsc::Receiver<Arc<str>>) {
        let router = Arc::new(BroadcastRouter::new());
        let (tx, rx) = mpsc::channel(16);
        router.subscribe(Channel::Players, Subscriber::new(1, tx, Arc::new(Notify::new())));
        (PlayerRegistry::new(router, Vec3::new(0.0, 1.0, 0.0)), rx)
    }

    fn received(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(text) = rx.try_recv() {
            messages.push(Message::decode(&text).unwrap());
        }
        messages
    }

    #[tokio::test]
    async fn connect_adds_exactly_one_entry_at_spawn() {
        let (registry, mut rx) = watched_registry();
        let id = registry.connect().await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.position(&id).await, Some(Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(
            received(&mut rx),
            vec![Message::PlayerJoin { player_id: id, position: Vec3::new(0.0, 1.0, 0.0) }]
        );
    }

    #[tokio::test]
    async fn disconnect_publishes_leave_exactly_once() {
        let (registry, mut rx) = watched_registry();
        let id = registry.connect().await;
        received(&mut rx);

        assert!(registry.disconnect(&id).await);
        assert!(!registry.disconnect(&id).await);

        assert!(!registry.contains(&id).await);
        assert_eq!(received(&mut rx), vec![Message::PlayerLeave { player_id: id }]);
    }

    #[tokio::test]
    async fn set_position_for_unknown_player_is_a_no_op() {
        let (registry, mut rx) = watched_registry();
        assert!(!registry.set_position(&PlayerId::from("ghost"), Vec3::ONE).await);
        assert!(registry.is_empty().await);
        assert!(received(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn set_position_updates_and_publishes() {
        let (registry, mut rx) = watched_registry();
        let id = registry.connect().await;
        received(&mut rx);

        let target = Vec3::new(1.0, 0.0, 1.0);
        assert!(registry.set_position(&id, target).await);
        assert_eq!(registry.position(&id).await, Some(target));
        assert_eq!(
            received(&mut rx),
            vec![Message::PlayerMove { player_id: id, position: target }]
        );
    }

    #[tokio::test]
    async fn others_excludes_the_caller() {
        let (registry, _rx) = watched_registry();
        let a = registry.connect().await;
        let b = registry.connect().await;

        let others = registry.others(&a).await;
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].player_id, b);
    }
}
