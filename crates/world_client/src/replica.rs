//! Client-local mirror of the world.
//!
//! The replica is mutated only by inbound protocol messages. It applies the
//! same idempotency rules as the server stores: a duplicate add is ignored by
//! key, removing an absent key is a no-op, and moves or joins for an unknown
//! player insert it. Messages about the local player are ignored, since the
//! local position belongs to the movement solver.

use crate::movement::SolidQuery;
use blockworld_protocol::{Block, BlockKey, BlockUpdate, IVec3, Message, PlayerId, PlayerState, Vec3};
use std::collections::HashMap;
use tracing::{debug, trace};

/// What applying one message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicaChange {
    /// Nothing changed: a duplicate, an absent key, or a message about ourselves.
    Unchanged,
    /// An `initialState` replaced the whole replica.
    Reset,
    BlockAdded(BlockKey),
    BlockRemoved(BlockKey),
    PlayerMoved(PlayerId),
    PlayerLeft(PlayerId),
}

#[derive(Debug, Default, Clone)]
pub struct ClientReplica {
    local_id: Option<PlayerId>,
    blocks: HashMap<BlockKey, Block>,
    occupancy: HashMap<IVec3, BlockKey>,
    others: HashMap<PlayerId, Vec3>,
}

impl ClientReplica {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id assigned by the server, known once `initialState` was applied.
    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    pub fn apply(&mut self, message: Message) -> ReplicaChange {
        match message {
            Message::InitialState { player_id, blocks, players, .. } => {
                self.reset(player_id, blocks, players);
                ReplicaChange::Reset
            }
            Message::BlockUpdate { block_update } => match block_update {
                BlockUpdate::Add(block) => self.add_block(block),
                BlockUpdate::Remove(block) => self.remove_block(&block.key),
            },
            Message::PlayerMove { player_id, position } | Message::PlayerJoin { player_id, position } => {
                self.upsert_player(player_id, position)
            }
            Message::PlayerLeave { player_id } => {
                if self.others.remove(&player_id).is_some() {
                    ReplicaChange::PlayerLeft(player_id)
                } else {
                    ReplicaChange::Unchanged
                }
            }
        }
    }

    fn reset(&mut self, player_id: PlayerId, blocks: Vec<Block>, players: Vec<PlayerState>) {
        debug!(
            "Replica reset for player {}: {} block(s), {} other player(s)",
            player_id,
            blocks.len(),
            players.len()
        );
        self.blocks.clear();
        self.occupancy.clear();
        self.others.clear();
        for block in blocks {
            self.add_block(block);
        }
        for player in players.into_iter().filter(|p| p.player_id != player_id) {
            self.others.insert(player.player_id, player.position);
        }
        self.local_id = Some(player_id);
    }

    fn add_block(&mut self, block: Block) -> ReplicaChange {
        if self.blocks.contains_key(&block.key) || self.occupancy.contains_key(&block.position) {
            trace!("Duplicate block {} ignored", block.key);
            return ReplicaChange::Unchanged;
        }
        let key = block.key.clone();
        self.occupancy.insert(block.position, key.clone());
        self.blocks.insert(key.clone(), block);
        ReplicaChange::BlockAdded(key)
    }

    fn remove_block(&mut self, key: &BlockKey) -> ReplicaChange {
        match self.blocks.remove(key) {
            Some(block) => {
                self.occupancy.remove(&block.position);
                ReplicaChange::BlockRemoved(block.key)
            }
            None => ReplicaChange::Unchanged,
        }
    }

    fn upsert_player(&mut self, player_id: PlayerId, position: Vec3) -> ReplicaChange {
        if self.local_id.as_ref() == Some(&player_id) {
            return ReplicaChange::Unchanged;
        }
        self.others.insert(player_id.clone(), position);
        ReplicaChange::PlayerMoved(player_id)
    }

    pub fn block(&self, key: &BlockKey) -> Option<&Block> {
        self.blocks.get(key)
    }

    pub fn block_at(&self, cell: IVec3) -> Option<&Block> {
        self.occupancy.get(&cell).and_then(|key| self.blocks.get(key))
    }

    pub fn contains_key(&self, key: &BlockKey) -> bool {
        self.blocks.contains_key(key)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Last known positions of every other connected player.
    pub fn other_players(&self) -> &HashMap<PlayerId, Vec3> {
        &self.others
    }

    pub fn player_position(&self, player_id: &PlayerId) -> Option<Vec3> {
        self.others.get(player_id).copied()
    }
}

impl SolidQuery for ClientReplica {
    fn is_solid(&self, cell: IVec3) -> bool {
        self.occupancy.contains_key(&cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockworld_protocol::BlockType;

    fn initial(id: &str, blocks: Vec<Block>, players: Vec<PlayerState>) -> Message {
        Message::InitialState { player_id: PlayerId::from(id), blocks, players, position: None }
    }

    fn add(block: &Block) -> Message {
        Message::BlockUpdate { block_update: BlockUpdate::Add(block.clone()) }
    }

    #[test]
    fn initial_state_replaces_everything() {
        let mut replica = ClientReplica::new();
        replica.apply(add(&Block::new(IVec3::new(5, 5, 5), BlockType::Sand)));
        replica.apply(Message::PlayerJoin { player_id: "old".into(), position: Vec3::ZERO });

        let block = Block::new(IVec3::ZERO, BlockType::Grass);
        let others = vec![
            PlayerState { player_id: "p2".into(), position: Vec3::ONE },
            PlayerState { player_id: "me".into(), position: Vec3::ZERO },
        ];
        assert_eq!(replica.apply(initial("me", vec![block.clone()], others)), ReplicaChange::Reset);

        assert_eq!(replica.local_id(), Some(&PlayerId::from("me")));
        assert_eq!(replica.block_count(), 1);
        assert_eq!(replica.block_at(IVec3::ZERO), Some(&block));
        assert_eq!(replica.other_players().len(), 1);
        assert_eq!(replica.player_position(&"p2".into()), Some(Vec3::ONE));
    }

    #[test]
    fn duplicate_add_is_ignored_by_key() {
        let mut replica = ClientReplica::new();
        let first = Block::new(IVec3::ZERO, BlockType::Grass);
        let second = Block::new(IVec3::ZERO, BlockType::Stone);

        assert_eq!(replica.apply(add(&first)), ReplicaChange::BlockAdded(first.key.clone()));
        assert_eq!(replica.apply(add(&second)), ReplicaChange::Unchanged);
        assert_eq!(replica.block(&first.key).unwrap().uuid, first.uuid);
    }

    #[test]
    fn remove_of_absent_key_is_ignored() {
        let mut replica = ClientReplica::new();
        let remove = Message::BlockUpdate { block_update: BlockUpdate::remove("1-1-1".into()) };
        assert_eq!(replica.apply(remove), ReplicaChange::Unchanged);
    }

    #[test]
    fn remove_clears_occupancy() {
        let mut replica = ClientReplica::new();
        let block = Block::new(IVec3::new(1, 2, 3), BlockType::Wood);
        replica.apply(add(&block));
        assert!(replica.is_solid(IVec3::new(1, 2, 3)));

        let remove = Message::BlockUpdate { block_update: BlockUpdate::remove(block.key.clone()) };
        assert_eq!(replica.apply(remove), ReplicaChange::BlockRemoved(block.key));
        assert!(!replica.is_solid(IVec3::new(1, 2, 3)));
    }

    #[test]
    fn move_only_touches_the_named_player() {
        let mut replica = ClientReplica::new();
        replica.apply(initial(
            "me",
            vec![],
            vec![
                PlayerState { player_id: "p1".into(), position: Vec3::ZERO },
                PlayerState { player_id: "p2".into(), position: Vec3::ZERO },
            ],
        ));

        replica.apply(Message::PlayerMove { player_id: "p1".into(), position: Vec3::new(1.0, 0.0, 1.0) });
        assert_eq!(replica.player_position(&"p1".into()), Some(Vec3::new(1.0, 0.0, 1.0)));
        assert_eq!(replica.player_position(&"p2".into()), Some(Vec3::ZERO));
    }

    #[test]
    fn unknown_player_is_inserted_and_unknown_leave_ignored() {
        let mut replica = ClientReplica::new();
        replica.apply(initial("me", vec![], vec![]));

        replica.apply(Message::PlayerMove { player_id: "new".into(), position: Vec3::ONE });
        assert!(replica.other_players().contains_key(&PlayerId::from("new")));

        assert_eq!(replica.apply(Message::PlayerLeave { player_id: "ghost".into() }), ReplicaChange::Unchanged);
        assert_eq!(
            replica.apply(Message::PlayerLeave { player_id: "new".into() }),
            ReplicaChange::PlayerLeft("new".into())
        );
    }

    #[test]
    fn messages_about_ourselves_are_ignored() {
        let mut replica = ClientReplica::new();
        replica.apply(initial("me", vec![], vec![]));

        assert_eq!(
            replica.apply(Message::PlayerMove { player_id: "me".into(), position: Vec3::ONE }),
            ReplicaChange::Unchanged
        );
        assert_eq!(
            replica.apply(Message::PlayerJoin { player_id: "me".into(), position: Vec3::ONE }),
            ReplicaChange::Unchanged
        );
        assert!(replica.other_players().is_empty());
    }
}
