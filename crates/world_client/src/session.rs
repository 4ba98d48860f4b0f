//! One player's view of a running world.
//!
//! A session ties the transport, the replica, the movement solver, the
//! position reporter and the miner together behind a per-frame [`tick`].
//!
//! [`tick`]: ClientSession::tick

use crate::error::ClientError;
use crate::mining::Miner;
use crate::movement::{self, MovementInput, MovementOutcome, PlayerBody};
use crate::network::{NetworkClient, DEFAULT_QUEUE_CAPACITY};
use crate::replica::{ClientReplica, ReplicaChange};
use crate::reporter::PositionReporter;
use crate::selection::MAX_REACH;
use blockworld_protocol::{Block, BlockType, BlockUpdate, Message, PlayerId, Vec3};
use std::time::Duration;
use tracing::{debug, info};

/// How long `connect` waits for the server's `initialState`.
pub const INITIAL_STATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Start position when the server does not say where the player is.
pub const DEFAULT_SPAWN: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// What one frame did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub changes: Vec<ReplicaChange>,
    pub movement: MovementOutcome,
    pub position_sent: bool,
    pub mined: Option<BlockUpdate>,
}

pub struct ClientSession {
    network: NetworkClient,
    replica: ClientReplica,
    body: PlayerBody,
    reporter: PositionReporter,
    miner: Miner,
    player_id: PlayerId,
}

impl ClientSession {
    /// Connects to `url` and waits for the initial snapshot. The body starts
    /// where the server placed the player.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        Self::open(url, None).await
    }

    /// Like [`connect`](Self::connect), but the body starts at `spawn`. The
    /// first tick reports it, so the server learns the position right away.
    pub async fn connect_at(url: &str, spawn: Vec3) -> Result<Self, ClientError> {
        Self::open(url, Some(spawn)).await
    }

    async fn open(url: &str, spawn: Option<Vec3>) -> Result<Self, ClientError> {
        let mut network = NetworkClient::connect(url, DEFAULT_QUEUE_CAPACITY).await?;

        let first = tokio::time::timeout(INITIAL_STATE_TIMEOUT, network.recv())
            .await
            .map_err(|_| ClientError::Timeout)?
            .ok_or(ClientError::Closed)?;

        let Message::InitialState { position: assigned, .. } = &first else {
            return Err(ClientError::UnexpectedMessage(first.kind()));
        };
        let spawn = spawn.or(*assigned).unwrap_or(DEFAULT_SPAWN);

        let mut replica = ClientReplica::new();
        replica.apply(first);
        let player_id = replica.local_id().cloned().ok_or(ClientError::UnexpectedMessage("initialState"))?;
        info!(
            "🌍 Joined as {} with {} block(s) and {} other player(s)",
            player_id,
            replica.block_count(),
            replica.other_players().len()
        );

        Ok(Self {
            network,
            replica,
            body: PlayerBody::at(spawn),
            reporter: PositionReporter::default(),
            miner: Miner::new(),
            player_id,
        })
    }

    /// Runs one frame: applies received messages, moves the body, reports the
    /// position when due and advances mining.
    pub fn tick(
        &mut self,
        input: &MovementInput,
        camera_direction: Vec3,
        dt: Duration,
    ) -> Result<TickReport, ClientError> {
        let changes = self.network.drain_inbound(&mut self.replica);
        for change in &changes {
            if let ReplicaChange::BlockRemoved(key) = change {
                self.miner.block_removed(key);
            }
        }

        let movement = movement::step(&self.replica, self.body, input, camera_direction, dt.as_secs_f32());
        self.body = movement.body;

        let position_sent = self.reporter.observe(self.body.position, dt);
        if position_sent {
            self.network.send(Message::PlayerMove {
                player_id: self.player_id.clone(),
                position: self.body.position,
            })?;
        }

        let mined = self.miner.tick(dt);
        if let Some(update) = &mined {
            debug!("Mining finished on {}", update.key());
            self.network.send(Message::BlockUpdate { block_update: update.clone() })?;
        }

        Ok(TickReport {
            changes,
            movement,
            position_sent,
            mined,
        })
    }

    /// Starts mining the block under the ray, if any is in reach.
    pub fn start_mining(&mut self, origin: Vec3, direction: Vec3) -> bool {
        match self.replica.raycast(origin, direction, MAX_REACH) {
            Some(hit) => {
                self.miner.press(hit.key);
                true
            }
            None => {
                self.miner.release();
                false
            }
        }
    }

    pub fn stop_mining(&mut self) {
        self.miner.release();
    }

    /// Sends an add intent for `block_type` against the face under the ray.
    ///
    /// Returns the requested block, or `None` when nothing is in reach, the
    /// target cell is taken, or the block would overlap the local body. The
    /// replica only changes when the server's broadcast comes back.
    pub fn place_block(
        &mut self,
        origin: Vec3,
        direction: Vec3,
        block_type: BlockType,
    ) -> Result<Option<Block>, ClientError> {
        let Some(hit) = self.replica.raycast(origin, direction, MAX_REACH) else {
            return Ok(None);
        };
        let Some(block) = self.replica.placement_for(&hit, block_type) else {
            return Ok(None);
        };
        if crate::aabb::Aabb::cell(block.position).intersects(&self.body.aabb()) {
            debug!("Refusing to place {} inside the player", block.key);
            return Ok(None);
        }

        self.network.send(Message::BlockUpdate {
            block_update: BlockUpdate::Add(block.clone()),
        })?;
        Ok(Some(block))
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn replica(&self) -> &ClientReplica {
        &self.replica
    }

    pub fn body(&self) -> PlayerBody {
        self.body
    }

    pub fn position(&self) -> Vec3 {
        self.body.position
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn is_closed(&self) -> bool {
        self.network.is_closed()
    }

    pub async fn close(self) {
        self.network.close().await;
    }
}
