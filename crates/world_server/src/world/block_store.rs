//! Authoritative block storage.

use crate::router::{BroadcastRouter, Channel};
use blockworld_protocol::{Block, BlockKey, BlockUpdate, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, warn};

/// Server-owned mapping from block key to block record.
///
/// All mutations go through a single write lock and publish their
/// `blockUpdate` on the `blocks` channel before the lock is released, so the
/// broadcast order always matches the mutation order.
#[derive(Debug)]
pub struct BlockStore {
    blocks: RwLock<HashMap<BlockKey, Block>>,
    router: Arc<BroadcastRouter>,
}

impl BlockStore {
    pub fn new(router: Arc<BroadcastRouter>) -> Self {
        Self::with_blocks(router, Vec::new())
    }

    /// Creates a store seeded with `blocks` without publishing anything.
    /// When two seed blocks share a key the first one wins.
    pub fn with_blocks(router: Arc<BroadcastRouter>, blocks: impl IntoIterator<Item = Block>) -> Self {
        let mut map = HashMap::new();
        for block in blocks {
            map.entry(block.key.clone()).or_insert(block);
        }
        Self {
            blocks: RwLock::new(map),
            router,
        }
    }

    /// Inserts `block` unless its key is already occupied.
    ///
    /// Returns `true` when the block was inserted and broadcast. A duplicate
    /// key, or a key that does not name the block's own position, leaves the
    /// store untouched.
    pub async fn add(&self, block: Block) -> bool {
        if block.key != BlockKey::from_position(block.position) {
            warn!(
                "⚠️ Ignoring block {} whose key does not match its position {:?}",
                block.key, block.position
            );
            return false;
        }

        let mut blocks = self.blocks.write().await;
        if blocks.contains_key(&block.key) {
            debug!("Block {} already present, add ignored", block.key);
            return false;
        }

        blocks.insert(block.key.clone(), block.clone());
        self.router.publish(
            Channel::Blocks,
            &Message::BlockUpdate {
                block_update: BlockUpdate::Add(block),
            },
        );
        true
    }

    /// Deletes the block at `key` if present and broadcasts the removal.
    pub async fn remove(&self, key: &BlockKey) -> bool {
        let mut blocks = self.blocks.write().await;
        if blocks.remove(key).is_none() {
            debug!("Block {} absent, remove ignored", key);
            return false;
        }

        self.router.publish(
            Channel::Blocks,
            &Message::BlockUpdate {
                block_update: BlockUpdate::remove(key.clone()),
            },
        );
        true
    }

    /// Every block currently in the store.
    pub async fn snapshot(&self) -> Vec<Block> {
        self.blocks.read().await.values().cloned().collect()
    }

    pub async fn get(&self, key: &BlockKey) -> Option<Block> {
        self.blocks.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Holds off every mutation for as long as the guard lives.
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, HashMap<BlockKey, Block>> {
        self.blocks.read().await
    }
}
