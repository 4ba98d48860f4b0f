//! Initial terrain generation.

use blockworld_protocol::{Block, BlockType, IVec3};
use serde::{Deserialize, Serialize};

/// A flat, layered slab of blocks anchored at the origin.
///
/// Columns cover `x, z in 0..size` and `y in 0..depth`. The top layer is
/// grass, the two layers beneath it are dirt and anything deeper is stone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatTerrain {
    pub size: u32,
    pub depth: u32,
}

impl Default for FlatTerrain {
    fn default() -> Self {
        Self { size: 100, depth: 1 }
    }
}

impl FlatTerrain {
    /// An empty world.
    pub const EMPTY: FlatTerrain = FlatTerrain { size: 0, depth: 0 };

    pub fn block_count(&self) -> usize {
        self.size as usize * self.size as usize * self.depth as usize
    }

    /// Material of the layer at height `y`.
    pub fn layer(&self, y: u32) -> BlockType {
        let top = self.depth.saturating_sub(1);
        if y == top {
            BlockType::Grass
        } else if y + 3 > top {
            BlockType::Dirt
        } else {
            BlockType::Stone
        }
    }

    pub fn generate(&self) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(self.block_count());
        for x in 0..self.size {
            for z in 0..self.size {
                for y in 0..self.depth {
                    let position = IVec3::new(x as i32, y as i32, z as i32);
                    blocks.push(Block::new(position, self.layer(y)));
                }
            }
        }
        blocks
    }
}
