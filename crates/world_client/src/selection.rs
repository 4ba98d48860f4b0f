//! Block selection by raycast and placement against the selected face.
//!
//! Rays walk the grid with the Amanatides & Woo traversal. Cells are centered
//! on their integer coordinates, so the walk runs in a grid shifted by half a
//! block.

use crate::replica::ClientReplica;
use blockworld_protocol::{Block, BlockKey, BlockType, IVec3, Vec3};

/// Reach of block selection, in blocks.
pub const MAX_REACH: f32 = 5.0;

/// The block a ray hit first.
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    pub key: BlockKey,
    pub uuid: String,
    pub cell: IVec3,
    /// Outward normal of the face the ray entered through. Zero when the ray
    /// started inside the block.
    pub normal: IVec3,
    pub distance: f32,
}

impl ClientReplica {
    /// Nearest block along the ray within `max_distance`.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        let direction = direction.try_normalize()?;
        let shifted = origin + Vec3::splat(0.5);
        let mut cell = shifted.floor().as_ivec3();
        let sub = shifted - shifted.floor();

        let step = IVec3::new(
            if direction.x >= 0.0 { 1 } else { -1 },
            if direction.y >= 0.0 { 1 } else { -1 },
            if direction.z >= 0.0 { 1 } else { -1 },
        );
        let t_delta = Vec3::new(
            safe_inv(direction.x.abs()),
            safe_inv(direction.y.abs()),
            safe_inv(direction.z.abs()),
        );
        let mut t_max = Vec3::new(
            initial_t_max(sub.x, direction.x, t_delta.x),
            initial_t_max(sub.y, direction.y, t_delta.y),
            initial_t_max(sub.z, direction.z, t_delta.z),
        );

        let mut normal = IVec3::ZERO;
        let mut t = 0.0_f32;
        loop {
            if let Some(block) = self.block_at(cell) {
                return Some(RaycastHit {
                    key: block.key.clone(),
                    uuid: block.uuid.clone(),
                    cell,
                    normal,
                    distance: t,
                });
            }

            if t_max.x < t_max.y && t_max.x < t_max.z {
                t = t_max.x;
                t_max.x += t_delta.x;
                cell.x += step.x;
                normal = IVec3::new(-step.x, 0, 0);
            } else if t_max.y < t_max.z {
                t = t_max.y;
                t_max.y += t_delta.y;
                cell.y += step.y;
                normal = IVec3::new(0, -step.y, 0);
            } else {
                t = t_max.z;
                t_max.z += t_delta.z;
                cell.z += step.z;
                normal = IVec3::new(0, 0, -step.z);
            }

            if t > max_distance {
                return None;
            }
        }
    }

    /// The block that placing `block_type` against `hit` would create, or
    /// `None` when the target cell is already occupied.
    pub fn placement_for(&self, hit: &RaycastHit, block_type: BlockType) -> Option<Block> {
        if hit.normal == IVec3::ZERO {
            return None;
        }
        let cell = hit.cell + hit.normal;
        if self.contains_key(&BlockKey::from_position(cell)) || self.block_at(cell).is_some() {
            return None;
        }
        Some(Block::new(cell, block_type))
    }
}

fn safe_inv(x: f32) -> f32 {
    if x.abs() < f32::EPSILON {
        f32::MAX
    } else {
        1.0 / x
    }
}

fn initial_t_max(sub: f32, direction: f32, t_delta: f32) -> f32 {
    if direction > 0.0 {
        (1.0 - sub) * t_delta
    } else if direction < 0.0 {
        sub * t_delta
    } else {
        f32::MAX
    }
}
