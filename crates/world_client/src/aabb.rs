//! Axis-aligned bounding boxes for the player and unit blocks.

use glam::{IVec3, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half_size = size * 0.5;
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// The unit cube of a grid cell. Cells are centered on their integer
    /// coordinates, so cell `c` spans `c - 0.5 ..= c + 0.5`.
    pub fn cell(cell: IVec3) -> Self {
        Self::from_center_size(cell.as_vec3(), Vec3::ONE)
    }

    /// Strict overlap test: boxes that only touch do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    pub fn offset(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Shrinks the box by `amount` on every side.
    pub fn shrink(&self, amount: f32) -> Self {
        Self {
            min: self.min + Vec3::splat(amount),
            max: self.max - Vec3::splat(amount),
        }
    }

    /// Every grid cell whose unit cube could overlap this box.
    pub fn cells(&self) -> impl Iterator<Item = IVec3> {
        let lo = (self.min - Vec3::splat(0.5)).floor().as_ivec3();
        let hi = (self.max + Vec3::splat(0.5)).ceil().as_ivec3();
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| IVec3::new(x, y, z)))
        })
    }
}
