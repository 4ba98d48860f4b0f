//! Client-side movement prediction with block collision.
//!
//! The solver advances the local player's body by one tick: it turns held
//! keys and the camera's yaw into a horizontal intent, applies gravity or a
//! jump, and resolves the candidate position against the replica's blocks.
//! Resolution tries, in order, the candidate itself, a step-up onto a low
//! obstacle, a slide along Z, a slide along X, and finally stays put.
//!
//! The player is a 0.75 × 1.8 × 0.75 box whose center is the body position.
//! Blocks are unit cubes centered on their integer cell.
//!
//! Everything here is a pure function of its inputs, so two clients running
//! the same ticks against the same block set land on identical positions.

use crate::aabb::Aabb;
use glam::{IVec3, Vec3};
use std::collections::HashSet;

/// Full extents of the player's collision box.
pub const PLAYER_SIZE: Vec3 = Vec3::new(0.75, 1.8, 0.75);
pub const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.375, 0.9, 0.375);

pub const MOVE_SPEED: f32 = 5.0;
pub const JUMP_VELOCITY: f32 = 5.0;
pub const GRAVITY: f32 = -20.0;
pub const TERMINAL_VELOCITY: f32 = -25.0;
pub const STEP_HEIGHT: f32 = 0.5;
/// Factor applied to horizontal velocity once per call to [`step`],
/// however many substeps the call integrates.
pub const HORIZONTAL_DAMPING: f32 = 0.9;

/// Depth of the box below the feet that counts as standing on something.
pub const GROUND_EPS: f32 = 0.01;

/// Contact tolerance: boxes overlapping by less than this are only touching.
const SKIN: f32 = 1e-4;

/// Longest interval integrated in one go. Longer ticks are split so a fall
/// can never cover more than a step height per substep.
const MAX_SUBSTEP: f32 = 1.0 / 60.0;

/// Residual horizontal speed below which the body is considered at rest.
const REST_SPEED: f32 = 0.01;

/// Occupancy lookup the solver collides against.
pub trait SolidQuery {
    fn is_solid(&self, cell: IVec3) -> bool;
}

impl SolidQuery for HashSet<IVec3> {
    fn is_solid(&self, cell: IVec3) -> bool {
        self.contains(&cell)
    }
}

impl<T: SolidQuery + ?Sized> SolidQuery for &T {
    fn is_solid(&self, cell: IVec3) -> bool {
        (**self).is_solid(cell)
    }
}

/// Keys held during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl MovementInput {
    pub fn is_idle(&self) -> bool {
        *self == MovementInput::default()
    }
}

/// The local player's running physical state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerBody {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl PlayerBody {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.position, PLAYER_SIZE)
    }

    pub fn feet(&self) -> f32 {
        self.position.y - PLAYER_HALF_EXTENTS.y
    }
}

/// Which resolution rule produced the accepted position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The candidate position was clear.
    Free,
    /// Raised by the step height and settled onto the obstacle's top.
    StepUp,
    /// X held at its old value, sliding along Z.
    SlideZ,
    /// Z held at its old value, sliding along X.
    SlideX,
    /// Every alternative collided; the old position was kept.
    Blocked,
}

/// Result of one solver tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementOutcome {
    pub body: PlayerBody,
    pub grounded: bool,
    pub resolution: Resolution,
}

/// Yaw-only forward and left unit vectors for a camera direction.
///
/// A camera looking straight up or down has no usable yaw; forward then falls
/// back to `-Z`.
pub fn basis(camera_direction: Vec3) -> (Vec3, Vec3) {
    let forward = Vec3::new(camera_direction.x, 0.0, camera_direction.z)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Z);
    let left = Vec3::Y.cross(forward);
    (forward, left)
}

/// Normalized horizontal direction requested by `input`, or zero.
pub fn horizontal_intent(input: &MovementInput, camera_direction: Vec3) -> Vec3 {
    let (forward, left) = basis(camera_direction);
    let ahead = input.forward as i8 - input.backward as i8;
    let aside = input.left as i8 - input.right as i8;
    (forward * ahead as f32 + left * aside as f32).normalize_or_zero()
}

/// Whether a player box centered at `position` overlaps any solid cell.
pub fn collides<W: SolidQuery + ?Sized>(world: &W, position: Vec3) -> bool {
    let bounds = Aabb::from_center_size(position, PLAYER_SIZE).shrink(SKIN);
    bounds
        .cells()
        .any(|cell| world.is_solid(cell) && bounds.intersects(&Aabb::cell(cell)))
}

/// Whether the thin slab just under the player's feet overlaps a solid cell.
pub fn is_grounded<W: SolidQuery + ?Sized>(world: &W, position: Vec3) -> bool {
    let feet = position.y - PLAYER_HALF_EXTENTS.y;
    let below_feet = Aabb::new(
        Vec3::new(
            position.x - PLAYER_HALF_EXTENTS.x + SKIN,
            feet - GROUND_EPS,
            position.z - PLAYER_HALF_EXTENTS.z + SKIN,
        ),
        Vec3::new(
            position.x + PLAYER_HALF_EXTENTS.x - SKIN,
            feet - SKIN,
            position.z + PLAYER_HALF_EXTENTS.z - SKIN,
        ),
    );
    below_feet
        .cells()
        .any(|cell| world.is_solid(cell) && below_feet.intersects(&Aabb::cell(cell)))
}

/// Advances `body` by `dt` seconds.
///
/// Ticks longer than 1/60 s are integrated as equal substeps; the reported
/// resolution is the one of the final substep. A non-positive `dt` leaves the
/// body untouched.
pub fn step<W: SolidQuery + ?Sized>(
    world: &W,
    body: PlayerBody,
    input: &MovementInput,
    camera_direction: Vec3,
    dt: f32,
) -> MovementOutcome {
    if dt <= 0.0 || !dt.is_finite() {
        return MovementOutcome {
            body,
            grounded: is_grounded(world, body.position),
            resolution: Resolution::Free,
        };
    }

    let intent = horizontal_intent(input, camera_direction);
    let substeps = (dt / MAX_SUBSTEP).ceil().max(1.0) as u32;
    let sub_dt = dt / substeps as f32;

    let mut outcome = substep(world, body, intent, input.jump, sub_dt);
    for _ in 1..substeps {
        outcome = substep(world, outcome.body, intent, input.jump, sub_dt);
    }

    let velocity = &mut outcome.body.velocity;
    velocity.x *= HORIZONTAL_DAMPING;
    velocity.z *= HORIZONTAL_DAMPING;
    if Vec3::new(velocity.x, 0.0, velocity.z).length() < REST_SPEED {
        velocity.x = 0.0;
        velocity.z = 0.0;
    }
    outcome
}

fn substep<W: SolidQuery + ?Sized>(
    world: &W,
    body: PlayerBody,
    intent: Vec3,
    jump: bool,
    dt: f32,
) -> MovementOutcome {
    let old = body.position;

    let mut vertical = body.velocity.y;
    if is_grounded(world, old) {
        vertical = vertical.max(0.0);
        if jump {
            vertical = JUMP_VELOCITY;
        }
    } else {
        vertical = (vertical + GRAVITY * dt).max(TERMINAL_VELOCITY);
    }

    let horizontal = if intent != Vec3::ZERO {
        intent * MOVE_SPEED
    } else {
        Vec3::new(body.velocity.x, 0.0, body.velocity.z)
    };

    let candidate = old + horizontal * dt + Vec3::Y * (vertical * dt);
    let (position, resolution) = resolve(world, old, candidate);

    let displacement = position - old;
    let mut velocity = displacement / dt;
    if resolution == Resolution::StepUp {
        // the step's own lift is not launch speed
        velocity.y = vertical.max(0.0);
    }

    MovementOutcome {
        body: PlayerBody { position, velocity },
        grounded: is_grounded(world, position),
        resolution,
    }
}

fn resolve<W: SolidQuery + ?Sized>(world: &W, old: Vec3, candidate: Vec3) -> (Vec3, Resolution) {
    // a body already embedded in a block (one was placed on it) moves freely until it is out
    if !collides(world, candidate) || collides(world, old) {
        return (candidate, Resolution::Free);
    }
    if let Some(stepped) = step_up(world, candidate) {
        return (stepped, Resolution::StepUp);
    }

    let slide_z = Vec3::new(old.x, candidate.y, candidate.z);
    if !collides(world, slide_z) {
        return (slide_z, Resolution::SlideZ);
    }
    let slide_x = Vec3::new(candidate.x, candidate.y, old.z);
    if !collides(world, slide_x) {
        return (slide_x, Resolution::SlideX);
    }
    (old, Resolution::Blocked)
}

/// Raises `candidate` by the step height and settles it onto the highest
/// block top under the footprint that lies within the raised span. Fails if
/// the raised box collides or nothing would support it.
fn step_up<W: SolidQuery + ?Sized>(world: &W, candidate: Vec3) -> Option<Vec3> {
    let raised = candidate + Vec3::Y * STEP_HEIGHT;
    if collides(world, raised) {
        return None;
    }

    let candidate_feet = candidate.y - PLAYER_HALF_EXTENTS.y;
    let raised_feet = candidate_feet + STEP_HEIGHT;
    let footprint = Aabb::new(
        Vec3::new(
            raised.x - PLAYER_HALF_EXTENTS.x + SKIN,
            candidate_feet - SKIN,
            raised.z - PLAYER_HALF_EXTENTS.z + SKIN,
        ),
        Vec3::new(
            raised.x + PLAYER_HALF_EXTENTS.x - SKIN,
            raised_feet + SKIN,
            raised.z + PLAYER_HALF_EXTENTS.z - SKIN,
        ),
    );

    let support = footprint
        .cells()
        .filter(|cell| world.is_solid(*cell) && footprint.intersects(&Aabb::cell(*cell)))
        .map(|cell| cell.y as f32 + 0.5)
        .filter(|top| *top >= candidate_feet - SKIN && *top <= raised_feet + SKIN)
        .fold(None, |best: Option<f32>, top| Some(best.map_or(top, |b| b.max(top))))?;

    let settled = Vec3::new(raised.x, support + PLAYER_HALF_EXTENTS.y, raised.z);
    (!collides(world, settled)).then_some(settled)
}
