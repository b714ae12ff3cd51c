use crate::math::is_finite;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Server-assigned identity of one connection, and of the entity it owns.
pub type ConnectionId = u32;

/// RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Colour {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Colour {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// The part of an entity the movement model reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    /// Only advanced by the acceleration policy; stays zero otherwise.
    pub velocity: Vec3,
}

impl KinematicState {
    /// False once any component has overflowed or gone NaN.
    pub fn is_finite(&self) -> bool {
        is_finite(self.position)
            && is_finite(self.front)
            && is_finite(self.up)
            && is_finite(self.velocity)
    }
}

impl Default for KinematicState {
    /// Origin, looking down -Z with +Y up.
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
        }
    }
}

/// Authoritative per-connection record owned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: ConnectionId,
    pub kinematics: KinematicState,
    pub last_acked_sequence: u64,
    pub colour: Colour,
}

impl EntityState {
    pub fn new(id: ConnectionId, colour: Colour) -> Self {
        Self {
            id,
            kinematics: KinematicState::default(),
            last_acked_sequence: 0,
            colour,
        }
    }
}

/// Transform handed to the render collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTransform {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub colour: Colour,
}
