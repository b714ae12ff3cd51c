//! Movement model shared by the authoritative server and the client predictor
//!
//! Both sides must run the same policy with the same fixed `dt`, otherwise
//! replayed predictions drift away from the server permanently. The server
//! picks one policy at start-up and announces it in the join handshake.

use crate::command::{Command, DesiredSpeed, MovementFlags};
use crate::entity::KinematicState;
use crate::math::safe_normalize;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Units per second for the discrete-direction policy.
pub const BASE_SPEED: f32 = 2.5;
/// Velocity retained per tick under the acceleration policy.
pub const FRICTION: f32 = 0.9;
/// Fraction of wish speed gained per tick under the acceleration policy.
pub const ACCELERATION: f32 = 0.02;
/// Upper bound on wish speed.
pub const MAX_WISH_SPEED: f32 = 3.0;
/// Desired forward speed derived from a held forward/backward key.
pub const FORWARD_SPEED: f32 = 50.0;
/// Desired side speed derived from a held strafe key.
pub const SIDE_SPEED: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementPolicy {
    /// Fixed speed along front / strafe axes for each held direction.
    #[default]
    Discrete,
    /// Friction plus capped acceleration toward a flattened wish direction.
    Acceleration,
}

impl MovementPolicy {
    /// Applies one command for one tick of length `dt` seconds.
    pub fn simulate(self, state: &KinematicState, command: &Command, dt: f32) -> KinematicState {
        match self {
            MovementPolicy::Discrete => simulate_discrete(state, command, dt),
            MovementPolicy::Acceleration => simulate_acceleration(state, command, dt),
        }
    }
}

impl fmt::Display for MovementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementPolicy::Discrete => write!(f, "discrete"),
            MovementPolicy::Acceleration => write!(f, "acceleration"),
        }
    }
}

impl FromStr for MovementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discrete" => Ok(MovementPolicy::Discrete),
            "acceleration" | "accel" => Ok(MovementPolicy::Acceleration),
            other => Err(format!("unknown movement policy '{}'", other)),
        }
    }
}

fn strafe_axis(front: Vec3, up: Vec3) -> Vec3 {
    safe_normalize(front.cross(up))
}

fn simulate_discrete(state: &KinematicState, command: &Command, dt: f32) -> KinematicState {
    let mut next = *state;
    next.front = command.front;
    next.up = command.up;

    let speed = BASE_SPEED * dt;
    let flags = command.flags;

    if flags.contains(MovementFlags::FORWARD) {
        next.position += next.front * speed;
    }
    if flags.contains(MovementFlags::BACKWARD) {
        next.position -= next.front * speed;
    }
    if flags.contains(MovementFlags::LEFT) {
        next.position -= strafe_axis(next.front, next.up) * speed;
    }
    if flags.contains(MovementFlags::RIGHT) {
        next.position += strafe_axis(next.front, next.up) * speed;
    }

    next
}

/// Weight of a key on the tick it goes down.
pub const KEY_PRESSED_WEIGHT: f32 = 0.5;

fn key_weight(previous: MovementFlags, current: MovementFlags, key: MovementFlags) -> f32 {
    match (previous.contains(key), current.contains(key)) {
        (false, true) => KEY_PRESSED_WEIGHT,
        (true, true) => 1.0,
        _ => 0.0,
    }
}

/// Desired speeds implied by held keys when a command carries none.
pub fn desired_speed_from_flags(flags: MovementFlags) -> DesiredSpeed {
    desired_speed_from_keys(flags, flags)
}

/// Desired speeds from two consecutive input samples: a key pressed this
/// tick counts half, a key held since the previous tick counts fully.
pub fn desired_speed_from_keys(previous: MovementFlags, current: MovementFlags) -> DesiredSpeed {
    let axis = |positive: MovementFlags, negative: MovementFlags| {
        key_weight(previous, current, positive) - key_weight(previous, current, negative)
    };

    DesiredSpeed {
        side: axis(MovementFlags::RIGHT, MovementFlags::LEFT) * SIDE_SPEED,
        forward: axis(MovementFlags::FORWARD, MovementFlags::BACKWARD) * FORWARD_SPEED,
    }
}

fn simulate_acceleration(state: &KinematicState, command: &Command, dt: f32) -> KinematicState {
    let mut next = *state;
    next.front = command.front;
    next.up = command.up;

    let desired = command
        .desired_speed
        .unwrap_or_else(|| desired_speed_from_flags(command.flags));

    let velocity = state.velocity * FRICTION;

    // Movement basis lives in the horizontal plane.
    let flat_front = safe_normalize(Vec3::new(command.front.x, 0.0, command.front.z));
    let mut right = safe_normalize(Vec3::Y.cross(flat_front));
    right.y = 0.0;

    // `right` points to the entity's left, hence the negated side speed.
    let mut wish_velocity = flat_front * desired.forward - right * desired.side;
    wish_velocity.y = 0.0;

    let mut wish_speed = wish_velocity.length();
    if wish_speed > MAX_WISH_SPEED {
        wish_velocity *= MAX_WISH_SPEED / wish_speed;
        wish_speed = MAX_WISH_SPEED;
    }

    let wish_dir = if wish_speed > 0.0 {
        safe_normalize(wish_velocity)
    } else {
        Vec3::ZERO
    };

    let current_speed = velocity.dot(wish_dir);
    let add_speed = wish_speed - current_speed;
    let accel_speed = (ACCELERATION * wish_speed).min(add_speed);

    next.velocity = velocity + wish_dir * accel_speed;
    next.position = Vec3::new(
        state.position.x + next.velocity.x * dt,
        state.position.y,
        state.position.z + next.velocity.z * dt,
    );

    next
}
