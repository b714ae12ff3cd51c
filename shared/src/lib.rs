//! Types and logic both ends of the state synchronization protocol must agree on
//!
//! The server simulates, the client predicts and replays; both go through the
//! same [`MovementPolicy::simulate`] with the same fixed step, and both speak
//! the [`Packet`] protocol defined here.

pub mod command;
pub mod entity;
pub mod error;
pub mod math;
pub mod movement;
pub mod protocol;
pub mod snapshot;
pub mod timestep;

pub use command::{Command, DesiredSpeed, MovementFlags};
pub use entity::{Colour, ConnectionId, EntityState, KinematicState, RenderTransform};
pub use error::ProtocolError;
pub use movement::MovementPolicy;
pub use protocol::{decode_packet, encode_frame, read_frame, write_packet, Packet, MAX_FRAME_LEN};
pub use snapshot::{Snapshot, SnapshotEntity};
pub use timestep::{FixedTimestep, MAX_TICK_RATE};

use std::time::Instant;

/// Default simulation rate shared by server and client.
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Default snapshot broadcast rate.
pub const DEFAULT_BROADCAST_RATE: u32 = 30;

/// Millisecond clock counting from a fixed local origin.
///
/// Built on [`Instant`], so readings never go backwards even when the wall
/// clock is adjusted. Snapshot timestamps and ping origins use it.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self { origin }
    }

    pub fn now_ms(&self) -> u64 {
        self.ms_at(Instant::now())
    }

    /// Milliseconds from the origin to `instant`; zero for instants before it.
    pub fn ms_at(&self, instant: Instant) -> u64 {
        instant
            .saturating_duration_since(self.origin)
            .as_millis()
            .min(u64::MAX as u128) as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulation step length in seconds for a given tick rate.
pub fn step_secs(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}
