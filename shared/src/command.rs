//! Client-generated movement commands

use crate::error::ProtocolError;
use crate::math::is_finite;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Set of held movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MovementFlags(u8);

impl MovementFlags {
    pub const NONE: MovementFlags = MovementFlags(0);
    pub const FORWARD: MovementFlags = MovementFlags(1 << 0);
    pub const BACKWARD: MovementFlags = MovementFlags(1 << 1);
    pub const LEFT: MovementFlags = MovementFlags(1 << 2);
    pub const RIGHT: MovementFlags = MovementFlags(1 << 3);

    const ALL_BITS: u8 = 0b1111;

    pub fn contains(self, other: MovementFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn insert(&mut self, other: MovementFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: MovementFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `None` when unknown bits are set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL_BITS == 0 {
            Some(MovementFlags(bits))
        } else {
            None
        }
    }
}

impl std::ops::BitOr for MovementFlags {
    type Output = MovementFlags;

    fn bitor(self, rhs: MovementFlags) -> MovementFlags {
        MovementFlags(self.0 | rhs.0)
    }
}

/// Desired side/forward speeds used by the acceleration policy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DesiredSpeed {
    pub side: f32,
    pub forward: f32,
}

/// One sequence-numbered input sample.
///
/// Sequence numbers start at 1 and strictly increase per connection. The
/// orientation vectors arrive pre-computed from client-side mouse look.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub sequence: u64,
    pub front: Vec3,
    pub up: Vec3,
    pub flags: MovementFlags,
    pub desired_speed: Option<DesiredSpeed>,
}

impl Command {
    pub fn new(sequence: u64, front: Vec3, up: Vec3, flags: MovementFlags) -> Self {
        Self {
            sequence,
            front,
            up,
            flags,
            desired_speed: None,
        }
    }

    pub fn with_desired_speed(mut self, desired_speed: DesiredSpeed) -> Self {
        self.desired_speed = Some(desired_speed);
        self
    }

    /// Rejects commands that must never reach the movement model.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.sequence == 0 {
            return Err(ProtocolError::InvalidCommand(
                "sequence numbers start at 1".to_string(),
            ));
        }
        if !is_finite(self.front) || !is_finite(self.up) {
            return Err(ProtocolError::InvalidCommand(format!(
                "non-finite orientation in command {}",
                self.sequence
            )));
        }
        if !is_unit(self.front) || !is_unit(self.up) {
            return Err(ProtocolError::InvalidCommand(format!(
                "orientation in command {} is not unit length (front {:.4}, up {:.4})",
                self.sequence,
                self.front.length(),
                self.up.length()
            )));
        }
        if MovementFlags::from_bits(self.flags.bits()).is_none() {
            return Err(ProtocolError::InvalidCommand(format!(
                "unknown movement bits {:#06b} in command {}",
                self.flags.bits(),
                self.sequence
            )));
        }
        if let Some(speed) = self.desired_speed {
            if !speed.side.is_finite() || !speed.forward.is_finite() {
                return Err(ProtocolError::InvalidCommand(format!(
                    "non-finite desired speed in command {}",
                    self.sequence
                )));
            }
        }
        Ok(())
    }
}

/// Allowed deviation from length 1 for command orientation vectors.
pub const ORIENTATION_TOLERANCE: f32 = 1e-3;

fn is_unit(v: Vec3) -> bool {
    (v.length() - 1.0).abs() <= ORIENTATION_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(sequence: u64) -> Command {
        Command::new(sequence, Vec3::NEG_Z, Vec3::Y, MovementFlags::FORWARD)
    }

    #[test]
    fn test_flags_insert_remove() {
        let mut flags = MovementFlags::NONE;
        assert!(flags.is_empty());

        flags.insert(MovementFlags::FORWARD);
        flags.insert(MovementFlags::LEFT);
        assert!(flags.contains(MovementFlags::FORWARD));
        assert!(flags.contains(MovementFlags::LEFT));
        assert!(!flags.contains(MovementFlags::RIGHT));

        flags.remove(MovementFlags::FORWARD);
        assert!(!flags.contains(MovementFlags::FORWARD));
        assert_eq!(flags, MovementFlags::LEFT);
    }

    #[test]
    fn test_flags_none_is_never_contained() {
        assert!(!MovementFlags::FORWARD.contains(MovementFlags::NONE));
    }

    #[test]
    fn test_flags_from_bits() {
        assert_eq!(
            MovementFlags::from_bits(0b0101),
            Some(MovementFlags::FORWARD | MovementFlags::LEFT)
        );
        assert_eq!(MovementFlags::from_bits(0b1_0000), None);
    }

    #[test]
    fn test_valid_command() {
        assert!(command(1).validate().is_ok());
    }

    #[test]
    fn test_sequence_zero_rejected() {
        assert!(matches!(
            command(0).validate(),
            Err(ProtocolError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_non_finite_orientation_rejected() {
        let mut cmd = command(3);
        cmd.front = Vec3::new(f32::NAN, 0.0, -1.0);
        assert!(cmd.validate().is_err());

        let mut cmd = command(4);
        cmd.up = Vec3::new(0.0, f32::INFINITY, 0.0);
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_oversized_orientation_rejected() {
        let mut cmd = command(7);
        cmd.front = Vec3::new(0.0, 0.0, -3e38);
        assert!(matches!(cmd.validate(), Err(ProtocolError::InvalidCommand(_))));

        let mut cmd = command(8);
        cmd.up = Vec3::Y * 2.0;
        assert!(cmd.validate().is_err());

        let mut cmd = command(9);
        cmd.front = Vec3::ZERO;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_nearly_unit_orientation_accepted() {
        let mut cmd = command(10);
        cmd.front = Vec3::new(0.6, 0.0, -0.8) * 1.0005;
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_unknown_flag_bits_rejected() {
        let mut cmd = command(5);
        cmd.flags = MovementFlags(0xF0);
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_non_finite_desired_speed_rejected() {
        let cmd = command(6).with_desired_speed(DesiredSpeed {
            side: f32::NAN,
            forward: 1.0,
        });
        assert!(cmd.validate().is_err());
    }
}
