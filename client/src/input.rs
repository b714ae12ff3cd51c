//! Client input: mouse-look orientation and movement key sampling

use glam::Vec3;
use shared::math::safe_normalize;
use shared::MovementFlags;

/// Degrees of rotation per pixel of mouse movement.
pub const MOUSE_SENSITIVITY: f32 = 0.1;
/// Pitch limit in degrees; keeps the view from flipping over the pole.
pub const MAX_PITCH: f32 = 89.0;
/// Initial yaw in degrees, which faces down -Z.
pub const INITIAL_YAW: f32 = -90.0;

/// Accumulates mouse deltas into a yaw/pitch camera basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookController {
    yaw: f32,
    pitch: f32,
    sensitivity: f32,
}

impl LookController {
    pub fn new() -> Self {
        Self {
            yaw: INITIAL_YAW,
            pitch: 0.0,
            sensitivity: MOUSE_SENSITIVITY,
        }
    }

    /// Positive `dx` turns right, positive `dy` looks up.
    pub fn apply_mouse_delta(&mut self, dx: f32, dy: f32) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.yaw = (self.yaw + dx * self.sensitivity) % 360.0;
        self.pitch = (self.pitch + dy * self.sensitivity).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Current `(front, up)` pair as sent in commands.
    pub fn orientation(&self) -> (Vec3, Vec3) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = safe_normalize(Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        ));
        let side = safe_normalize(Vec3::Y.cross(front));
        let up = safe_normalize(front.cross(side));
        (front, up)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

impl Default for LookController {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame of raw input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    pub flags: MovementFlags,
    pub mouse_delta: (f32, f32),
    /// Flip client-side prediction on or off this frame.
    pub toggle_prediction: bool,
    /// Flip remote entity interpolation on or off this frame.
    pub toggle_interpolation: bool,
}

impl InputSample {
    pub fn new(flags: MovementFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_mouse_delta(mut self, dx: f32, dy: f32) -> Self {
        self.mouse_delta = (dx, dy);
        self
    }

    pub fn with_toggles(mut self, prediction: bool, interpolation: bool) -> Self {
        self.toggle_prediction = prediction;
        self.toggle_interpolation = interpolation;
        self
    }
}

/// Where the client gets its keys and mouse from.
pub trait InputSource {
    /// Called once per simulation tick.
    fn sample(&mut self, tick: u64) -> InputSample;
}

/// Headless input that walks a fixed pattern: forward, strafe right,
/// backward, strafe left, then turn on the spot.
///
/// Optionally flips prediction and interpolation every `toggle_every` ticks,
/// alternating between the two, so a single run exercises every mode.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    ticks_per_phase: u64,
    toggle_every: Option<u64>,
}

impl ScriptedInput {
    const PHASES: u64 = 5;

    pub fn new(ticks_per_phase: u64) -> Self {
        Self {
            ticks_per_phase: ticks_per_phase.max(1),
            toggle_every: None,
        }
    }

    /// Zero disables toggling.
    pub fn with_toggle_every(mut self, ticks: u64) -> Self {
        self.toggle_every = (ticks > 0).then_some(ticks);
        self
    }

    fn toggles(&self, tick: u64) -> (bool, bool) {
        match self.toggle_every {
            Some(every) if tick > 0 && tick % every == 0 => {
                let prediction = (tick / every) % 2 == 1;
                (prediction, !prediction)
            }
            _ => (false, false),
        }
    }
}

impl Default for ScriptedInput {
    /// Two seconds per phase at 60 Hz.
    fn default() -> Self {
        Self::new(120)
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, tick: u64) -> InputSample {
        let sample = match (tick / self.ticks_per_phase) % Self::PHASES {
            0 => InputSample::new(MovementFlags::FORWARD),
            1 => InputSample::new(MovementFlags::RIGHT),
            2 => InputSample::new(MovementFlags::BACKWARD),
            3 => InputSample::new(MovementFlags::LEFT),
            _ => InputSample::new(MovementFlags::NONE).with_mouse_delta(15.0, 0.0),
        };
        let (prediction, interpolation) = self.toggles(tick);
        sample.with_toggles(prediction, interpolation)
    }
}

/// Returns the same sample every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedInput(pub InputSample);

impl InputSource for FixedInput {
    fn sample(&mut self, _tick: u64) -> InputSample {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_initial_orientation_faces_negative_z() {
        let look = LookController::new();
        let (front, up) = look.orientation();

        assert_approx_eq!(front.x, 0.0, 1e-6);
        assert_approx_eq!(front.y, 0.0, 1e-6);
        assert_approx_eq!(front.z, -1.0, 1e-6);
        assert_approx_eq!(up.y, 1.0, 1e-6);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut look = LookController::new();
        look.apply_mouse_delta(0.0, 10_000.0);
        assert_eq!(look.pitch(), MAX_PITCH);

        look.apply_mouse_delta(0.0, -100_000.0);
        assert_eq!(look.pitch(), -MAX_PITCH);

        let (front, up) = look.orientation();
        assert!(front.is_finite());
        assert!(up.is_finite());
    }

    #[test]
    fn test_turning_right() {
        let mut look = LookController::new();
        // 900 px * 0.1 = 90 degrees, ending up facing +X
        look.apply_mouse_delta(900.0, 0.0);

        let (front, _) = look.orientation();
        assert_approx_eq!(front.x, 1.0, 1e-5);
        assert_approx_eq!(front.z, 0.0, 1e-5);
    }

    #[test]
    fn test_orientation_is_orthonormal() {
        let mut look = LookController::new();
        look.apply_mouse_delta(123.0, 321.0);

        let (front, up) = look.orientation();
        assert_approx_eq!(front.length(), 1.0, 1e-5);
        assert_approx_eq!(up.length(), 1.0, 1e-5);
        assert_approx_eq!(front.dot(up), 0.0, 1e-5);
    }

    #[test]
    fn test_non_finite_delta_ignored() {
        let mut look = LookController::new();
        look.apply_mouse_delta(f32::NAN, 1.0);
        assert_eq!(look, LookController::new());
    }

    #[test]
    fn test_scripted_input_cycles() {
        let mut input = ScriptedInput::new(10);

        assert_eq!(input.sample(0).flags, MovementFlags::FORWARD);
        assert_eq!(input.sample(9).flags, MovementFlags::FORWARD);
        assert_eq!(input.sample(10).flags, MovementFlags::RIGHT);
        assert_eq!(input.sample(25).flags, MovementFlags::BACKWARD);
        assert_eq!(input.sample(35).flags, MovementFlags::LEFT);

        let turning = input.sample(45);
        assert!(turning.flags.is_empty());
        assert!(turning.mouse_delta.0 > 0.0);

        assert_eq!(input.sample(50).flags, MovementFlags::FORWARD);
    }

    #[test]
    fn test_scripted_toggles_alternate() {
        let mut input = ScriptedInput::new(10).with_toggle_every(100);

        let quiet = input.sample(0);
        assert!(!quiet.toggle_prediction && !quiet.toggle_interpolation);
        assert!(!input.sample(99).toggle_prediction);

        let first = input.sample(100);
        assert!(first.toggle_prediction && !first.toggle_interpolation);
        let second = input.sample(200);
        assert!(!second.toggle_prediction && second.toggle_interpolation);

        let mut never = ScriptedInput::new(10).with_toggle_every(0);
        assert!(!never.sample(100).toggle_prediction);
    }

    #[test]
    fn test_fixed_input() {
        let sample = InputSample::new(MovementFlags::FORWARD | MovementFlags::LEFT);
        let mut input = FixedInput(sample);
        assert_eq!(input.sample(0), sample);
        assert_eq!(input.sample(1000), sample);
    }
}
