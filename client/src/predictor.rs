//! Client-side prediction of the local entity

use crate::reconciler::{reconcile, ReconcileOutcome};
use glam::Vec3;
use shared::movement::desired_speed_from_keys;
use shared::{step_secs, Command, KinematicState, MovementFlags, MovementPolicy, SnapshotEntity};
use std::collections::VecDeque;

/// Local mirror of the server's movement model for our own entity.
///
/// Every command is applied immediately and kept until the server
/// acknowledges it, so it can be replayed on top of each authoritative
/// snapshot.
#[derive(Debug, Clone)]
pub struct Predictor {
    state: KinematicState,
    history: VecDeque<Command>,
    next_sequence: u64,
    /// Keys held on the previous input step.
    last_flags: MovementFlags,
    policy: MovementPolicy,
    dt: f32,
}

impl Predictor {
    /// `tick_rate` must be the server's, as announced in the join ack.
    pub fn new(policy: MovementPolicy, tick_rate: u32, initial: KinematicState) -> Self {
        Self {
            state: initial,
            history: VecDeque::new(),
            next_sequence: 1,
            last_flags: MovementFlags::NONE,
            policy,
            dt: step_secs(tick_rate),
        }
    }

    /// Stamps a new command with the next sequence number.
    ///
    /// Under the acceleration policy the command also carries desired speeds,
    /// with keys pressed this step weighted half.
    pub fn next_command(&mut self, flags: MovementFlags, front: Vec3, up: Vec3) -> Command {
        let mut command = Command::new(self.next_sequence, front, up, flags);
        if self.policy == MovementPolicy::Acceleration {
            command = command.with_desired_speed(desired_speed_from_keys(self.last_flags, flags));
        }
        self.last_flags = flags;
        self.next_sequence += 1;
        command
    }

    /// Applies a command locally and retains it until acknowledged.
    pub fn predict(&mut self, command: Command) {
        self.state = self.policy.simulate(&self.state, &command, self.dt);
        self.history.push_back(command);
    }

    /// Builds, applies and returns the command for one input step.
    pub fn process_input(&mut self, flags: MovementFlags, front: Vec3, up: Vec3) -> Command {
        let command = self.next_command(flags, front, up);
        self.predict(command);
        command
    }

    /// Snaps to the server and replays everything not yet acknowledged.
    pub fn reconcile(&mut self, authoritative: &SnapshotEntity) -> ReconcileOutcome {
        reconcile(
            &mut self.state,
            authoritative,
            &mut self.history,
            self.policy,
            self.dt,
        )
    }

    /// Takes the server state as-is and forgets pending commands.
    pub fn hard_snap(&mut self, authoritative: &SnapshotEntity) {
        self.state = authoritative.kinematics();
        self.history.clear();
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn pending(&self) -> &VecDeque<Command> {
        &self.history
    }

    pub fn pending_sequences(&self) -> Vec<u64> {
        self.history.iter().map(|c| c.sequence).collect()
    }

    /// Sequence number of the most recently issued command, 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn policy(&self) -> MovementPolicy {
        self.policy
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::movement::BASE_SPEED;

    fn predictor() -> Predictor {
        Predictor::new(MovementPolicy::Discrete, 60, KinematicState::default())
    }

    #[test]
    fn test_sequences_start_at_one() {
        let mut predictor = predictor();
        assert_eq!(predictor.last_sequence(), 0);

        let first = predictor.process_input(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);
        let second = predictor.process_input(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(predictor.last_sequence(), 2);
        assert_eq!(predictor.pending_sequences(), vec![1, 2]);
    }

    #[test]
    fn test_prediction_moves_immediately() {
        let mut predictor = predictor();
        predictor.process_input(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);

        let expected = -BASE_SPEED * predictor.dt();
        assert_approx_eq!(predictor.state().position.z, expected, 1e-6);
    }

    #[test]
    fn test_orientation_taken_from_command() {
        let mut predictor = predictor();
        predictor.process_input(MovementFlags::NONE, Vec3::X, Vec3::Y);
        assert_eq!(predictor.state().front, Vec3::X);
        assert_eq!(predictor.state().position, Vec3::ZERO);
    }

    #[test]
    fn test_hard_snap_clears_history() {
        let mut predictor = predictor();
        predictor.process_input(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);

        let authoritative = SnapshotEntity {
            position: Vec3::new(1.0, 2.0, 3.0),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            velocity: Vec3::ZERO,
            last_acked_sequence: 0,
            colour: Default::default(),
        };
        predictor.hard_snap(&authoritative);

        assert_eq!(predictor.state().position, Vec3::new(1.0, 2.0, 3.0));
        assert!(predictor.pending().is_empty());
        // numbering continues after a snap
        let next = predictor.next_command(MovementFlags::NONE, Vec3::NEG_Z, Vec3::Y);
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn test_acceleration_commands_ramp_fresh_keys() {
        let mut predictor =
            Predictor::new(MovementPolicy::Acceleration, 60, KinematicState::default());
        let first = predictor.next_command(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);
        let second = predictor.next_command(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);

        let forward = |c: &Command| c.desired_speed.unwrap().forward;
        assert_eq!(forward(&first), 0.5 * shared::movement::FORWARD_SPEED);
        assert_eq!(forward(&second), shared::movement::FORWARD_SPEED);
        assert!(first.validate().is_ok());
    }

    #[test]
    fn test_discrete_commands_carry_flags_only() {
        let mut predictor = predictor();
        let command = predictor.next_command(MovementFlags::FORWARD, Vec3::NEG_Z, Vec3::Y);
        assert!(command.desired_speed.is_none());
    }

    #[test]
    fn test_matches_server_dt() {
        let predictor = Predictor::new(MovementPolicy::Discrete, 30, KinematicState::default());
        assert_eq!(predictor.dt(), step_secs(30));
    }
}
