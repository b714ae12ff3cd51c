use crate::config::ClientConfig;
use crate::input::{InputSample, LookController};
use crate::interpolation::{interpolate, SnapshotBuffer};
use crate::predictor::Predictor;
use crate::reconciler::ReconcileOutcome;
use crate::render::RenderFrame;
use crate::stats::ServerClock;
use log::{debug, info};
use shared::{
    Colour, Command, ConnectionId, KinematicState, MovementPolicy, RenderTransform, Snapshot,
};

/// Client-side world: our predicted entity plus buffered snapshots of everyone else.
pub struct ClientGame {
    connection_id: Option<ConnectionId>,
    predictor: Option<Predictor>,
    colour: Colour,
    tick_rate: u32,
    tick: u64,

    snapshots: SnapshotBuffer,
    look: LookController,
    server_clock: ServerClock,
    render_delay_ms: u64,

    prediction_enabled: bool,
    interpolation_enabled: bool,
}

impl ClientGame {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            connection_id: None,
            predictor: None,
            colour: Colour::default(),
            tick_rate: shared::DEFAULT_TICK_RATE,
            tick: 0,
            snapshots: SnapshotBuffer::new(config.snapshot_capacity),
            look: LookController::new(),
            server_clock: ServerClock::new(),
            render_delay_ms: config.render_delay.as_millis() as u64,
            prediction_enabled: config.prediction,
            interpolation_enabled: config.interpolation,
        }
    }

    /// Sets up prediction from the server's join ack.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        tick_rate: u32,
        policy: MovementPolicy,
        snapshot: Snapshot,
        local_now_ms: u64,
    ) {
        let initial = match snapshot.entity(connection_id) {
            Some(own) => {
                self.colour = own.colour;
                own.kinematics()
            }
            None => KinematicState::default(),
        };

        info!(
            "Joined as {} ({} Hz, {} movement, {} entities)",
            connection_id,
            tick_rate,
            policy,
            snapshot.len()
        );

        self.connection_id = Some(connection_id);
        self.tick_rate = tick_rate;
        self.predictor = Some(Predictor::new(policy, tick_rate, initial));
        self.server_clock.observe(snapshot.server_timestamp, 0, local_now_ms);
        self.snapshots.push(snapshot);
    }

    /// Feeds one server update through reconciliation and into the buffer.
    pub fn apply_snapshot(
        &mut self,
        snapshot: Snapshot,
        rtt_ms: u64,
        local_now_ms: u64,
    ) -> Option<ReconcileOutcome> {
        self.server_clock
            .observe(snapshot.server_timestamp, rtt_ms, local_now_ms);

        let mut outcome = None;
        if let (Some(id), Some(predictor)) = (self.connection_id, self.predictor.as_mut()) {
            if let Some(own) = snapshot.entity(id) {
                self.colour = own.colour;
                if self.prediction_enabled {
                    outcome = Some(predictor.reconcile(own));
                } else {
                    predictor.hard_snap(own);
                }
            } else {
                debug!("Snapshot at {} has no entry for us", snapshot.server_timestamp);
            }
        }

        self.snapshots.push(snapshot);
        outcome
    }

    /// Turns one input sample into the command to send. `None` before joining.
    pub fn process_input(&mut self, sample: InputSample) -> Option<Command> {
        if sample.toggle_prediction {
            self.set_prediction(!self.prediction_enabled);
        }
        if sample.toggle_interpolation {
            self.set_interpolation(!self.interpolation_enabled);
        }

        self.look
            .apply_mouse_delta(sample.mouse_delta.0, sample.mouse_delta.1);
        let (front, up) = self.look.orientation();

        let predictor = self.predictor.as_mut()?;
        self.tick += 1;

        let command = if self.prediction_enabled {
            predictor.process_input(sample.flags, front, up)
        } else {
            predictor.next_command(sample.flags, front, up)
        };
        Some(command)
    }

    pub fn render_frame(&mut self, local_now_ms: u64) -> RenderFrame {
        let local = self.predictor.as_ref().map(|predictor| {
            let state = predictor.state();
            RenderTransform {
                position: state.position,
                front: state.front,
                up: state.up,
                colour: self.colour,
            }
        });

        let target = self
            .server_clock
            .estimate(local_now_ms)
            .saturating_sub(self.render_delay_ms);

        let remotes = if self.interpolation_enabled {
            interpolate(self.connection_id, self.snapshots.window(), target)
        } else {
            let latest = self
                .snapshots
                .latest()
                .map(std::slice::from_ref)
                .unwrap_or_default();
            interpolate(self.connection_id, latest, target)
        };

        RenderFrame { local, remotes }
    }

    pub fn set_prediction(&mut self, enabled: bool) {
        if self.prediction_enabled != enabled {
            info!("Client-side prediction: {}", enabled);
        }
        self.prediction_enabled = enabled;
    }

    pub fn set_interpolation(&mut self, enabled: bool) {
        if self.interpolation_enabled != enabled {
            info!("Interpolation: {}", enabled);
        }
        self.interpolation_enabled = enabled;
    }

    pub fn prediction_enabled(&self) -> bool {
        self.prediction_enabled
    }

    pub fn interpolation_enabled(&self) -> bool {
        self.interpolation_enabled
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    pub fn snapshots(&self) -> &SnapshotBuffer {
        &self.snapshots
    }

    pub fn server_clock(&self) -> &ServerClock {
        &self.server_clock
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec3;
    use shared::movement::BASE_SPEED;
    use shared::{step_secs, EntityState, MovementFlags};

    fn entity(id: ConnectionId, position: Vec3, acked: u64) -> EntityState {
        let mut entity = EntityState::new(id, Colour::new(0.3, 0.6, 0.9));
        entity.kinematics.position = position;
        entity.last_acked_sequence = acked;
        entity
    }

    fn joined_game(config: &ClientConfig) -> ClientGame {
        let mut game = ClientGame::new(config);
        let snapshot = Snapshot::from_entities(1000, [&entity(1, Vec3::ZERO, 0)]);
        game.join(1, 60, MovementPolicy::Discrete, snapshot, 1000);
        game
    }

    fn forward() -> InputSample {
        InputSample::new(MovementFlags::FORWARD)
    }

    #[test]
    fn test_no_commands_before_join() {
        let mut game = ClientGame::new(&ClientConfig::default());
        assert!(game.process_input(forward()).is_none());
        assert!(game.render_frame(0).local.is_none());
    }

    #[test]
    fn test_join_sets_up_prediction() {
        let game = joined_game(&ClientConfig::default());
        assert_eq!(game.connection_id(), Some(1));
        assert_eq!(game.snapshots().len(), 1);
        assert_eq!(game.predictor().unwrap().state().position, Vec3::ZERO);
    }

    #[test]
    fn test_three_commands_one_acked_replayed() {
        let mut game = joined_game(&ClientConfig::default());
        let dt = step_secs(60);

        let sequences: Vec<u64> = (0..3)
            .map(|_| game.process_input(forward()).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        let acked_position = Vec3::new(0.0, 0.0, -2.0 * BASE_SPEED * dt);
        let snapshot = Snapshot::from_entities(1033, [&entity(1, acked_position, 2)]);
        let outcome = game.apply_snapshot(snapshot, 0, 1033).unwrap();

        assert_eq!(outcome.pruned, 2);
        assert_eq!(outcome.replayed, 1);
        let predictor = game.predictor().unwrap();
        assert_eq!(predictor.pending_sequences(), vec![3]);
        assert_approx_eq!(predictor.state().position.z, -3.0 * BASE_SPEED * dt, 1e-6);
    }

    #[test]
    fn test_prediction_disabled_hard_snaps() {
        let config = ClientConfig {
            prediction: false,
            ..ClientConfig::default()
        };
        let mut game = joined_game(&config);

        let command = game.process_input(forward()).unwrap();
        assert_eq!(command.sequence, 1);
        // not applied locally
        assert_eq!(game.predictor().unwrap().state().position, Vec3::ZERO);

        let snapshot = Snapshot::from_entities(1033, [&entity(1, Vec3::new(0.0, 0.0, -1.0), 0)]);
        assert!(game.apply_snapshot(snapshot, 0, 1033).is_none());

        let predictor = game.predictor().unwrap();
        assert_eq!(predictor.state().position, Vec3::new(0.0, 0.0, -1.0));
        assert!(predictor.pending().is_empty());
    }

    #[test]
    fn test_render_frame_excludes_self_and_interpolates_remotes() {
        let config = ClientConfig {
            render_delay: std::time::Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let mut game = ClientGame::new(&config);

        let first = Snapshot::from_entities(
            1000,
            [&entity(1, Vec3::ZERO, 0), &entity(2, Vec3::ZERO, 0)],
        );
        game.join(1, 60, MovementPolicy::Discrete, first, 1000);

        let second = Snapshot::from_entities(
            1100,
            [
                &entity(1, Vec3::ZERO, 0),
                &entity(2, Vec3::new(10.0, 0.0, 0.0), 0),
            ],
        );
        game.apply_snapshot(second, 0, 1000);

        // the clock offset is between 0 and 10 ms, so the target sits inside the bracket
        let frame = game.render_frame(1100);
        assert!(frame.local.is_some());
        assert!(!frame.remotes.contains_key(&1));
        let x = frame.remotes[&2].position.x;
        assert!(x > 4.0 && x < 7.0, "unexpected interpolated x {}", x);
    }

    #[test]
    fn test_interpolation_disabled_uses_latest() {
        let config = ClientConfig {
            interpolation: false,
            ..ClientConfig::default()
        };
        let mut game = ClientGame::new(&config);
        game.join(
            1,
            60,
            MovementPolicy::Discrete,
            Snapshot::from_entities(1000, [&entity(2, Vec3::ZERO, 0)]),
            1000,
        );
        game.apply_snapshot(
            Snapshot::from_entities(1100, [&entity(2, Vec3::X, 0)]),
            0,
            1100,
        );

        let frame = game.render_frame(1300);
        assert_eq!(frame.remotes[&2].position, Vec3::X);
    }

    #[test]
    fn test_input_toggles_modes() {
        let mut game = joined_game(&ClientConfig::default());

        game.process_input(forward().with_toggles(true, false));
        assert!(!game.prediction_enabled());
        assert!(game.interpolation_enabled());
        // this command was sent without being applied locally
        assert_eq!(game.predictor().unwrap().state().position, Vec3::ZERO);

        game.process_input(forward().with_toggles(true, true));
        assert!(game.prediction_enabled());
        assert!(!game.interpolation_enabled());
    }

    #[test]
    fn test_colour_taken_from_server() {
        let mut game = joined_game(&ClientConfig::default());
        let frame = game.render_frame(1000);
        assert_eq!(frame.local.unwrap().colour, Colour::new(0.3, 0.6, 0.9));
    }
}
