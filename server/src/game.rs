//! Authoritative simulation: drains queued commands and steps every entity

use crate::command_queue::{CommandQueue, DrainPolicy};
use crate::config::ServerConfig;
use crate::entity_store::{random_colour, EntityStore};
use log::{debug, warn};
use shared::{
    step_secs, Command, ConnectionId, EntityState, FixedTimestep, MovementPolicy, Packet,
    ProtocolError, Snapshot, MAX_TICK_RATE,
};
use std::time::Duration;

/// Server-side world: entity table, pending commands and the fixed-step clock.
pub struct Game {
    pub tick: u64,
    entities: EntityStore,
    commands: CommandQueue,
    timestep: FixedTimestep,
    tick_rate: u32,
    dt: f32,
    movement_policy: MovementPolicy,
    drain_policy: DrainPolicy,
}

impl Game {
    pub fn new(config: &ServerConfig) -> Self {
        let tick_rate = config.tick_rate.clamp(1, MAX_TICK_RATE);
        Self {
            tick: 0,
            entities: EntityStore::new(),
            commands: CommandQueue::new(config.max_pending_commands),
            timestep: FixedTimestep::from_rate(tick_rate, config.max_lag),
            tick_rate,
            dt: step_secs(tick_rate),
            movement_policy: config.movement_policy,
            drain_policy: config.drain_policy,
        }
    }

    pub fn add_entity(&mut self, id: ConnectionId) -> &EntityState {
        let colour = random_colour(&mut rand::thread_rng());
        self.entities.insert(id, colour)
    }

    /// Removes the entity; anything still queued for it is dropped on the next tick.
    pub fn remove_entity(&mut self, id: ConnectionId) -> bool {
        self.entities.remove(id).is_some()
    }

    /// Queues a command for the next simulation tick.
    ///
    /// Invalid commands are rejected individually; the caller keeps the
    /// connection open.
    pub fn enqueue(&mut self, id: ConnectionId, command: Command) -> Result<(), ProtocolError> {
        command.validate()?;
        self.commands.enqueue(id, command);
        Ok(())
    }

    /// Feeds real elapsed time into the fixed-step clock and runs the due ticks.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        let steps = self.timestep.advance(elapsed);
        for _ in 0..steps {
            self.step();
        }
        steps
    }

    /// Runs exactly one simulation tick.
    pub fn step(&mut self) {
        for id in self.commands.connection_ids() {
            let Some(entity) = self.entities.get_mut(id) else {
                let dropped = self.commands.discard(id);
                debug!("Dropped {} queued commands for departed entity {}", dropped, id);
                continue;
            };

            let drained = self.commands.drain_for(id, self.drain_policy);
            for command in &drained.to_apply {
                if command.sequence <= entity.last_acked_sequence {
                    debug!(
                        "Skipping stale command {} for entity {} (acked {})",
                        command.sequence, id, entity.last_acked_sequence
                    );
                    continue;
                }
                let next = self
                    .movement_policy
                    .simulate(&entity.kinematics, command, self.dt);
                if next.is_finite() {
                    entity.kinematics = next;
                } else {
                    warn!(
                        "Command {} would leave entity {} with non-finite state, not applied",
                        command.sequence, id
                    );
                }
                entity.last_acked_sequence = command.sequence;
            }

            if let Some(sequence) = drained.consumed_unapplied {
                entity.last_acked_sequence = entity.last_acked_sequence.max(sequence);
            }
        }

        self.tick += 1;
    }

    pub fn snapshot(&self, server_timestamp: u64) -> Snapshot {
        Snapshot::from_entities(server_timestamp, self.entities.iter())
    }

    pub fn join_ack(&self, connection_id: ConnectionId, server_timestamp: u64) -> Packet {
        if !self.entities.contains(connection_id) {
            warn!("Join ack for {} built before its entity exists", connection_id);
        }
        Packet::JoinAck {
            connection_id,
            tick_rate: self.tick_rate,
            movement_policy: self.movement_policy,
            snapshot: self.snapshot(server_timestamp),
        }
    }

    pub fn entity(&self, id: ConnectionId) -> Option<&EntityState> {
        self.entities.get(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.total_pending()
    }

    pub fn movement_policy(&self) -> MovementPolicy {
        self.movement_policy
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use glam::Vec3;
    use shared::{KinematicState, MovementFlags};

    fn command(sequence: u64) -> Command {
        Command::new(sequence, Vec3::NEG_Z, Vec3::Y, MovementFlags::FORWARD)
    }

    fn game_with(drain_policy: DrainPolicy) -> Game {
        Game::new(&ServerConfig {
            drain_policy,
            ..ServerConfig::default()
        })
    }

    #[test]
    fn test_one_command_per_tick() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        for seq in 1..=3 {
            game.enqueue(1, command(seq)).unwrap();
        }

        game.step();
        assert_eq!(game.entity(1).unwrap().last_acked_sequence, 1);
        game.step();
        game.step();
        assert_eq!(game.entity(1).unwrap().last_acked_sequence, 3);

        let expected = -shared::movement::BASE_SPEED * game.dt() * 3.0;
        assert_approx_eq!(game.entity(1).unwrap().kinematics.position.z, expected, 1e-5);
    }

    #[test]
    fn test_drain_all_applies_everything_in_one_tick() {
        let mut game = game_with(DrainPolicy::DrainAll);
        game.add_entity(1);
        for seq in 1..=4 {
            game.enqueue(1, command(seq)).unwrap();
        }

        game.step();
        let entity = game.entity(1).unwrap();
        assert_eq!(entity.last_acked_sequence, 4);
        let expected = -shared::movement::BASE_SPEED * game.dt() * 4.0;
        assert_approx_eq!(entity.kinematics.position.z, expected, 1e-5);
    }

    #[test]
    fn test_coalesce_applies_first_and_acks_all() {
        let mut game = game_with(DrainPolicy::CoalesceFirst);
        game.add_entity(1);
        for seq in 1..=4 {
            game.enqueue(1, command(seq)).unwrap();
        }

        game.step();
        let entity = game.entity(1).unwrap();
        assert_eq!(entity.last_acked_sequence, 4);
        let expected = -shared::movement::BASE_SPEED * game.dt();
        assert_approx_eq!(entity.kinematics.position.z, expected, 1e-5);
    }

    #[test]
    fn test_stale_commands_are_not_reapplied() {
        let mut game = game_with(DrainPolicy::DrainAll);
        game.add_entity(1);
        game.enqueue(1, command(1)).unwrap();
        game.enqueue(1, command(2)).unwrap();
        game.step();
        let after_first_tick = game.entity(1).unwrap().kinematics;

        // duplicates of already-applied commands
        game.enqueue(1, command(1)).unwrap();
        game.enqueue(1, command(2)).unwrap();
        game.step();

        let entity = game.entity(1).unwrap();
        assert_eq!(entity.kinematics, after_first_tick);
        assert_eq!(entity.last_acked_sequence, 2);
    }

    #[test]
    fn test_commands_for_unknown_entity_are_dropped() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.enqueue(99, command(1)).unwrap();

        game.step();

        assert!(game.entity(99).is_none());
        assert_eq!(game.entity_count(), 0);
        assert_eq!(game.pending_commands(), 0);
    }

    #[test]
    fn test_commands_dropped_after_disconnect() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        game.enqueue(1, command(1)).unwrap();
        game.enqueue(1, command(2)).unwrap();

        assert!(game.remove_entity(1));
        game.step();

        assert!(game.entity(1).is_none());
        assert_eq!(game.pending_commands(), 0);
    }

    #[test]
    fn test_invalid_command_rejected() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);

        let mut bad = command(1);
        bad.front = Vec3::new(f32::NAN, 0.0, 0.0);
        assert!(game.enqueue(1, bad).is_err());
        assert!(game.enqueue(1, command(0)).is_err());
        assert_eq!(game.pending_commands(), 0);

        assert!(game.enqueue(1, command(1)).is_ok());
    }

    #[test]
    fn test_oversized_orientation_rejected_at_enqueue() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);

        for seq in 1..=50 {
            let mut huge = command(seq);
            huge.front = Vec3::new(0.0, 0.0, -3e38);
            assert!(game.enqueue(1, huge).is_err());
        }
        game.advance(Duration::from_secs(1));

        assert_eq!(game.entity(1).unwrap().kinematics.position, Vec3::ZERO);
    }

    #[test]
    fn test_overflowing_step_keeps_previous_state() {
        let mut game = Game::new(&ServerConfig {
            movement_policy: MovementPolicy::Acceleration,
            ..ServerConfig::default()
        });
        game.add_entity(1);
        if let Some(entity) = game.entities.get_mut(1) {
            entity.kinematics.position.x = -f32::MAX;
            entity.kinematics.velocity.x = -f32::MAX;
        }
        let before = game.entity(1).unwrap().kinematics;

        game.enqueue(1, command(1)).unwrap();
        game.step();

        let entity = game.entity(1).unwrap();
        assert!(entity.kinematics.is_finite());
        assert_eq!(entity.kinematics, before);
        // consumed so the client stops replaying it
        assert_eq!(entity.last_acked_sequence, 1);
    }

    #[test]
    fn test_backlog_capped_per_connection() {
        let mut game = Game::new(&ServerConfig {
            max_pending_commands: 30,
            ..ServerConfig::default()
        });
        game.add_entity(1);
        for seq in 1..=2_000 {
            game.enqueue(1, command(seq)).unwrap();
        }
        assert_eq!(game.pending_commands(), 30);

        for _ in 0..30 {
            game.step();
        }
        assert_eq!(game.pending_commands(), 0);
        // only the newest commands survived
        assert_eq!(game.entity(1).unwrap().last_acked_sequence, 2_000);
    }

    #[test]
    fn test_tick_rate_clamped() {
        let game = Game::new(&ServerConfig {
            tick_rate: u32::MAX,
            ..ServerConfig::default()
        });
        assert_eq!(game.dt(), step_secs(MAX_TICK_RATE));
        match game.join_ack(1, 0) {
            Packet::JoinAck { tick_rate, .. } => assert_eq!(tick_rate, MAX_TICK_RATE),
            other => panic!("Unexpected packet type: {:?}", other),
        }
    }

    #[test]
    fn test_idle_entity_does_not_move() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        game.step();
        assert_eq!(game.entity(1).unwrap().kinematics, KinematicState::default());
    }

    #[test]
    fn test_advance_runs_whole_ticks() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        for seq in 1..=10 {
            game.enqueue(1, command(seq)).unwrap();
        }

        let steps = game.advance(Duration::from_millis(50));
        assert_eq!(steps, 3);
        assert_eq!(game.tick, 3);
        assert_eq!(game.entity(1).unwrap().last_acked_sequence, 3);
    }

    #[test]
    fn test_snapshot_contains_connected_entities_only() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        game.add_entity(2);
        game.remove_entity(1);

        let snapshot = game.snapshot(500);
        assert_eq!(snapshot.server_timestamp, 500);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.entity(2).is_some());
    }

    #[test]
    fn test_join_ack_includes_self() {
        let mut game = game_with(DrainPolicy::OnePerTick);
        game.add_entity(1);
        game.add_entity(2);

        match game.join_ack(2, 10) {
            Packet::JoinAck {
                connection_id,
                tick_rate,
                snapshot,
                ..
            } => {
                assert_eq!(connection_id, 2);
                assert_eq!(tick_rate, 60);
                assert_eq!(snapshot.len(), 2);
                assert!(snapshot.entity(2).is_some());
            }
            other => panic!("Unexpected packet type: {:?}", other),
        }
    }
}
