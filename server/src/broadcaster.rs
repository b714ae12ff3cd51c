//! Periodic snapshot fan-out

use crate::client_manager::ClientManager;
use crate::game::Game;
use log::debug;
use shared::Packet;

/// How many broadcasts pass between stats log lines.
const STATS_EVERY: u64 = 150;

/// Builds one snapshot per broadcast tick and queues it for every client.
#[derive(Debug, Default)]
pub struct Broadcaster {
    sent: u64,
    last_tick: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends the current world to all clients. Returns how many accepted it.
    ///
    /// Nothing is built when no client is connected.
    pub fn broadcast(&mut self, game: &Game, clients: &ClientManager, now_ms: u64) -> usize {
        if clients.is_empty() {
            return 0;
        }

        let packet = Packet::ServerUpdate {
            snapshot: game.snapshot(now_ms),
        };
        let delivered = clients.broadcast(&packet);
        self.sent += 1;

        if self.sent % STATS_EVERY == 0 {
            let ticks = game.tick.saturating_sub(self.last_tick);
            debug!(
                "Tick {}: {} clients, {} entities, {} pending commands, {} ticks since last report",
                game.tick,
                clients.len(),
                game.entity_count(),
                game.pending_commands(),
                ticks
            );
            self.last_tick = game.tick;
        }

        delivered
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}
