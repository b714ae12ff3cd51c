use crate::command_queue::{DrainPolicy, DEFAULT_MAX_PENDING};
use shared::{MovementPolicy, DEFAULT_BROADCAST_RATE, DEFAULT_TICK_RATE, MAX_TICK_RATE};
use std::time::Duration;

/// Runtime settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`. Port 0 picks a free port.
    pub bind_addr: String,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Snapshots broadcast per second.
    pub broadcast_rate: u32,
    /// Accumulated simulation lag above this is discarded.
    pub max_lag: Duration,
    pub max_clients: usize,
    /// Per-connection command backlog; older commands are dropped beyond it.
    pub max_pending_commands: usize,
    pub drain_policy: DrainPolicy,
    pub movement_policy: MovementPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_rate: DEFAULT_TICK_RATE,
            broadcast_rate: DEFAULT_BROADCAST_RATE,
            max_lag: Duration::from_millis(250),
            max_clients: 32,
            max_pending_commands: DEFAULT_MAX_PENDING,
            drain_policy: DrainPolicy::default(),
            movement_policy: MovementPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.clamp(1, MAX_TICK_RATE)))
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.broadcast_rate.clamp(1, MAX_TICK_RATE)))
    }
}
