use crate::interpolation::{DEFAULT_RENDER_DELAY_MS, DEFAULT_SNAPSHOT_CAPACITY};
use std::time::Duration;

/// Runtime settings for one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    /// Added to both directions.
    pub fake_ping: Duration,
    /// How far behind the estimated server time remote entities are drawn.
    pub render_delay: Duration,
    pub snapshot_capacity: usize,
    /// Zero sends each command as soon as it is made.
    pub send_interval: Duration,
    pub prediction: bool,
    pub interpolation: bool,
    /// Stop after this long; `None` runs until interrupted.
    pub run_for: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            fake_ping: Duration::ZERO,
            render_delay: Duration::from_millis(DEFAULT_RENDER_DELAY_MS),
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            send_interval: Duration::ZERO,
            prediction: true,
            interpolation: true,
            run_for: None,
        }
    }
}
