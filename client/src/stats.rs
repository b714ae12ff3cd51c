//! Network statistics: round-trip time, snapshot rate and server clock estimate

use shared::Packet;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const PING_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_PING_SAMPLES: usize = 100;

/// One round-trip measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingSample {
    pub rtt_ms: u64,
    pub at: Instant,
}

/// Sends a ping once per interval and keeps recent round-trip times.
#[derive(Debug)]
pub struct PingTracker {
    samples: VecDeque<PingSample>,
    max_samples: usize,
    interval: Duration,
    last_sent: Option<Instant>,
}

impl PingTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: MAX_PING_SAMPLES,
            interval: PING_INTERVAL,
            last_sent: None,
        }
    }

    /// Returns a ping to send when one is due.
    pub fn poll(&mut self, now: Instant, now_ms: u64) -> Option<Packet> {
        let due = self
            .last_sent
            .map_or(true, |sent| now.duration_since(sent) >= self.interval);
        if !due {
            return None;
        }
        self.last_sent = Some(now);
        Some(Packet::Ping {
            origin_timestamp: now_ms,
        })
    }

    /// Records the echo of one of our pings and returns its round-trip time.
    pub fn record_echo(&mut self, origin_timestamp: u64, now_ms: u64, now: Instant) -> u64 {
        let rtt_ms = now_ms.saturating_sub(origin_timestamp);
        self.samples.push_back(PingSample { rtt_ms, at: now });
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        rtt_ms
    }

    pub fn latest(&self) -> Option<u64> {
        self.samples.back().map(|s| s.rtt_ms)
    }

    pub fn average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let total: u64 = self.samples.iter().map(|s| s.rtt_ms).sum();
        Some(total as f32 / self.samples.len() as f32)
    }

    pub fn samples(&self) -> &VecDeque<PingSample> {
        &self.samples
    }
}

impl Default for PingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshots received per second, smoothed once per second.
#[derive(Debug)]
pub struct UpdateRateMeter {
    count: u32,
    window_start: Instant,
    rate: f32,
}

impl UpdateRateMeter {
    const WINDOW: Duration = Duration::from_secs(1);
    const NEW_WEIGHT: f32 = 0.9;

    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            rate: 0.0,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.count += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= Self::WINDOW {
            let measured = self.count as f32 / elapsed.as_secs_f32();
            self.rate = measured * Self::NEW_WEIGHT + self.rate * (1.0 - Self::NEW_WEIGHT);
            self.count = 0;
            self.window_start = now;
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

/// Estimates the server's clock from snapshot timestamps.
///
/// Each sample is `server_ts + rtt / 2 - local_now`; samples are blended
/// into the running offset with [`ServerClock::SMOOTHING`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerClock {
    offset_ms: Option<f64>,
}

impl ServerClock {
    pub const SMOOTHING: f64 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, server_timestamp: u64, rtt_ms: u64, local_now_ms: u64) {
        let sample = server_timestamp as f64 + rtt_ms as f64 / 2.0 - local_now_ms as f64;
        self.offset_ms = Some(match self.offset_ms {
            None => sample,
            Some(offset) => offset + (sample - offset) * Self::SMOOTHING,
        });
    }

    /// Server time corresponding to `local_now_ms`; the local time until
    /// the first observation.
    pub fn estimate(&self, local_now_ms: u64) -> u64 {
        let offset = self.offset_ms.unwrap_or(0.0);
        (local_now_ms as f64 + offset).max(0.0).round() as u64
    }

    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_ms
    }
}
