//! Outgoing command batching

use shared::{Command, Packet};
use std::time::{Duration, Instant};

/// Collects commands and releases them as one `ClientUpdate` per interval.
#[derive(Debug)]
pub struct CommandBatcher {
    interval: Duration,
    pending: Vec<Command>,
    last_flush: Option<Instant>,
}

impl CommandBatcher {
    /// A zero interval sends every command on its own.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Vec::new(),
            last_flush: None,
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Returns the batch when the interval has elapsed and there is something to send.
    pub fn poll(&mut self, now: Instant) -> Option<Packet> {
        if self.pending.is_empty() {
            return None;
        }
        let due = self.interval.is_zero()
            || self
                .last_flush
                .map_or(true, |last| now.duration_since(last) >= self.interval);
        if !due {
            return None;
        }
        self.flush(now)
    }

    /// Releases whatever is pending regardless of the interval.
    pub fn flush(&mut self, now: Instant) -> Option<Packet> {
        if self.pending.is_empty() {
            return None;
        }
        self.last_flush = Some(now);
        Some(Packet::ClientUpdate {
            commands: std::mem::take(&mut self.pending),
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
