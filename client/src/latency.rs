//! Artificial latency for testing under a fake ping

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Holds items until `delay` has passed since they were pushed.
///
/// Release order is push order. With a zero delay every item is due
/// immediately.
#[derive(Debug)]
pub struct DelayLine<T> {
    delay: Duration,
    queue: VecDeque<(Instant, T)>,
}

impl<T> DelayLine<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T, now: Instant) {
        self.queue.push_back((now + self.delay, item));
    }

    /// Removes and returns every item whose release time has passed.
    pub fn drain_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some((release_at, _)) = self.queue.front() {
            if *release_at > now {
                break;
            }
            if let Some((_, item)) = self.queue.pop_front() {
                due.push(item);
            }
        }
        due
    }

    /// When the next item becomes due.
    pub fn next_release(&self) -> Option<Instant> {
        self.queue.front().map(|(release_at, _)| *release_at)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
