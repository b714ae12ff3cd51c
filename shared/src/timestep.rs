//! Fixed-step accumulator driving the simulation independently of host jitter

use log::warn;
use std::time::Duration;

/// Highest simulation rate accepted; higher requests are clamped to it.
pub const MAX_TICK_RATE: u32 = 1000;

/// Converts wall-clock elapsed time into a whole number of fixed steps.
///
/// Elapsed time is accumulated into `lag`; each call reports how many steps
/// fit and keeps the remainder for the next call, so the total step count
/// only depends on the total elapsed time and not on how it was sliced.
/// Lag above `max_lag` is discarded to avoid a catch-up spiral after a stall.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    max_lag: Duration,
    lag: Duration,
    total_steps: u64,
}

impl FixedTimestep {
    /// A zero `step` is raised to one nanosecond.
    pub fn new(step: Duration, max_lag: Duration) -> Self {
        let step = step.max(Duration::from_nanos(1));
        Self {
            step,
            max_lag: max_lag.max(step),
            lag: Duration::ZERO,
            total_steps: 0,
        }
    }

    pub fn from_rate(ticks_per_second: u32, max_lag: Duration) -> Self {
        let rate = ticks_per_second.clamp(1, MAX_TICK_RATE);
        Self::new(Duration::from_nanos(1_000_000_000 / u64::from(rate)), max_lag)
    }

    /// Adds `elapsed` to the accumulator and returns the steps now due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.lag += elapsed;

        if self.lag > self.max_lag {
            warn!(
                "Accumulated lag {:?} exceeds {:?}, discarding {:?}",
                self.lag,
                self.max_lag,
                self.lag - self.max_lag
            );
            self.lag = self.max_lag;
        }

        let mut steps = 0;
        while self.lag >= self.step {
            self.lag -= self.step;
            steps += 1;
        }

        self.total_steps += u64::from(steps);
        steps
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn max_lag(&self) -> Duration {
        self.max_lag
    }

    pub fn lag(&self) -> Duration {
        self.lag
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}
