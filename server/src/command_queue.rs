//! Per-connection command buffering and drain policies
//!
//! Network tasks only ever append here; the simulation step decides how many
//! commands each connection gets per tick according to [`DrainPolicy`].

use log::warn;
use shared::{Command, ConnectionId};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// How many pending commands a connection gets per simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Pop exactly the oldest command. Lossless when clients send one
    /// command per tick.
    #[default]
    OnePerTick,
    /// Apply every pending command in FIFO order.
    DrainAll,
    /// Apply only the oldest command and consume the rest unapplied.
    CoalesceFirst,
}

impl fmt::Display for DrainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainPolicy::OnePerTick => write!(f, "one-per-tick"),
            DrainPolicy::DrainAll => write!(f, "drain-all"),
            DrainPolicy::CoalesceFirst => write!(f, "coalesce-first"),
        }
    }
}

impl FromStr for DrainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "one-per-tick" | "fifo" => Ok(DrainPolicy::OnePerTick),
            "drain-all" => Ok(DrainPolicy::DrainAll),
            "coalesce-first" | "coalesce" => Ok(DrainPolicy::CoalesceFirst),
            other => Err(format!("unknown drain policy '{}'", other)),
        }
    }
}

/// Result of draining one connection's queue for a tick.
#[derive(Debug, Default, PartialEq)]
pub struct Drained {
    /// Commands to run through the movement model, oldest first.
    pub to_apply: Vec<Command>,
    /// Highest sequence number removed from the queue without being applied.
    pub consumed_unapplied: Option<u64>,
}

/// Two seconds of input at the default tick rate.
pub const DEFAULT_MAX_PENDING: usize = 120;

#[derive(Debug)]
pub struct CommandQueue {
    queues: HashMap<ConnectionId, VecDeque<Command>>,
    max_pending: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl CommandQueue {
    /// `max_pending` bounds each connection's backlog; at least one command is kept.
    pub fn new(max_pending: usize) -> Self {
        Self {
            queues: HashMap::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Appends a command, evicting the oldest ones once the backlog is full.
    ///
    /// Returns how many commands were evicted.
    pub fn enqueue(&mut self, id: ConnectionId, command: Command) -> usize {
        let queue = self.queues.entry(id).or_default();
        queue.push_back(command);

        let excess = queue.len().saturating_sub(self.max_pending);
        if excess > 0 {
            queue.drain(..excess);
            warn!(
                "Command backlog for {} exceeded {}, dropped {} oldest",
                id, self.max_pending, excess
            );
        }
        excess
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn drain_for(&mut self, id: ConnectionId, policy: DrainPolicy) -> Drained {
        let Some(queue) = self.queues.get_mut(&id) else {
            return Drained::default();
        };

        match policy {
            DrainPolicy::OnePerTick => Drained {
                to_apply: queue.pop_front().into_iter().collect(),
                consumed_unapplied: None,
            },
            DrainPolicy::DrainAll => Drained {
                to_apply: queue.drain(..).collect(),
                consumed_unapplied: None,
            },
            DrainPolicy::CoalesceFirst => {
                let first = queue.pop_front();
                let consumed_unapplied = queue.drain(..).map(|c| c.sequence).max();
                Drained {
                    to_apply: first.into_iter().collect(),
                    consumed_unapplied,
                }
            }
        }
    }

    /// Drops everything queued for `id`, returning how many commands were lost.
    pub fn discard(&mut self, id: ConnectionId) -> usize {
        self.queues.remove(&id).map_or(0, |queue| queue.len())
    }

    /// Connection ids with a queue, sorted for a stable processing order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.queues.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn pending_for(&self, id: ConnectionId) -> usize {
        self.queues.get(&id).map_or(0, |queue| queue.len())
    }

    pub fn total_pending(&self) -> usize {
        self.queues.values().map(|queue| queue.len()).sum()
    }
}
