//! Snapshot buffering and delayed interpolation of remote entities

use log::debug;
use shared::math::lerp;
use shared::{ConnectionId, RenderTransform, Snapshot};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 120;
pub const DEFAULT_RENDER_DELAY_MS: u64 = 200;

/// Bounded ring of received snapshots, oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// All buffered snapshots as one contiguous window, oldest first.
    pub fn window(&mut self) -> &[Snapshot] {
        self.snapshots.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}

/// Transforms for every remote entity at `target` server time.
///
/// Looks for the most recent adjacent pair with
/// `from.server_timestamp <= target <= to.server_timestamp` and blends
/// between them. When no pair brackets the target, the newest snapshot is
/// returned verbatim. `exclude` (our own entity) never appears in the result.
pub fn interpolate(
    exclude: Option<ConnectionId>,
    window: &[Snapshot],
    target: u64,
) -> HashMap<ConnectionId, RenderTransform> {
    let Some(latest) = window.last() else {
        return HashMap::new();
    };

    for pair in window.windows(2).rev() {
        let (from, to) = (&pair[0], &pair[1]);
        if from.server_timestamp <= target && target <= to.server_timestamp {
            return blend(exclude, from, to, target);
        }
    }

    debug!(
        "No snapshot pair brackets {} ({} buffered), using latest at {}",
        target,
        window.len(),
        latest.server_timestamp
    );
    latest
        .entities
        .iter()
        .filter(|(id, _)| Some(**id) != exclude)
        .map(|(id, entity)| (*id, entity.render_transform()))
        .collect()
}

/// Fraction of the way from `from` to `to` that `target` lies, in `[0, 1]`.
pub fn interpolation_factor(from: u64, to: u64, target: u64) -> f32 {
    if to <= from {
        return 1.0;
    }
    let factor = (target.saturating_sub(from)) as f64 / (to - from) as f64;
    factor.clamp(0.0, 1.0) as f32
}

fn blend(
    exclude: Option<ConnectionId>,
    from: &Snapshot,
    to: &Snapshot,
    target: u64,
) -> HashMap<ConnectionId, RenderTransform> {
    let factor = interpolation_factor(from.server_timestamp, to.server_timestamp, target);

    to.entities
        .iter()
        .filter(|(id, _)| Some(**id) != exclude)
        .filter_map(|(id, next)| {
            let previous = from.entities.get(id)?;
            Some((
                *id,
                RenderTransform {
                    position: lerp(previous.position, next.position, factor),
                    front: lerp(previous.front, next.front, factor),
                    up: lerp(previous.up, next.up, factor),
                    colour: next.colour,
                },
            ))
        })
        .collect()
}
