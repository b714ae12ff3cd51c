//! Server reconciliation for the locally predicted entity

use log::debug;
use shared::{Command, KinematicState, MovementPolicy, SnapshotEntity};
use std::collections::VecDeque;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOutcome {
    /// Acknowledged commands dropped from the history.
    pub pruned: usize,
    /// Unacknowledged commands replayed on top of the server state.
    pub replayed: usize,
    /// Distance between the prediction before and after the pass.
    pub correction: f32,
}

/// Brings `state` back in line with the server.
///
/// Runs in this order:
/// 1. overwrite `state` with the authoritative transform (no smoothing)
/// 2. drop every pending command with sequence <= the acknowledged one
/// 3. replay the remaining commands, oldest first, with the same policy and `dt`
///    used when they were first predicted
pub fn reconcile(
    state: &mut KinematicState,
    authoritative: &SnapshotEntity,
    history: &mut VecDeque<Command>,
    policy: MovementPolicy,
    dt: f32,
) -> ReconcileOutcome {
    let predicted_position = state.position;
    *state = authoritative.kinematics();

    let acked = authoritative.last_acked_sequence;
    let before = history.len();
    history.retain(|command| command.sequence > acked);
    let pruned = before - history.len();

    for command in history.iter() {
        *state = policy.simulate(state, command, dt);
    }

    let correction = predicted_position.distance(state.position);
    if correction > 1e-4 {
        debug!(
            "Reconciled to ack {}: pruned {}, replayed {}, corrected {:.4}",
            acked,
            pruned,
            history.len(),
            correction
        );
    }

    ReconcileOutcome {
        pruned,
        replayed: history.len(),
        correction,
    }
}
