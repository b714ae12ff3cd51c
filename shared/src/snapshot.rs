use crate::entity::{Colour, ConnectionId, EntityState, KinematicState, RenderTransform};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entity as seen in a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub velocity: Vec3,
    pub last_acked_sequence: u64,
    pub colour: Colour,
}

impl SnapshotEntity {
    pub fn kinematics(&self) -> KinematicState {
        KinematicState {
            position: self.position,
            front: self.front,
            up: self.up,
            velocity: self.velocity,
        }
    }

    pub fn render_transform(&self) -> RenderTransform {
        RenderTransform {
            position: self.position,
            front: self.front,
            up: self.up,
            colour: self.colour,
        }
    }
}

impl From<&EntityState> for SnapshotEntity {
    fn from(entity: &EntityState) -> Self {
        Self {
            position: entity.kinematics.position,
            front: entity.kinematics.front,
            up: entity.kinematics.up,
            velocity: entity.kinematics.velocity,
            last_acked_sequence: entity.last_acked_sequence,
            colour: entity.colour,
        }
    }
}

/// Authoritative world state at one server timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milliseconds on the server clock.
    pub server_timestamp: u64,
    pub entities: HashMap<ConnectionId, SnapshotEntity>,
}

impl Snapshot {
    pub fn new(server_timestamp: u64) -> Self {
        Self {
            server_timestamp,
            entities: HashMap::new(),
        }
    }

    pub fn from_entities<'a>(
        server_timestamp: u64,
        entities: impl IntoIterator<Item = &'a EntityState>,
    ) -> Self {
        Self {
            server_timestamp,
            entities: entities
                .into_iter()
                .map(|entity| (entity.id, SnapshotEntity::from(entity)))
                .collect(),
        }
    }

    pub fn entity(&self, id: ConnectionId) -> Option<&SnapshotEntity> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
