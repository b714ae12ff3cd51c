//! Authoritative entity table keyed by connection identity

use log::info;
use rand::Rng;
use shared::{Colour, ConnectionId, EntityState};
use std::collections::HashMap;

/// Owns one [`EntityState`] per connected client.
///
/// Entities are inserted on connect and removed on disconnect; only the
/// simulation step mutates them in between.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<ConnectionId, EntityState>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    /// Creates the entity for a new connection with the default transform.
    ///
    /// An existing entity under the same id is replaced.
    pub fn insert(&mut self, id: ConnectionId, colour: Colour) -> &EntityState {
        let entity = EntityState::new(id, colour);
        info!(
            "Added entity {} with colour ({:.2}, {:.2}, {:.2})",
            id, colour.r, colour.g, colour.b
        );
        self.entities.insert(id, entity);
        &self.entities[&id]
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<EntityState> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            info!("Removed entity {}", id);
        }
        removed
    }

    pub fn get(&self, id: ConnectionId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Picks a random, reasonably bright colour.
pub fn random_colour<R: Rng + ?Sized>(rng: &mut R) -> Colour {
    Colour::new(
        rng.gen_range(0.2..=1.0),
        rng.gen_range(0.2..=1.0),
        rng.gen_range(0.2..=1.0),
    )
}
