//! In-process implementations of the host-game collaborator ports.
//!
//! Used by the demo binary and tests; a host game supplies its own.

use async_trait::async_trait;
use dashmap::DashMap;
use villagemind_domain::{EntityId, Position, VillagerBrain};

use crate::infrastructure::ports::{BrainPort, CollaboratorError, ProximityPort};

#[derive(Default)]
pub struct InMemoryBrainStore {
    brains: DashMap<EntityId, VillagerBrain>,
}

impl InMemoryBrainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, brain: VillagerBrain) {
        self.brains.insert(brain.id(), brain);
    }

    pub fn get(&self, id: EntityId) -> Option<VillagerBrain> {
        self.brains.get(&id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl BrainPort for InMemoryBrainStore {
    async fn load_brain(&self, villager: EntityId) -> Result<Option<VillagerBrain>, CollaboratorError> {
        Ok(self.get(villager))
    }

    async fn save_brain(&self, brain: &VillagerBrain) -> Result<(), CollaboratorError> {
        self.insert(brain.clone());
        Ok(())
    }
}

/// Fixed villager positions, queried by straight-line distance.
#[derive(Default)]
pub struct InMemoryProximity {
    positions: DashMap<EntityId, Position>,
}

impl InMemoryProximity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&self, villager: EntityId, position: Position) {
        self.positions.insert(villager, position);
    }
}

#[async_trait]
impl ProximityPort for InMemoryProximity {
    async fn find_nearby(&self, position: Position, radius: f64) -> Vec<EntityId> {
        let mut nearby: Vec<(EntityId, f64)> = self
            .positions
            .iter()
            .map(|entry| (*entry.key(), entry.value().distance_to(&position)))
            .filter(|(_, distance)| *distance <= radius)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby.into_iter().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_brain_is_loaded_back() {
        let store = InMemoryBrainStore::new();
        let brain = VillagerBrain::new(EntityId::new(), "Alder", "farmer");

        store.save_brain(&brain).await.expect("save");

        assert_eq!(store.load_brain(brain.id()).await.expect("load"), Some(brain));
    }

    #[tokio::test]
    async fn unknown_villager_loads_none() {
        let store = InMemoryBrainStore::new();

        assert_eq!(store.load_brain(EntityId::new()).await.expect("load"), None);
    }

    #[tokio::test]
    async fn nearby_is_limited_by_radius_and_sorted() {
        let proximity = InMemoryProximity::new();
        let near = EntityId::new();
        let nearer = EntityId::new();
        let far = EntityId::new();
        proximity.place(near, Position::new(5.0, 0.0, 0.0));
        proximity.place(nearer, Position::new(1.0, 0.0, 0.0));
        proximity.place(far, Position::new(30.0, 0.0, 0.0));

        let found = proximity.find_nearby(Position::new(0.0, 0.0, 0.0), 8.0).await;

        assert_eq!(found, vec![nearer, near]);
    }
}
