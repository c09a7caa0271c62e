//! Domain entities.

mod villager_brain;

pub use villager_brain::{Interaction, VillagerBrain, MAX_REMEMBERED_INTERACTIONS};
