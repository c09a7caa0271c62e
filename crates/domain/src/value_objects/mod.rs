//! Value objects: small immutable-by-default values with bounded ranges.

mod mood;
mod personality;
mod position;
mod relationship;
mod reputation;

pub use mood::Mood;
pub use personality::CombatPersonalityTraits;
pub use position::Position;
pub use relationship::{RelationshipData, RelationshipLevel};
pub use reputation::ReputationData;
