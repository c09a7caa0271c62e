//! Relationship tracking between a villager and the entities it knows
//!
//! - `RelationshipLevel`: coarse classification per known entity
//! - `RelationshipData`: rapport (trust, friendship) toward the current
//!   counterpart plus the level of every entity this villager has met

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use villagemind_domain::EntityId;

/// How well a villager knows another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLevel {
    /// Openly hostile
    Enemy,
    /// Never met, or nothing notable happened
    #[default]
    Stranger,
    Acquaintance,
    Friend,
    CloseFriend,
    Family,
}

impl RelationshipLevel {
    /// Friends are never treated as combat targets.
    pub fn is_friend(&self) -> bool {
        matches!(
            self,
            RelationshipLevel::Friend | RelationshipLevel::CloseFriend | RelationshipLevel::Family
        )
    }

    /// Minimum loyalty needed before a villager steps in to defend this entity.
    pub fn defend_threshold(&self) -> f32 {
        match self {
            RelationshipLevel::CloseFriend | RelationshipLevel::Family => 0.3,
            RelationshipLevel::Friend => 0.4,
            _ => 0.7,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RelationshipLevel::Enemy => "Enemy",
            RelationshipLevel::Stranger => "Stranger",
            RelationshipLevel::Acquaintance => "Acquaintance",
            RelationshipLevel::Friend => "Friend",
            RelationshipLevel::CloseFriend => "Close Friend",
            RelationshipLevel::Family => "Family",
        }
    }
}

/// Rapport toward a counterpart and levels for every known entity.
///
/// `trust` and `friendship` are always kept in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipData {
    trust: f32,
    friendship: f32,
    levels: HashMap<EntityId, RelationshipLevel>,
}

impl RelationshipData {
    /// Neutral rapport, no known entities.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trust(mut self, trust: f32) -> Self {
        self.trust = signed_unit(trust);
        self
    }

    pub fn with_friendship(mut self, friendship: f32) -> Self {
        self.friendship = signed_unit(friendship);
        self
    }

    pub fn with_level(mut self, entity: EntityId, level: RelationshipLevel) -> Self {
        self.levels.insert(entity, level);
        self
    }

    pub fn trust(&self) -> f32 {
        self.trust
    }

    pub fn friendship(&self) -> f32 {
        self.friendship
    }

    pub fn adjust_trust(&mut self, delta: f32) {
        self.trust = signed_unit(self.trust + delta);
    }

    pub fn adjust_friendship(&mut self, delta: f32) {
        self.friendship = signed_unit(self.friendship + delta);
    }

    /// Level of a known entity, `Stranger` when never recorded.
    pub fn level_of(&self, entity: EntityId) -> RelationshipLevel {
        self.levels.get(&entity).copied().unwrap_or_default()
    }

    pub fn set_level(&mut self, entity: EntityId, level: RelationshipLevel) {
        self.levels.insert(entity, level);
    }

    pub fn is_friend(&self, entity: EntityId) -> bool {
        self.level_of(entity).is_friend()
    }
}

fn signed_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_entities_are_strangers() {
        let data = RelationshipData::new();
        assert_eq!(data.level_of(EntityId::new()), RelationshipLevel::Stranger);
    }

    #[test]
    fn friends_family_and_close_friends_count_as_friends() {
        assert!(RelationshipLevel::Friend.is_friend());
        assert!(RelationshipLevel::CloseFriend.is_friend());
        assert!(RelationshipLevel::Family.is_friend());
        assert!(!RelationshipLevel::Acquaintance.is_friend());
        assert!(!RelationshipLevel::Enemy.is_friend());
    }

    #[test]
    fn rapport_stays_bounded() {
        let mut data = RelationshipData::new().with_trust(0.98);
        data.adjust_trust(0.5);
        data.adjust_friendship(-3.0);

        assert_eq!(data.trust(), 1.0);
        assert_eq!(data.friendship(), -1.0);
    }

    #[test]
    fn closer_relationships_need_less_loyalty_to_defend() {
        assert!(
            RelationshipLevel::Family.defend_threshold()
                < RelationshipLevel::Friend.defend_threshold()
        );
        assert!(
            RelationshipLevel::Friend.defend_threshold()
                < RelationshipLevel::Stranger.defend_threshold()
        );
    }
}
