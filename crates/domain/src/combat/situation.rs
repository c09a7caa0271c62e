//! Snapshot of a fight as seen by one villager.

use serde::{Deserialize, Serialize};
use villagemind_domain::EntityId;

use super::equipment::Weapon;

/// Another participant in a fight, as observed by the deciding villager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub health: f32,
    pub attack_damage: f32,
    /// Distance from the deciding villager, in blocks
    pub distance: f32,
    /// Whether something is currently attacking this combatant
    pub under_attack: bool,
}

impl Combatant {
    pub fn new(id: EntityId, health: f32, attack_damage: f32, distance: f32) -> Self {
        Self {
            id,
            health,
            attack_damage,
            distance,
            under_attack: false,
        }
    }

    pub fn under_attack(mut self) -> Self {
        self.under_attack = true;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// Coarse danger classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    #[default]
    None,
    Low,
    Moderate,
    High,
    Extreme,
}

impl ThreatLevel {
    /// Band a single threat score into a level.
    pub fn from_score(score: f32) -> Self {
        if score > 0.8 {
            ThreatLevel::Extreme
        } else if score > 0.6 {
            ThreatLevel::High
        } else if score > 0.4 {
            ThreatLevel::Moderate
        } else if score > 0.2 {
            ThreatLevel::Low
        } else {
            ThreatLevel::None
        }
    }

    /// One band higher, saturating at `Extreme`.
    pub fn escalate(self) -> Self {
        match self {
            ThreatLevel::None => ThreatLevel::Low,
            ThreatLevel::Low => ThreatLevel::Moderate,
            ThreatLevel::Moderate => ThreatLevel::High,
            ThreatLevel::High | ThreatLevel::Extreme => ThreatLevel::Extreme,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThreatLevel::None => "NONE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Moderate => "MODERATE",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Extreme => "EXTREME",
        }
    }
}

/// Result of weighing every enemy in a situation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub level: ThreatLevel,
    pub primary_threat: Option<EntityId>,
    /// Score of the primary threat, in `[0.0, 1.0]`
    pub score: f32,
}

impl ThreatAssessment {
    pub fn none() -> Self {
        Self {
            level: ThreatLevel::None,
            primary_threat: None,
            score: 0.0,
        }
    }
}

/// Immutable snapshot for one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSituation {
    pub enemies: Vec<Combatant>,
    pub allies: Vec<Combatant>,
    pub threat_level: ThreatLevel,
    pub is_ambush: bool,
    /// Weapons available to the deciding villager
    pub weapons: Vec<Weapon>,
}

impl CombatSituation {
    pub fn new(enemies: Vec<Combatant>, allies: Vec<Combatant>, threat_level: ThreatLevel) -> Self {
        Self {
            enemies,
            allies,
            threat_level,
            is_ambush: false,
            weapons: Vec::new(),
        }
    }

    pub fn ambush(mut self) -> Self {
        self.is_ambush = true;
        self
    }

    pub fn with_weapons(mut self, weapons: Vec<Weapon>) -> Self {
        self.weapons = weapons;
        self
    }

    pub fn is_enemy(&self, id: EntityId) -> bool {
        self.enemies.iter().any(|enemy| enemy.id == id)
    }

    pub fn living_enemies(&self) -> impl Iterator<Item = &Combatant> {
        self.enemies.iter().filter(|enemy| enemy.is_alive())
    }
}
