//! Combat model and the rule-based decision engine.
//!
//! The engine here is deterministic and synchronous. The AI-assisted engine
//! in the engine crate wraps it and falls back to it whenever the remote
//! model is slow, wrong or unavailable.

mod decision;
mod engine;
mod equipment;
mod situation;

pub use decision::{CombatAction, CombatDecision, RULE_BASED_CONFIDENCE, RULE_BASED_RATIONALE};
pub use engine::CombatDecisionEngine;
pub use equipment::{Armor, ArmorSlot, Weapon, WeaponKind};
pub use situation::{CombatSituation, Combatant, ThreatAssessment, ThreatLevel};
