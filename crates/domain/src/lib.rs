//! VillageMind domain.
//!
//! Pure, synchronous rules for villager behaviour: personality and
//! relationship values, the baseline combat decision engine, and the
//! haggling/negotiation state machine. Nothing in this crate performs I/O.

extern crate self as villagemind_domain;

pub mod combat;
pub mod entities;
pub mod error;
pub mod ids;
pub mod trade;
pub mod value_objects;

pub use combat::{
    Armor, ArmorSlot, CombatAction, CombatDecision, CombatDecisionEngine, CombatSituation,
    Combatant, ThreatAssessment, ThreatLevel, Weapon, WeaponKind, RULE_BASED_CONFIDENCE,
    RULE_BASED_RATIONALE,
};
pub use entities::{Interaction, VillagerBrain};
pub use error::DomainError;
pub use ids::{EntityId, NegotiationId};
pub use trade::{
    HagglingEngine, Negotiation, NegotiationOutcome, NegotiationState, MAX_PRICE_FACTOR,
    MIN_PRICE_FACTOR,
};
pub use value_objects::{
    CombatPersonalityTraits, Mood, Position, RelationshipData, RelationshipLevel, ReputationData,
};
