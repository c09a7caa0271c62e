use serde::{Deserialize, Serialize};
use std::fmt;
use villagemind_domain::EntityId;

/// Confidence assigned to every rule-based decision.
pub const RULE_BASED_CONFIDENCE: f32 = 0.5;
/// Rationale attached to every rule-based decision.
pub const RULE_BASED_RATIONALE: &str = "Rule-based decision";

/// What a villager does this decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombatAction {
    Attack,
    Defend,
    Flee,
    Negotiate,
}

impl CombatAction {
    pub fn name(&self) -> &'static str {
        match self {
            CombatAction::Attack => "ATTACK",
            CombatAction::Defend => "DEFEND",
            CombatAction::Flee => "FLEE",
            CombatAction::Negotiate => "NEGOTIATE",
        }
    }
}

impl fmt::Display for CombatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CombatAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ATTACK" => Ok(CombatAction::Attack),
            "DEFEND" => Ok(CombatAction::Defend),
            "FLEE" | "RETREAT" => Ok(CombatAction::Flee),
            "NEGOTIATE" => Ok(CombatAction::Negotiate),
            _ => Err(format!("Unknown combat action: {}", s)),
        }
    }
}

/// A decided combat action, from either the rule engine or a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatDecision {
    pub action: CombatAction,
    /// Targets in priority order
    pub target_ids: Vec<EntityId>,
    /// Preferred weapon or item, if any
    pub item_hint: Option<String>,
    pub rationale: String,
    confidence: f32,
    /// True when this decision replaced a failed or invalid AI answer
    pub is_fallback: bool,
}

impl CombatDecision {
    pub fn new(action: CombatAction) -> Self {
        Self {
            action,
            target_ids: Vec::new(),
            item_hint: None,
            rationale: String::new(),
            confidence: RULE_BASED_CONFIDENCE,
            is_fallback: false,
        }
    }

    pub fn with_targets(mut self, targets: Vec<EntityId>) -> Self {
        self.target_ids = targets;
        self
    }

    pub fn with_item_hint(mut self, item: impl Into<String>) -> Self {
        self.item_hint = Some(item.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    /// Mark this decision as a substitute for an AI answer.
    pub fn into_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Structural validity: an attack must name at least one target.
    pub fn is_valid(&self) -> bool {
        self.action != CombatAction::Attack || !self.target_ids.is_empty()
    }
}
