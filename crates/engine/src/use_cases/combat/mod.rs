//! Combat use cases.
//!
//! The rule engine lives in the domain crate. This module wraps it with an
//! optional model-backed decision that always falls back to the rules.

mod ai_engine;
mod parser;

pub use ai_engine::{AiCombatEngine, DECISION_CACHE_TTL};
pub use parser::parse_decision;
