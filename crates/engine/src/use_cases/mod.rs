//! Use cases - decision and conversation orchestration.
//!
//! Each module wires domain rules to the language-model port. All of them
//! degrade to deterministic behaviour when the model is unavailable.

pub mod combat;
pub mod conversation;
pub mod trade;

pub use combat::AiCombatEngine;
pub use conversation::{ConversationRouter, TurnOutcome, TurnTicket};
pub use trade::{AiTradePricer, PriceQuote, PricingContext};
