//! Conversation use cases.
//!
//! A player (or another entity) says something to a villager. The flow is:
//! 1. The router builds a prompt from the villager's brain
//! 2. The retry orchestrator asks the model for a reply
//! 3. On a usable reply the villager remembers the exchange and answers
//! 4. Otherwise nothing happens; the caller may simply try again

mod prompt;
mod router;

pub use prompt::{build_prompt, format_reply, CONVERSATION_MAX_TOKENS, CONVERSATION_TEMPERATURE};
pub use router::{ConversationRouter, TurnOutcome, TurnTicket, CONVERSATION_RANGE};
