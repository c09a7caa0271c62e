//! Price calculation and turn-based negotiation between villagers and players.

mod haggling;
mod negotiation;

pub use haggling::{HagglingEngine, MAX_PRICE_FACTOR, MIN_PRICE_FACTOR};
pub use negotiation::{Negotiation, NegotiationOutcome, NegotiationState};
