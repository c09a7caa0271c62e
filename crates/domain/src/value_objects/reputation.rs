use serde::{Deserialize, Serialize};

/// Reputation gained for a completed trade.
pub const TRADE_SUCCESS_REPUTATION: f32 = 0.05;
/// Reputation lost when a trade falls through.
pub const TRADE_FAILURE_REPUTATION: f32 = -0.02;

/// A single reputation score in `[-1.0, 1.0]`, evolving with trade outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReputationData {
    score: f32,
}

impl ReputationData {
    pub fn new(score: f32) -> Self {
        let mut reputation = Self::default();
        reputation.adjust(score);
        reputation
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn adjust(&mut self, delta: f32) {
        let next = self.score + delta;
        self.score = if next.is_nan() { 0.0 } else { next.clamp(-1.0, 1.0) };
    }

    pub fn record_trade(&mut self, succeeded: bool) {
        if succeeded {
            self.adjust(TRADE_SUCCESS_REPUTATION);
        } else {
            self.adjust(TRADE_FAILURE_REPUTATION);
        }
    }
}
