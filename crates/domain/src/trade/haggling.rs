//! Relationship-weighted pricing.

use villagemind_domain::{DomainError, RelationshipData, ReputationData};

const TRUST_WEIGHT: f64 = 0.3;
const FRIENDSHIP_WEIGHT: f64 = 0.2;
const REPUTATION_WEIGHT: f64 = 0.25;

/// Lowest price, as a fraction of the base price.
pub const MIN_PRICE_FACTOR: f64 = 0.1;
/// Highest price, as a multiple of the base price.
pub const MAX_PRICE_FACTOR: f64 = 2.0;

const SUCCESS_TRUST_GAIN: f32 = 0.05;
const SUCCESS_FRIENDSHIP_GAIN: f32 = 0.03;
const FAILURE_TRUST_LOSS: f32 = -0.03;

/// Deterministic price function over rapport and reputation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HagglingEngine;

impl HagglingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fair price for a counterpart: trust, friendship and reputation each
    /// discount (or, when negative, mark up) the base price.
    ///
    /// The result always lies in `[0.1 * base, 2.0 * base]`.
    pub fn calculate_price(
        &self,
        base_price: f64,
        relationship: &RelationshipData,
        reputation: &ReputationData,
    ) -> Result<f64, DomainError> {
        validate_base_price(base_price)?;

        let multiplier = 1.0
            - TRUST_WEIGHT * f64::from(relationship.trust())
            - FRIENDSHIP_WEIGHT * f64::from(relationship.friendship())
            - REPUTATION_WEIGHT * f64::from(reputation.score());

        Ok(self.clamp_price(base_price, base_price * multiplier))
    }

    /// Clamp any proposed price into the allowed band around `base_price`.
    pub fn clamp_price(&self, base_price: f64, price: f64) -> f64 {
        let floor = base_price * MIN_PRICE_FACTOR;
        let ceiling = base_price * MAX_PRICE_FACTOR;
        if price.is_nan() {
            return base_price;
        }
        price.clamp(floor, ceiling)
    }

    /// Nudge rapport after a negotiation round.
    pub fn update_rapport_after_round(&self, relationship: &mut RelationshipData, succeeded: bool) {
        if succeeded {
            relationship.adjust_trust(SUCCESS_TRUST_GAIN);
            relationship.adjust_friendship(SUCCESS_FRIENDSHIP_GAIN);
        } else {
            relationship.adjust_trust(FAILURE_TRUST_LOSS);
        }
    }
}

pub(crate) fn validate_base_price(base_price: f64) -> Result<(), DomainError> {
    if base_price.is_finite() && base_price > 0.0 {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "Base price must be positive, got {base_price}"
        )))
    }
}
