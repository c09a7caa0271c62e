//! Turn-based price negotiation.
//!
//! A negotiation lives for a single trade session:
//!
//! ```text
//! InitialOffer --make_offer--> Completed | Failed | CounterOffer
//! CounterOffer --make_offer / accept_counter_offer / reject_counter_offer--> ...
//! ```
//!
//! Completion and failure both feed back into the counterpart's reputation
//! and the trader's rapport with them.

use serde::{Deserialize, Serialize};
use villagemind_domain::{
    CombatPersonalityTraits, DomainError, NegotiationId, RelationshipData, ReputationData,
};

use super::haggling::{validate_base_price, HagglingEngine, MAX_PRICE_FACTOR};

const MIN_ROUNDS: u32 = 3;
/// Extra rounds a fully stubborn trader will sit through.
const STUBBORN_EXTRA_ROUNDS: f32 = 4.0;
/// In the last round, anything at or above this share of the fair price is taken.
const FINAL_ROUND_ACCEPT_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationState {
    InitialOffer,
    CounterOffer,
    Completed,
    Failed,
}

impl NegotiationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Completed | NegotiationState::Failed)
    }
}

/// What the trader answered to the latest move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NegotiationOutcome {
    Accepted { price: f64 },
    Rejected,
    CounterOffer { price: f64 },
}

/// A single trade session between a trader and a counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    id: NegotiationId,
    base_price: f64,
    fair_price: f64,
    current_round: u32,
    max_rounds: u32,
    state: NegotiationState,
    trader: CombatPersonalityTraits,
    counterpart: CombatPersonalityTraits,
    relationship: RelationshipData,
    reputation: ReputationData,
    counter_price: Option<f64>,
    agreed_price: Option<f64>,
}

impl Negotiation {
    /// Open a negotiation. Fails when `base_price` is not positive.
    pub fn new(
        base_price: f64,
        trader: CombatPersonalityTraits,
        counterpart: CombatPersonalityTraits,
        relationship: RelationshipData,
        reputation: ReputationData,
    ) -> Result<Self, DomainError> {
        validate_base_price(base_price)?;
        let fair_price = HagglingEngine::new().calculate_price(base_price, &relationship, &reputation)?;
        let max_rounds = MIN_ROUNDS + (STUBBORN_EXTRA_ROUNDS * trader.stubbornness()).round() as u32;

        Ok(Self {
            id: NegotiationId::new(),
            base_price,
            fair_price,
            current_round: 0,
            max_rounds,
            state: NegotiationState::InitialOffer,
            trader,
            counterpart,
            relationship,
            reputation,
            counter_price: None,
            agreed_price: None,
        })
    }

    pub fn id(&self) -> NegotiationId {
        self.id
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Relationship-adjusted price the trader considers fair.
    pub fn fair_price(&self) -> f64 {
        self.fair_price
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == NegotiationState::Completed
    }

    pub fn counter_price(&self) -> Option<f64> {
        self.counter_price
    }

    pub fn agreed_price(&self) -> Option<f64> {
        self.agreed_price
    }

    pub fn relationship(&self) -> &RelationshipData {
        &self.relationship
    }

    pub fn reputation(&self) -> &ReputationData {
        &self.reputation
    }

    /// The counterpart proposes `price`.
    pub fn make_offer(&mut self, price: f64) -> Result<NegotiationOutcome, DomainError> {
        if !matches!(
            self.state,
            NegotiationState::InitialOffer | NegotiationState::CounterOffer
        ) {
            return Err(DomainError::invalid_transition(format!(
                "Cannot make an offer in state {:?}",
                self.state
            )));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(DomainError::validation(format!(
                "Offer must be positive, got {price}"
            )));
        }

        self.current_round += 1;
        let ratio = price / self.fair_price;

        if self.current_round >= self.max_rounds {
            return Ok(if ratio >= FINAL_ROUND_ACCEPT_RATIO {
                self.complete(price)
            } else {
                self.fail()
            });
        }

        if ratio >= self.acceptance_ratio() {
            Ok(self.complete(price))
        } else if ratio < self.rejection_ratio() {
            Ok(self.fail())
        } else {
            let counter = self.opening_counter(price);
            self.counter_price = Some(counter);
            self.state = NegotiationState::CounterOffer;
            Ok(NegotiationOutcome::CounterOffer { price: counter })
        }
    }

    /// The counterpart takes the trader's standing counter-offer.
    pub fn accept_counter_offer(&mut self) -> Result<NegotiationOutcome, DomainError> {
        let counter = self.standing_counter("accept")?;
        Ok(self.complete(counter))
    }

    /// The counterpart turns down the standing counter-offer. The trader
    /// concedes a little, or walks away once out of rounds.
    pub fn reject_counter_offer(&mut self) -> Result<NegotiationOutcome, DomainError> {
        let counter = self.standing_counter("reject")?;

        if self.current_round + 1 >= self.max_rounds {
            return Ok(self.fail());
        }

        self.current_round += 1;
        let concession = 0.97 + 0.02 * f64::from(self.trader.stubbornness());
        let floor = self.fair_price * self.rejection_ratio();
        let next = round_cents((counter * concession).max(floor));
        self.counter_price = Some(next);
        Ok(NegotiationOutcome::CounterOffer { price: next })
    }

    /// Offers at or above this share of the fair price are accepted outright.
    fn acceptance_ratio(&self) -> f64 {
        let trust_bonus = 0.05 * f64::from(self.relationship.trust().max(0.0));
        0.98 - 0.1 * f64::from(self.trader.courage()) - trust_bonus
            + 0.05 * f64::from(self.counterpart.aggression())
    }

    /// Offers below this share of the fair price end the negotiation.
    fn rejection_ratio(&self) -> f64 {
        0.6 + 0.2 * f64::from(self.trader.self_preservation())
    }

    /// Meet the offer part way toward the trader's asking price; stubborn
    /// traders move less.
    fn opening_counter(&self, offer: f64) -> f64 {
        let asking = (self.fair_price * (1.0 + 0.1 * f64::from(self.trader.aggression())))
            .min(self.base_price * MAX_PRICE_FACTOR);
        let hold = 0.5 + 0.4 * f64::from(self.trader.stubbornness());
        round_cents((offer + (asking - offer) * hold).max(offer))
    }

    fn standing_counter(&self, verb: &str) -> Result<f64, DomainError> {
        match (self.state, self.counter_price) {
            (NegotiationState::CounterOffer, Some(counter)) => Ok(counter),
            _ => Err(DomainError::invalid_transition(format!(
                "Cannot {verb} a counter-offer in state {:?}",
                self.state
            ))),
        }
    }

    fn complete(&mut self, price: f64) -> NegotiationOutcome {
        self.state = NegotiationState::Completed;
        self.agreed_price = Some(price);
        self.reputation.record_trade(true);
        HagglingEngine::new().update_rapport_after_round(&mut self.relationship, true);
        NegotiationOutcome::Accepted { price }
    }

    fn fail(&mut self) -> NegotiationOutcome {
        self.state = NegotiationState::Failed;
        self.reputation.record_trade(false);
        HagglingEngine::new().update_rapport_after_round(&mut self.relationship, false);
        NegotiationOutcome::Rejected
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
