//! Model-assisted trade pricing over the deterministic haggling price.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use villagemind_domain::{
    CombatPersonalityTraits, DomainError, HagglingEngine, RelationshipData, ReputationData,
    MAX_PRICE_FACTOR, MIN_PRICE_FACTOR,
};

use crate::infrastructure::ports::{LlmPort, ProviderProfile};

const PRICING_MAX_TOKENS: u32 = 100;
const PRICING_TEMPERATURE: f32 = 0.7;
/// Upper bound on waiting for a price suggestion.
pub const PRICING_TIMEOUT: Duration = Duration::from_secs(5);

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)price:\s*(\d+(?:\.\d+)?)").expect("valid regex"));

/// A price and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    /// True when the deterministic price was used instead of a model answer
    pub is_fallback: bool,
}

/// Everything the pricer looks at for one quote.
#[derive(Debug, Clone)]
pub struct PricingContext<'a> {
    pub item_name: &'a str,
    pub base_price: f64,
    pub relationship: &'a RelationshipData,
    pub reputation: &'a ReputationData,
    pub trader: &'a CombatPersonalityTraits,
    pub round: u32,
}

pub struct AiTradePricer {
    llm: Arc<dyn LlmPort>,
    profile: ProviderProfile,
    haggling: HagglingEngine,
}

impl AiTradePricer {
    pub fn new(llm: Arc<dyn LlmPort>, profile: ProviderProfile) -> Self {
        Self {
            llm,
            profile,
            haggling: HagglingEngine::new(),
        }
    }

    /// Only strained or drawn-out trades are worth a model call.
    pub fn should_use_ai(&self, ctx: &PricingContext<'_>) -> bool {
        ctx.round > 2
            || ctx.relationship.trust() < 0.3
            || ctx.relationship.friendship() < 0.3
            || ctx.reputation.score().abs() > 0.5
    }

    /// Quote a price for `ctx.item_name`.
    ///
    /// Errors only for an invalid base price. Any model failure, or an
    /// answer outside `[0.1, 2.0] x base`, falls back to the haggling price.
    pub async fn quote(&self, ctx: &PricingContext<'_>) -> Result<PriceQuote, DomainError> {
        let fallback = self
            .haggling
            .calculate_price(ctx.base_price, ctx.relationship, ctx.reputation)?;
        let fallback = PriceQuote {
            price: fallback,
            is_fallback: true,
        };

        if !self.should_use_ai(ctx) {
            return Ok(fallback);
        }

        let Some(suggested) = self.suggest_price(ctx).await else {
            tracing::warn!(item = %ctx.item_name, "AI pricing failed, using fallback");
            return Ok(fallback);
        };

        let floor = ctx.base_price * MIN_PRICE_FACTOR;
        let ceiling = ctx.base_price * MAX_PRICE_FACTOR;
        if !(floor..=ceiling).contains(&suggested) {
            tracing::warn!(
                item = %ctx.item_name,
                suggested,
                base_price = ctx.base_price,
                "AI price out of bounds, using fallback"
            );
            return Ok(fallback);
        }

        Ok(PriceQuote {
            price: self.haggling.clamp_price(ctx.base_price, suggested),
            is_fallback: false,
        })
    }

    async fn suggest_price(&self, ctx: &PricingContext<'_>) -> Option<f64> {
        let request = self
            .profile
            .request(build_pricing_prompt(ctx))
            .max_tokens(PRICING_MAX_TOKENS)
            .temperature(PRICING_TEMPERATURE)
            .timeout(PRICING_TIMEOUT.min(self.profile.timeout))
            .build()
            .ok()?;

        let response = tokio::time::timeout(PRICING_TIMEOUT, self.llm.generate(request))
            .await
            .ok()?;
        parse_price(response.usable_text()?)
    }
}

fn parse_price(reply: &str) -> Option<f64> {
    PRICE_RE
        .captures(reply)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
        .filter(|price: &f64| *price > 0.0)
}

fn build_pricing_prompt(ctx: &PricingContext<'_>) -> String {
    let mut prompt = String::from("You are a villager trader setting a price.\n\n");
    let _ = writeln!(prompt, "Item: {}", ctx.item_name);
    let _ = writeln!(prompt, "Base price: {:.2}", ctx.base_price);
    let _ = writeln!(prompt, "Negotiation round: {}", ctx.round);
    let _ = writeln!(prompt, "Trust in customer: {:.2}", ctx.relationship.trust());
    let _ = writeln!(prompt, "Friendship with customer: {:.2}", ctx.relationship.friendship());
    let _ = writeln!(prompt, "Customer reputation: {:.2}\n", ctx.reputation.score());

    let temperament = if ctx.trader.aggression() > 0.7 {
        "You drive a hard bargain."
    } else if ctx.trader.self_preservation() > 0.7 {
        "You are cautious and avoid risky deals."
    } else if ctx.trader.loyalty() > 0.7 {
        "You reward loyal customers."
    } else {
        "You are a fair trader."
    };
    let _ = writeln!(prompt, "{}\n", temperament);

    let _ = writeln!(
        prompt,
        "Stay between {:.2} and {:.2}.",
        ctx.base_price * MIN_PRICE_FACTOR,
        ctx.base_price * MAX_PRICE_FACTOR
    );
    prompt.push_str("Answer as: Price: <number>");
    prompt
}
