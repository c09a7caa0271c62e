//! Trade use cases.

mod pricer;

pub use pricer::{AiTradePricer, PriceQuote, PricingContext};
