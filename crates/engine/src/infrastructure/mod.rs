//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod app_settings;
pub mod clock;
pub mod credentials;
pub mod delivery;
pub mod gateway;
pub mod memory;
pub mod model_registry;
pub mod ports;
pub mod providers;
pub mod rate_limit;
pub mod resilient_llm;
