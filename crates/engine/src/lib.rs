//! VillageMind engine library.
//!
//! Asynchronous orchestration around the pure rules in `villagemind-domain`.
//!
//! ## Structure
//!
//! - `infrastructure/` - Provider gateway, retry orchestrator, registry and
//!   other port implementations
//! - `use_cases/` - Conversation routing, AI combat and AI trade pricing
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::{App, Collaborators};
