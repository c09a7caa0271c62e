//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Provider HTTP calls (`LlmGateway`) and the retried call path (`LlmPort`)
//! - Villager state owned by the host game (`BrainPort`, `ProximityPort`)
//! - Reply delivery back into the game (`DeliveryPort`)
//! - Clock (for testing)

mod error;
mod external;
mod testing;
pub mod types;

// =============================================================================
// Provider Types
// =============================================================================
pub use types::{CapabilityTier, Provider, ProviderDescriptor, WireFormat};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    BrainPort, ConversationRequest, ConversationRequestBuilder, ConversationResponse,
    DeliveryPort, Initiator, LlmGateway, LlmPort, ProviderProfile, ProximityPort,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{
    MockBrainPort, MockDeliveryPort, MockLlmGateway, MockLlmPort, MockProximityPort,
};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{CollaboratorError, LlmError, RequestError};
