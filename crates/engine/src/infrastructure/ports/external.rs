//! External service port traits (providers, villager state, delivery).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use villagemind_domain::{EntityId, Position, VillagerBrain};

use super::error::{CollaboratorError, LlmError, RequestError};
use super::types::Provider;

// =============================================================================
// Conversation Request/Response
// =============================================================================

const DEFAULT_MAX_TOKENS: u32 = 150;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single prompt for a single provider. Immutable once built.
#[derive(Clone, PartialEq)]
pub struct ConversationRequest {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    provider: Provider,
    credential: String,
    model: Option<String>,
}

impl ConversationRequest {
    pub fn builder(provider: Provider, prompt: impl Into<String>) -> ConversationRequestBuilder {
        ConversationRequestBuilder {
            prompt: prompt.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
            provider,
            credential: String::new(),
            model: None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Overall time budget, retries included.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Requested model, or the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

impl fmt::Debug for ConversationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationRequest")
            .field("provider", &self.provider)
            .field("model", &self.model())
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("prompt_len", &self.prompt.len())
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Builder validating the request constraints on `build()`.
#[derive(Clone)]
pub struct ConversationRequestBuilder {
    prompt: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    provider: Provider,
    credential: String,
    model: Option<String>,
}

impl ConversationRequestBuilder {
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn build(self) -> Result<ConversationRequest, RequestError> {
        if self.prompt.trim().is_empty() {
            return Err(RequestError::EmptyPrompt);
        }
        if self.max_tokens == 0 {
            return Err(RequestError::InvalidMaxTokens);
        }
        let max = self.provider.max_temperature();
        if !(0.0..=max).contains(&self.temperature) {
            return Err(RequestError::TemperatureOutOfRange {
                value: self.temperature,
                max,
                provider: self.provider,
            });
        }
        if self.timeout.is_zero() {
            return Err(RequestError::InvalidTimeout);
        }

        Ok(ConversationRequest {
            prompt: self.prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            provider: self.provider,
            credential: self.credential,
            model: self.model,
        })
    }
}

/// Terminal outcome of a provider call. Never absent.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationResponse {
    Success {
        text: String,
        tokens_used: u32,
        latency_ms: u64,
    },
    Failure(LlmError),
}

impl ConversationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversationResponse::Success { .. })
    }

    /// Trimmed reply text, `None` on failure or when the reply is blank.
    pub fn usable_text(&self) -> Option<&str> {
        match self {
            ConversationResponse::Success { text, .. } => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            ConversationResponse::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&LlmError> {
        match self {
            ConversationResponse::Failure(error) => Some(error),
            ConversationResponse::Success { .. } => None,
        }
    }
}

impl From<LlmError> for ConversationResponse {
    fn from(error: LlmError) -> Self {
        ConversationResponse::Failure(error)
    }
}

/// Which provider, credential and model a use case talks to.
#[derive(Clone)]
pub struct ProviderProfile {
    pub provider: Provider,
    pub credential: String,
    pub model: Option<String>,
    pub timeout: Duration,
}

impl ProviderProfile {
    pub fn new(provider: Provider, credential: impl Into<String>) -> Self {
        Self {
            provider,
            credential: credential.into(),
            model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start a request pre-filled with this profile.
    pub fn request(&self, prompt: impl Into<String>) -> ConversationRequestBuilder {
        ConversationRequest::builder(self.provider, prompt)
            .credential(self.credential.clone())
            .model(self.model.clone())
            .timeout(self.timeout)
    }
}

impl fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Provider Ports
// =============================================================================

/// One HTTP round trip per call, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// List model identifiers advertised by the provider.
    async fn fetch_models(&self, provider: Provider, credential: &str) -> Result<Vec<String>, LlmError>;

    /// Ask the provider whether `credential` is accepted.
    async fn validate_key(&self, provider: Provider, credential: &str) -> bool;

    async fn send(&self, request: &ConversationRequest) -> ConversationResponse;
}

/// Retried, bounded-time completion. Always returns a terminal response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, request: ConversationRequest) -> ConversationResponse;
}

// =============================================================================
// Host-Game Collaborators
// =============================================================================

/// Whoever started a conversation turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiator {
    pub id: EntityId,
    pub name: String,
}

impl Initiator {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrainPort: Send + Sync {
    async fn load_brain(&self, villager: EntityId) -> Result<Option<VillagerBrain>, CollaboratorError>;
    async fn save_brain(&self, brain: &VillagerBrain) -> Result<(), CollaboratorError>;
}

/// Sink for villager replies. Owns its own rate limiting and truncation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryPort: Send + Sync {
    async fn deliver(
        &self,
        subject: EntityId,
        initiator: &Initiator,
        text: &str,
    ) -> Result<(), CollaboratorError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProximityPort: Send + Sync {
    /// Villagers within `radius` blocks of `position`.
    async fn find_nearby(&self, position: Position, radius: f64) -> Vec<EntityId>;
}
