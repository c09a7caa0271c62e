//! Error types for port operations.

use std::time::Duration;

use super::types::Provider;

/// Normalized provider failure.
///
/// The gateway never returns anything else: every transport, status and
/// parse problem is mapped onto one of these variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    /// Credential missing, malformed, or refused by the provider (401/403).
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Body could not be parsed into the provider's documented shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Provider asked us to slow down (429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider-side failure (5xx).
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Provider refused the request itself (other 4xx).
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure before any status was received.
    #[error("Network connection error: {0}")]
    Network(String),

    /// Retry budget spent; carries the last underlying failure.
    #[error("Max retries exceeded after {attempts} attempts. Last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<LlmError> },
}

impl LlmError {
    /// Transient failures worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited(_)
            | LlmError::ServerError { .. }
            | LlmError::Timeout(_)
            | LlmError::Network(_) => true,
            LlmError::InvalidCredential(_)
            | LlmError::MalformedResponse(_)
            | LlmError::Rejected { .. }
            | LlmError::RetriesExhausted { .. } => false,
        }
    }

    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// The innermost cause, looking through `RetriesExhausted`.
    pub fn root_cause(&self) -> &LlmError {
        match self {
            LlmError::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

/// Reasons a `ConversationRequest` could not be built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("max_tokens must be greater than zero")]
    InvalidMaxTokens,

    #[error("Temperature {value} outside accepted range 0.0..={max} for {provider}")]
    TemperatureOutOfRange {
        value: f32,
        max: f32,
        provider: Provider,
    },

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,
}

/// Failures reported by host-game collaborators (brain storage, delivery).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Storage error in {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl CollaboratorError {
    pub fn storage(operation: &'static str, message: impl ToString) -> Self {
        Self::Storage {
            operation,
            message: message.to_string(),
        }
    }

    pub fn delivery(message: impl ToString) -> Self {
        Self::Delivery(message.to_string())
    }
}
