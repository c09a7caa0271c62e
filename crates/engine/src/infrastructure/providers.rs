//! Per-provider wire formats: request bodies, headers, and response parsing.
//!
//! Everything here is pure; [`HttpGateway`](super::gateway::HttpGateway)
//! does the I/O and picks the functions by matching on [`WireFormat`].

use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{ConversationRequest, LlmError, Provider, WireFormat};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A parsed, successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
}

/// Request body for the provider's chat endpoint.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatBody {
    OpenAi(OpenAIChatRequest),
    Anthropic(AnthropicMessagesRequest),
}

pub fn chat_body(request: &ConversationRequest) -> ChatBody {
    let messages = vec![WireMessage {
        role: "user".to_string(),
        content: request.prompt().to_string(),
    }];

    match request.provider().descriptor().wire {
        WireFormat::OpenAiChat => ChatBody::OpenAi(OpenAIChatRequest {
            model: request.model().to_string(),
            messages,
            max_tokens: request.max_tokens(),
            temperature: Some(request.temperature()),
        }),
        WireFormat::AnthropicMessages => ChatBody::Anthropic(AnthropicMessagesRequest {
            model: request.model().to_string(),
            max_tokens: request.max_tokens(),
            messages,
        }),
    }
}

/// Headers beyond `Content-Type`. The local provider gets none.
pub fn auth_headers(provider: Provider, credential: &str) -> Vec<(&'static str, String)> {
    let descriptor = provider.descriptor();
    if !descriptor.requires_credential {
        return Vec::new();
    }

    let mut headers = vec![("Authorization", format!("Bearer {credential}"))];
    if descriptor.wire == WireFormat::AnthropicMessages {
        headers.push(("x-api-key", credential.to_string()));
        headers.push(("anthropic-version", ANTHROPIC_VERSION.to_string()));
    }
    headers
}

pub fn parse_completion(wire: WireFormat, body: &str) -> Result<Completion, LlmError> {
    match wire {
        WireFormat::OpenAiChat => {
            let response: OpenAIChatResponse = serde_json::from_str(body)
                .map_err(|e| LlmError::malformed(format!("JSON parsing error: {e}")))?;
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| LlmError::malformed("No choices in response"))?;
            Ok(Completion {
                text: choice.message.content.unwrap_or_default(),
                tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
            })
        }
        WireFormat::AnthropicMessages => {
            let response: AnthropicMessagesResponse = serde_json::from_str(body)
                .map_err(|e| LlmError::malformed(format!("JSON parsing error: {e}")))?;
            let text = response
                .content
                .into_iter()
                .next()
                .and_then(|block| block.text)
                .unwrap_or_default();
            Ok(Completion {
                text,
                tokens_used: response.usage.map(|u| u.output_tokens).unwrap_or(0),
            })
        }
    }
}

/// Parse a models listing: `{"data":[{"id"}]}`, or `{"models":[{"name"}]}` for local.
pub fn parse_model_list(provider: Provider, body: &str) -> Result<Vec<String>, LlmError> {
    let parse_error = |e: serde_json::Error| LlmError::malformed(format!("JSON parsing error: {e}"));

    if provider == Provider::Local {
        let tags: LocalTagsResponse = serde_json::from_str(body).map_err(parse_error)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    } else {
        let listing: ModelListResponse = serde_json::from_str(body).map_err(parse_error)?;
        Ok(listing.data.into_iter().map(|m| m.id).collect())
    }
}

/// Map a non-success status to a failure. A provider `error.message` replaces
/// the default reason.
pub fn error_for_status(status: u16, body: &str) -> LlmError {
    let provider_message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.trim().is_empty());
    let reason = |default: &str| provider_message.clone().unwrap_or_else(|| default.to_string());

    match status {
        401 | 403 => LlmError::InvalidCredential(reason("Invalid API key")),
        429 => LlmError::RateLimited(reason("Rate limit exceeded")),
        500..=599 => LlmError::ServerError {
            status,
            message: reason("Internal server error"),
        },
        _ => LlmError::Rejected {
            status,
            message: reason("Request failed"),
        },
    }
}

// =============================================================================
// OpenAI-compatible API types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenAIChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

// =============================================================================
// Anthropic API types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AnthropicMessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessagesResponse {
    content: Vec<AnthropicContentBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    output_tokens: u32,
}

// =============================================================================
// Local (Ollama) API types
// =============================================================================

#[derive(Debug, Deserialize)]
struct LocalTagsResponse {
    models: Vec<LocalModel>,
}

#[derive(Debug, Deserialize)]
struct LocalModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}
