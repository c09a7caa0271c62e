//! Provider identities and hardware capability tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request/response shape spoken by a provider's chat endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// `choices[0].message.content`, `usage.total_tokens`, optional temperature
    OpenAiChat,
    /// `content[0].text`, `usage.output_tokens`, no temperature, versioned header
    AnthropicMessages,
}

/// Static description of a chat-completion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub base_url: &'static str,
    pub chat_path: &'static str,
    pub models_path: &'static str,
    /// Expected leading characters of a credential, if the provider issues any
    pub credential_prefix: Option<&'static str>,
    pub requires_credential: bool,
    pub supports_dynamic_model_list: bool,
    pub wire: WireFormat,
}

/// The fixed set of supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Groq,
    OpenRouter,
    /// Ollama-style inference server on this machine
    Local,
}

const OPENAI: ProviderDescriptor = ProviderDescriptor {
    id: "openai",
    display_name: "OpenAI",
    base_url: "https://api.openai.com",
    chat_path: "/v1/chat/completions",
    models_path: "/v1/models",
    credential_prefix: Some("sk-"),
    requires_credential: true,
    supports_dynamic_model_list: false,
    wire: WireFormat::OpenAiChat,
};

const ANTHROPIC: ProviderDescriptor = ProviderDescriptor {
    id: "anthropic",
    display_name: "Anthropic",
    base_url: "https://api.anthropic.com",
    chat_path: "/v1/messages",
    models_path: "/v1/models",
    credential_prefix: Some("sk-ant-"),
    requires_credential: true,
    supports_dynamic_model_list: false,
    wire: WireFormat::AnthropicMessages,
};

const GROQ: ProviderDescriptor = ProviderDescriptor {
    id: "groq",
    display_name: "Groq",
    base_url: "https://api.groq.com/openai",
    chat_path: "/v1/chat/completions",
    models_path: "/v1/models",
    credential_prefix: Some("gsk_"),
    requires_credential: true,
    supports_dynamic_model_list: false,
    wire: WireFormat::OpenAiChat,
};

const OPENROUTER: ProviderDescriptor = ProviderDescriptor {
    id: "openrouter",
    display_name: "OpenRouter",
    base_url: "https://openrouter.ai/api",
    chat_path: "/v1/chat/completions",
    models_path: "/v1/models",
    credential_prefix: Some("sk-or-"),
    requires_credential: true,
    supports_dynamic_model_list: true,
    wire: WireFormat::OpenAiChat,
};

const LOCAL: ProviderDescriptor = ProviderDescriptor {
    id: "local",
    display_name: "Local (Ollama)",
    base_url: "http://localhost:11434",
    chat_path: "/v1/chat/completions",
    models_path: "/api/tags",
    credential_prefix: None,
    requires_credential: false,
    supports_dynamic_model_list: true,
    wire: WireFormat::OpenAiChat,
};

impl Provider {
    pub fn all() -> &'static [Provider] {
        &[
            Provider::OpenAi,
            Provider::Anthropic,
            Provider::Groq,
            Provider::OpenRouter,
            Provider::Local,
        ]
    }

    pub fn descriptor(&self) -> &'static ProviderDescriptor {
        match self {
            Provider::OpenAi => &OPENAI,
            Provider::Anthropic => &ANTHROPIC,
            Provider::Groq => &GROQ,
            Provider::OpenRouter => &OPENROUTER,
            Provider::Local => &LOCAL,
        }
    }

    pub fn id(&self) -> &'static str {
        self.descriptor().id
    }

    /// Model used when a request does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-haiku-20240307",
            _ => "gpt-3.5-turbo",
        }
    }

    /// Upper bound of the temperature range the provider accepts.
    pub fn max_temperature(&self) -> f32 {
        match self.descriptor().wire {
            WireFormat::AnthropicMessages => 1.0,
            WireFormat::OpenAiChat => 2.0,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-', ' '], "");
        match normalized.as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "groq" => Ok(Provider::Groq),
            "openrouter" => Ok(Provider::OpenRouter),
            "local" | "ollama" => Ok(Provider::Local),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Coarse classification of the host's hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    High,
    Medium,
    Low,
    /// Detection failed or was never run
    #[default]
    Unknown,
}

impl std::str::FromStr for CapabilityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(CapabilityTier::High),
            "medium" => Ok(CapabilityTier::Medium),
            "low" => Ok(CapabilityTier::Low),
            "unknown" => Ok(CapabilityTier::Unknown),
            _ => Err(format!("Unknown capability tier: {}", s)),
        }
    }
}
