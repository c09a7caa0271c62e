//! Provider/model registry: key format checks, cached model lists and
//! tier-aware recommendations.

use std::sync::Arc;

use dashmap::DashMap;

use crate::infrastructure::credentials;
use crate::infrastructure::ports::{CapabilityTier, LlmError, LlmGateway, Provider};

/// Models suggested for a provider on a given tier
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecommendation {
    pub models: Vec<String>,
    pub rationale: &'static str,
    pub performance: &'static str,
    pub warnings: Vec<&'static str>,
}

/// How well a provider suits the host hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Optimal,
    Warning(String),
    Incompatible(String),
}

impl Compatibility {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Compatibility::Incompatible(_))
    }
}

/// Explicitly constructed registry; one per [`crate::app::App`].
pub struct ModelRegistry {
    gateway: Arc<dyn LlmGateway>,
    cache: DashMap<Provider, Vec<String>>,
}

impl ModelRegistry {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        let registry = Self {
            gateway,
            cache: DashMap::new(),
        };
        registry.seed_static_models();
        registry
    }

    /// Structural check only; no network call.
    pub fn validate_key_format(&self, provider: Provider, credential: &str) -> bool {
        credentials::is_well_formed(provider, credential)
    }

    pub fn get_models(&self, provider: Provider) -> Vec<String> {
        self.cache
            .entry(provider)
            .or_insert_with(|| static_models(provider))
            .value()
            .clone()
    }

    /// Refresh the cached list from the provider.
    ///
    /// Providers without dynamic listing return their cached list untouched.
    /// A failed fetch is logged and the cached list is kept.
    pub async fn fetch_dynamic_models(&self, provider: Provider, credential: &str) -> Vec<String> {
        if !provider.descriptor().supports_dynamic_model_list {
            return self.get_models(provider);
        }

        match self.gateway.fetch_models(provider, credential).await {
            Ok(models) if !models.is_empty() => {
                tracing::debug!(provider = %provider, count = models.len(), "Refreshed model list");
                self.cache.insert(provider, models.clone());
                models
            }
            Ok(_) => {
                tracing::warn!(provider = %provider, "Provider returned no models, keeping cached list");
                self.get_models(provider)
            }
            Err(e) => {
                log_fetch_failure(provider, &e);
                self.get_models(provider)
            }
        }
    }

    pub fn recommend(&self, provider: Provider, tier: CapabilityTier) -> ModelRecommendation {
        let all = self.get_models(provider);
        match tier {
            CapabilityTier::High => ModelRecommendation {
                models: all,
                rationale: "Your hardware can handle all available models",
                performance: "Excellent",
                warnings: vec![],
            },
            CapabilityTier::Medium => ModelRecommendation {
                models: all.into_iter().filter(|m| !is_heavy_model(m)).collect(),
                rationale: "Optimized for your hardware configuration",
                performance: "Good",
                warnings: vec!["Some heavy models may run slower"],
            },
            CapabilityTier::Low => ModelRecommendation {
                models: all.into_iter().filter(|m| is_lightweight_model(m)).collect(),
                rationale: "Lightweight models recommended for your hardware",
                performance: "Basic",
                warnings: vec![
                    "Limited to efficient models",
                    "Consider using local providers for better performance",
                ],
            },
            CapabilityTier::Unknown => ModelRecommendation {
                models: all.into_iter().filter(|m| is_lightweight_model(m)).collect(),
                rationale: "Conservative selection due to unknown hardware",
                performance: "Basic",
                warnings: vec!["Hardware detection failed", "Using safe model selection"],
            },
        }
    }

    pub fn check_compatibility(&self, provider: Provider, tier: CapabilityTier) -> Compatibility {
        match (provider, tier) {
            (Provider::Local, CapabilityTier::Low) => Compatibility::Incompatible(
                "Local models are too slow on low-tier hardware".to_string(),
            ),
            (Provider::Local, CapabilityTier::Unknown) => Compatibility::Warning(
                "Local models may be slow on undetected hardware".to_string(),
            ),
            (Provider::Groq, CapabilityTier::High) => Compatibility::Optimal,
            _ => Compatibility::Compatible,
        }
    }

    /// Drop every cached list and re-seed the static catalogue.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.seed_static_models();
    }

    fn seed_static_models(&self) {
        for provider in Provider::all() {
            self.cache.insert(*provider, static_models(*provider));
        }
    }
}

fn log_fetch_failure(provider: Provider, error: &LlmError) {
    tracing::warn!(
        provider = %provider,
        error = %error,
        "Failed to fetch dynamic models, keeping cached list"
    );
}

fn static_models(provider: Provider) -> Vec<String> {
    let models: &[&str] = match provider {
        Provider::OpenAi => &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-3.5-turbo-16k"],
        Provider::Anthropic => &[
            "claude-3-opus-20240229",
            "claude-3-sonnet-20240229",
            "claude-3-haiku-20240307",
            "claude-2.1",
            "claude-2.0",
        ],
        Provider::Groq => &["llama2-70b-4096", "mixtral-8x7b-32768", "gemma-7b-it"],
        Provider::Local => &["llama2:7b", "llama2:13b", "codellama:7b", "mistral:7b"],
        Provider::OpenRouter => &[
            "openai/gpt-4",
            "anthropic/claude-3-opus",
            "meta-llama/llama-2-70b-chat",
            "openai/gpt-3.5-turbo",
            "anthropic/claude-3-haiku",
            "meta-llama/llama-2-7b-chat",
        ],
    };
    models.iter().map(|m| m.to_string()).collect()
}

fn is_heavy_model(model: &str) -> bool {
    let model = model.to_lowercase();
    ["gpt-4", "claude-3-opus", "70b", "175b"]
        .iter()
        .any(|marker| model.contains(marker))
}

fn is_lightweight_model(model: &str) -> bool {
    let model = model.to_lowercase();
    ["3.5-turbo", "haiku", "7b", "gemma", "mistral"]
        .iter()
        .any(|marker| model.contains(marker))
}
