//! Runtime settings read from the environment.
//!
//! Every key is optional. A value that fails to parse is logged and replaced
//! by its default rather than aborting startup.

use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::ports::{CapabilityTier, Provider, ProviderProfile};
use crate::infrastructure::resilient_llm::RetryConfig;

const ENV_PREFIX: &str = "VILLAGEMIND_";

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub provider: Provider,
    pub api_key: String,
    pub model: Option<String>,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub min_request_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub combat_ai_timeout_ms: u64,
    pub hardware_tier: CapabilityTier,
    /// Per-provider base URL overrides (`VILLAGEMIND_<PROVIDER>_URL`)
    pub base_urls: Vec<(Provider, String)>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Local,
            api_key: String::new(),
            model: None,
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            min_request_interval_ms: 100,
            request_timeout_ms: 30_000,
            combat_ai_timeout_ms: 150,
            hardware_tier: CapabilityTier::Unknown,
            base_urls: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_urls = Provider::all()
            .iter()
            .filter_map(|provider| {
                let key = format!("{}_URL", provider.id().to_ascii_uppercase());
                get(&key).map(|url| (*provider, url))
            })
            .collect();

        Self {
            provider: parsed(get("PROVIDER"), "PROVIDER", defaults.provider),
            api_key: get("API_KEY").unwrap_or_default(),
            model: get("MODEL"),
            max_retries: parsed(get("MAX_RETRIES"), "MAX_RETRIES", defaults.max_retries),
            base_delay_ms: parsed(get("BASE_DELAY_MS"), "BASE_DELAY_MS", defaults.base_delay_ms),
            max_delay_ms: parsed(get("MAX_DELAY_MS"), "MAX_DELAY_MS", defaults.max_delay_ms),
            min_request_interval_ms: parsed(
                get("MIN_REQUEST_INTERVAL_MS"),
                "MIN_REQUEST_INTERVAL_MS",
                defaults.min_request_interval_ms,
            ),
            request_timeout_ms: parsed(
                get("REQUEST_TIMEOUT_MS"),
                "REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            ),
            combat_ai_timeout_ms: parsed(
                get("COMBAT_AI_TIMEOUT_MS"),
                "COMBAT_AI_TIMEOUT_MS",
                defaults.combat_ai_timeout_ms,
            ),
            hardware_tier: parsed(get("HARDWARE_TIER"), "HARDWARE_TIER", defaults.hardware_tier),
            base_urls,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms.max(self.base_delay_ms),
            ..RetryConfig::default()
        }
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn combat_ai_timeout(&self) -> Duration {
        Duration::from_millis(self.combat_ai_timeout_ms)
    }

    pub fn profile(&self) -> ProviderProfile {
        ProviderProfile::new(self.provider, self.api_key.clone())
            .with_model(self.model.clone())
            .with_timeout(Duration::from_millis(self.request_timeout_ms))
    }
}

fn parsed<T: FromStr>(raw: Option<String>, name: &str, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                key = %format!("{ENV_PREFIX}{name}"),
                value = %raw,
                "Unparseable setting, using default"
            );
            default
        }
    }
}
