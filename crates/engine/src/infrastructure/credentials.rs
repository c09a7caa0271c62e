//! Structural credential checks, run before any network call.

use regex_lite::Regex;
use std::sync::LazyLock;

use crate::infrastructure::ports::Provider;

static OPENAI_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-[A-Za-z0-9]{40,60}$").expect("valid regex"));
static ANTHROPIC_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-ant-api03-[A-Za-z0-9\-]{60,100}$").expect("valid regex"));
static OPENROUTER_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sk-or-v1-[A-Za-z0-9]{60,80}$").expect("valid regex"));
static GROQ_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^gsk_[A-Za-z0-9]{40,70}$").expect("valid regex"));

/// Whether `credential` has the shape the provider issues.
///
/// The local provider takes no credential and always passes. Every other
/// provider rejects an empty credential.
pub fn is_well_formed(provider: Provider, credential: &str) -> bool {
    let pattern = match provider {
        Provider::Local => return true,
        Provider::OpenAi => &*OPENAI_KEY_RE,
        Provider::Anthropic => &*ANTHROPIC_KEY_RE,
        Provider::OpenRouter => &*OPENROUTER_KEY_RE,
        Provider::Groq => &*GROQ_KEY_RE,
    };
    !credential.is_empty() && pattern.is_match(credential)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn accepts_well_formed_keys() {
        assert!(is_well_formed(Provider::OpenAi, &openai_key()));
        assert!(is_well_formed(Provider::Anthropic, &anthropic_key()));
        assert!(is_well_formed(Provider::OpenRouter, &openrouter_key()));
        assert!(is_well_formed(Provider::Groq, &groq_key()));
    }

    #[test]
    fn rejects_keys_for_the_wrong_provider() {
        assert!(!is_well_formed(Provider::OpenAi, &groq_key()));
        assert!(!is_well_formed(Provider::Groq, &openai_key()));
        assert!(!is_well_formed(Provider::OpenAi, "sk-short"));
    }

    #[test]
    fn empty_credential_only_passes_for_local() {
        assert!(is_well_formed(Provider::Local, ""));
        for provider in [Provider::OpenAi, Provider::Anthropic, Provider::Groq, Provider::OpenRouter] {
            assert!(!is_well_formed(provider, ""));
        }
    }
}
