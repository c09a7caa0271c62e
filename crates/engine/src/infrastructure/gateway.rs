//! HTTP gateway to chat-completion providers.
//!
//! One network round trip per call; no retries. Every outcome, including
//! transport failures, comes back as a value.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crate::infrastructure::credentials;
use crate::infrastructure::ports::{
    ConversationRequest, ConversationResponse, LlmError, LlmGateway, Provider,
};
use crate::infrastructure::providers::{self, Completion};

/// Budget for models listings and key validation calls.
const LISTING_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed [`LlmGateway`].
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_urls: HashMap<Provider, String>,
}

impl HttpGateway {
    pub fn new() -> Self {
        // Per-request timeouts come from each request's own budget
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_urls: HashMap::new(),
        }
    }

    /// Point a provider at a different host (self-hosted proxies, tests).
    pub fn with_base_url(mut self, provider: Provider, base_url: &str) -> Self {
        self.base_urls
            .insert(provider, base_url.trim_end_matches('/').to_string());
        self
    }

    fn url(&self, provider: Provider, path: &str) -> String {
        let base = self
            .base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(provider.descriptor().base_url);
        format!("{base}{path}")
    }

    fn authorize(&self, builder: RequestBuilder, provider: Provider, credential: &str) -> RequestBuilder {
        providers::auth_headers(provider, credential)
            .into_iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value))
    }

    async fn round_trip(&self, request: &ConversationRequest) -> Result<Completion, LlmError> {
        let provider = request.provider();
        let descriptor = provider.descriptor();

        if descriptor.requires_credential && !credentials::is_well_formed(provider, request.credential()) {
            return Err(LlmError::invalid_credential("Invalid API key format"));
        }

        let builder = self
            .client
            .post(self.url(provider, descriptor.chat_path))
            .timeout(request.timeout())
            .json(&providers::chat_body(request));
        let response = self
            .authorize(builder, provider, request.credential())
            .send()
            .await
            .map_err(|e| transport_error(e, request.timeout()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, request.timeout()))?;

        if !status.is_success() {
            return Err(providers::error_for_status(status.as_u16(), &body));
        }
        providers::parse_completion(descriptor.wire, &body)
    }

    async fn get_models(&self, provider: Provider, credential: &str) -> Result<reqwest::Response, LlmError> {
        let builder = self
            .client
            .get(self.url(provider, provider.descriptor().models_path))
            .timeout(LISTING_TIMEOUT);
        self.authorize(builder, provider, credential)
            .send()
            .await
            .map_err(|e| transport_error(e, LISTING_TIMEOUT))
    }
}

impl Default for HttpGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmGateway for HttpGateway {
    async fn fetch_models(&self, provider: Provider, credential: &str) -> Result<Vec<String>, LlmError> {
        let response = self.get_models(provider, credential).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, LISTING_TIMEOUT))?;

        if !status.is_success() {
            return Err(providers::error_for_status(status.as_u16(), &body));
        }
        providers::parse_model_list(provider, &body)
    }

    async fn validate_key(&self, provider: Provider, credential: &str) -> bool {
        if !provider.descriptor().requires_credential {
            return true;
        }
        if !credentials::is_well_formed(provider, credential) {
            return false;
        }

        match self.get_models(provider, credential).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Key validation request failed");
                false
            }
        }
    }

    async fn send(&self, request: &ConversationRequest) -> ConversationResponse {
        let started = Instant::now();
        let result = self.round_trip(request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(completion) => {
                tracing::debug!(
                    provider = %request.provider(),
                    model = request.model(),
                    latency_ms,
                    tokens = completion.tokens_used,
                    "Provider call succeeded"
                );
                ConversationResponse::Success {
                    text: completion.text,
                    tokens_used: completion.tokens_used,
                    latency_ms,
                }
            }
            Err(error) => {
                tracing::debug!(
                    provider = %request.provider(),
                    latency_ms,
                    error = %error,
                    "Provider call failed"
                );
                ConversationResponse::Failure(error)
            }
        }
    }
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(timeout)
    } else if error.is_decode() {
        LlmError::malformed(error.to_string())
    } else {
        LlmError::network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credentials::fixtures::{anthropic_key, openai_key};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn request(provider: Provider, credential: String) -> ConversationRequest {
        ConversationRequest::builder(provider, "Hello")
            .credential(credential)
            .timeout(Duration::from_secs(5))
            .build()
            .expect("valid request")
    }

    #[tokio::test]
    async fn openai_success_is_normalized() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][0]["content"], json!("Hello"));
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "Well met!"}}],
                    "usage": {"total_tokens": 21}
                }))
            }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::OpenAi, &base);

        let response = gateway.send(&request(Provider::OpenAi, openai_key())).await;

        match response {
            ConversationResponse::Success { text, tokens_used, .. } => {
                assert_eq!(text, "Well met!");
                assert_eq!(tokens_used, 21);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn anthropic_request_carries_version_header() {
        let router = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("anthropic-version").is_none() || body.get("temperature").is_some() {
                    return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad shape"}})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "content": [{"type": "text", "text": "Greetings"}],
                        "usage": {"output_tokens": 4}
                    })),
                )
            }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::Anthropic, &base);

        let response = gateway.send(&request(Provider::Anthropic, anthropic_key())).await;

        assert_eq!(response.usable_text(), Some("Greetings"));
    }

    #[tokio::test]
    async fn error_statuses_become_typed_failures() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"message": "slow down"}})),
                )
            }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::OpenAi, &base);

        let response = gateway.send(&request(Provider::OpenAi, openai_key())).await;

        assert_eq!(
            response.failure(),
            Some(&LlmError::RateLimited("slow down".into()))
        );
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let router = Router::new().route("/v1/chat/completions", post(|| async { "not json" }));
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::Local, &base);

        let response = gateway.send(&request(Provider::Local, String::new())).await;

        assert!(matches!(response.failure(), Some(LlmError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn malformed_key_fails_without_network_call() {
        // Nothing listens here; a network attempt would surface as Network, not InvalidCredential
        let gateway = HttpGateway::new().with_base_url(Provider::OpenAi, "http://127.0.0.1:1");

        let response = gateway.send(&request(Provider::OpenAi, "sk-nope".into())).await;

        assert!(matches!(response.failure(), Some(LlmError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_failure() {
        let gateway = HttpGateway::new().with_base_url(Provider::Local, "http://127.0.0.1:1");

        let response = gateway.send(&request(Provider::Local, String::new())).await;

        let failure = response.failure().expect("a failure");
        assert!(failure.is_retryable());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"choices": []}))
            }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::Local, &base);
        let request = ConversationRequest::builder(Provider::Local, "Hello")
            .timeout(Duration::from_millis(100))
            .build()
            .expect("valid request");

        let response = gateway.send(&request).await;

        assert!(matches!(response.failure(), Some(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn fetches_local_model_tags() {
        let router = Router::new().route(
            "/api/tags",
            get(|| async { Json(json!({"models": [{"name": "llama2:7b"}, {"name": "phi3:mini"}]})) }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::Local, &base);

        let models = gateway
            .fetch_models(Provider::Local, "")
            .await
            .expect("model listing");

        assert_eq!(models, vec!["llama2:7b", "phi3:mini"]);
    }

    #[tokio::test]
    async fn validate_key_checks_with_provider() {
        let router = Router::new().route(
            "/v1/models",
            get(|headers: HeaderMap| async move {
                let expected = format!("Bearer {}", openai_key());
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some(value) if value == expected => (StatusCode::OK, Json(json!({"data": []}))),
                    _ => (StatusCode::UNAUTHORIZED, Json(json!({}))),
                }
            }),
        );
        let base = spawn_provider(router).await;
        let gateway = HttpGateway::new().with_base_url(Provider::OpenAi, &base);

        assert!(gateway.validate_key(Provider::OpenAi, &openai_key()).await);
        assert!(!gateway.validate_key(Provider::OpenAi, &format!("sk-{}", "z".repeat(48))).await);
        assert!(!gateway.validate_key(Provider::OpenAi, "").await);
        assert!(gateway.validate_key(Provider::Local, "").await);
    }
}
