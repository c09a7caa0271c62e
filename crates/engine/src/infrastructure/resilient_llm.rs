//! Retry orchestrator: bounded exponential-backoff retries around the gateway.
//!
//! This is the only place retry decisions are made. The gateway makes one
//! attempt per call; callers above this layer never retry on their own.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::infrastructure::ports::{
    ConversationRequest, ConversationResponse, LlmError, LlmGateway, LlmPort,
};
use crate::infrastructure::rate_limit::RequestPacer;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Delay in milliseconds before the first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays to prevent thundering herd
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
        }
    }
}

/// Wraps an [`LlmGateway`] with pacing, retries and an overall deadline.
pub struct RetryOrchestrator {
    gateway: Arc<dyn LlmGateway>,
    pacer: Arc<RequestPacer>,
    config: RetryConfig,
}

impl RetryOrchestrator {
    pub fn new(gateway: Arc<dyn LlmGateway>, pacer: Arc<RequestPacer>, config: RetryConfig) -> Self {
        Self {
            gateway,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped, with jitter.
    fn calculate_delay(&self, retry: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(retry));
        let capped = exponential.min(self.config.max_delay_ms);

        // Add jitter: ±jitter_factor around the delay
        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    /// Send `request`, retrying transient failures up to `max_retries` times.
    ///
    /// The request's timeout bounds the whole exchange: every attempt gets
    /// only what is left of it, and a backoff that would outlast it ends the
    /// exchange early. Non-retryable failures return as-is after one attempt;
    /// anything else terminal comes back as [`LlmError::RetriesExhausted`].
    pub async fn send_with_retry(
        &self,
        request: &ConversationRequest,
        max_retries: u32,
    ) -> ConversationResponse {
        let deadline = Instant::now() + request.timeout();
        let mut attempts = 0u32;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if !self.pacer.acquire_until(deadline).await {
                last_error.get_or_insert(LlmError::Timeout(request.timeout()));
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                last_error.get_or_insert(LlmError::Timeout(request.timeout()));
                break;
            }

            attempts += 1;
            let response = match tokio::time::timeout(remaining, self.gateway.send(request)).await {
                Ok(response) => response,
                Err(_) => ConversationResponse::Failure(LlmError::Timeout(request.timeout())),
            };

            let error = match response {
                ConversationResponse::Failure(error) => error,
                success => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            provider = %request.provider(),
                            "LLM request succeeded after retry"
                        );
                    }
                    return success;
                }
            };

            if !error.is_retryable() {
                tracing::error!(
                    error = %error,
                    provider = %request.provider(),
                    "LLM request failed with non-retryable error"
                );
                return ConversationResponse::Failure(error);
            }

            if attempt < max_retries {
                let delay = Duration::from_millis(self.calculate_delay(attempt));
                if Instant::now() + delay >= deadline {
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Backoff would exceed request timeout, giving up"
                    );
                    last_error = Some(error);
                    break;
                }
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    provider = %request.provider(),
                    "LLM request failed, retrying..."
                );
                tokio::time::sleep(delay).await;
            }

            last_error = Some(error);
        }

        let last = last_error.unwrap_or(LlmError::Timeout(request.timeout()));
        if attempts == 0 {
            tracing::warn!(
                provider = %request.provider(),
                timeout_ms = request.timeout().as_millis() as u64,
                "LLM request timed out waiting for a send slot"
            );
            return ConversationResponse::Failure(last);
        }
        tracing::error!(
            attempts,
            error = %last,
            provider = %request.provider(),
            "LLM request failed after all retry attempts"
        );
        ConversationResponse::Failure(LlmError::RetriesExhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

#[async_trait]
impl LlmPort for RetryOrchestrator {
    async fn generate(&self, request: ConversationRequest) -> ConversationResponse {
        self.send_with_retry(&request, self.config.max_retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::Provider;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Gateway that replays a script of responses, then repeats the last one
    struct ScriptedGateway {
        script: Mutex<VecDeque<ConversationResponse>>,
        fallback: ConversationResponse,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<ConversationResponse>, fallback: ConversationResponse) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn always(response: ConversationResponse) -> Self {
            Self::new(vec![], response)
        }

        fn call_count(&self) -> usize {
            self.calls.lock().expect("lock").len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        async fn fetch_models(&self, _: Provider, _: &str) -> Result<Vec<String>, LlmError> {
            Ok(vec![])
        }

        async fn validate_key(&self, _: Provider, _: &str) -> bool {
            true
        }

        async fn send(&self, _request: &ConversationRequest) -> ConversationResponse {
            self.calls.lock().expect("lock").push(Instant::now());
            let next = self.script.lock().expect("lock").pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Gateway whose calls never complete
    struct HangingGateway;

    #[async_trait]
    impl LlmGateway for HangingGateway {
        async fn fetch_models(&self, _: Provider, _: &str) -> Result<Vec<String>, LlmError> {
            Ok(vec![])
        }

        async fn validate_key(&self, _: Provider, _: &str) -> bool {
            true
        }

        async fn send(&self, _request: &ConversationRequest) -> ConversationResponse {
            std::future::pending().await
        }
    }

    fn success() -> ConversationResponse {
        ConversationResponse::Success {
            text: "Success!".into(),
            tokens_used: 5,
            latency_ms: 1,
        }
    }

    fn rate_limited() -> ConversationResponse {
        ConversationResponse::Failure(LlmError::RateLimited("Rate limit exceeded".into()))
    }

    fn request() -> ConversationRequest {
        ConversationRequest::builder(Provider::Local, "hello")
            .timeout(Duration::from_secs(30))
            .build()
            .expect("valid request")
    }

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.0,
        }
    }

    fn orchestrator(gateway: Arc<dyn LlmGateway>) -> RetryOrchestrator {
        RetryOrchestrator::new(gateway, Arc::new(RequestPacer::default()), no_jitter())
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_without_retry() {
        let gateway = Arc::new(ScriptedGateway::always(success()));
        let client = orchestrator(gateway.clone());

        let response = client.send_with_retry(&request(), 3).await;

        assert_eq!(response.usable_text(), Some("Success!"));
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retry() {
        let gateway = Arc::new(ScriptedGateway::new(
            vec![rate_limited(), rate_limited()],
            success(),
        ));
        let client = orchestrator(gateway.clone());

        let response = client.send_with_retry(&request(), 3).await;

        assert!(response.is_success());
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_after_max_retries() {
        let gateway = Arc::new(ScriptedGateway::always(ConversationResponse::Failure(
            LlmError::ServerError {
                status: 500,
                message: "Internal server error".into(),
            },
        )));
        let client = orchestrator(gateway.clone());

        let response = client.send_with_retry(&request(), 2).await;

        let failure = response.failure().expect("terminal failure");
        assert!(matches!(
            failure,
            LlmError::RetriesExhausted { attempts: 3, .. }
        ));
        assert!(failure
            .to_string()
            .starts_with("Max retries exceeded after 3 attempts"));
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_on_auth_error() {
        let gateway = Arc::new(ScriptedGateway::always(ConversationResponse::Failure(
            LlmError::invalid_credential("Invalid API key"),
        )));
        let client = orchestrator(gateway.clone());

        let response = client.send_with_retry(&request(), 3).await;

        // Should fail immediately without retrying
        assert_eq!(
            response.failure(),
            Some(&LlmError::invalid_credential("Invalid API key"))
        );
        assert_eq!(
            gateway.call_count(),
            1,
            "Auth error should not retry - expected a single attempt"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt() {
        let gateway = Arc::new(ScriptedGateway::always(rate_limited()));
        let client = orchestrator(gateway.clone());

        let response = client.send_with_retry(&request(), 0).await;

        assert!(matches!(
            response.failure(),
            Some(LlmError::RetriesExhausted { attempts: 1, .. })
        ));
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_with_exponential_backoff() {
        let gateway = Arc::new(ScriptedGateway::new(
            vec![rate_limited(), rate_limited()],
            success(),
        ));
        let client = orchestrator(gateway.clone());

        client.send_with_retry(&request(), 3).await;

        let times = gateway.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(100));
        assert!(times[2] - times[1] >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_is_bounded_by_request_timeout() {
        let client = orchestrator(Arc::new(HangingGateway));
        let request = ConversationRequest::builder(Provider::Local, "hello")
            .timeout(Duration::from_millis(300))
            .build()
            .expect("valid request");
        let start = Instant::now();

        let response = client.send_with_retry(&request, 3).await;

        let failure = response.failure().expect("terminal failure");
        assert!(matches!(failure.root_cause(), LlmError::Timeout(_)));
        assert!(Instant::now() - start <= Duration::from_millis(300) + Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_respect_global_spacing() {
        let gateway = Arc::new(ScriptedGateway::always(success()));
        let client = Arc::new(orchestrator(gateway.clone()));

        let first = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_with_retry(&request(), 0).await })
        };
        let second = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_with_retry(&request(), 0).await })
        };
        first.await.expect("first completes");
        second.await.expect("second completes");

        let mut times = gateway.call_times();
        times.sort();
        assert!(times[1] - times[0] >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn crowded_pacer_does_not_stretch_past_request_timeout() {
        let gateway = Arc::new(ScriptedGateway::always(success()));
        let client = Arc::new(orchestrator(gateway.clone()));
        let request = ConversationRequest::builder(Provider::Local, "hello")
            .timeout(Duration::from_millis(200))
            .build()
            .expect("valid request");
        let start = Instant::now();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let client = Arc::clone(&client);
                let request = request.clone();
                tokio::spawn(async move {
                    let response = client.send_with_retry(&request, 0).await;
                    (response, Instant::now())
                })
            })
            .collect();

        let mut timed_out = 0;
        for handle in handles {
            let (response, finished) = handle.await.expect("task completes");
            assert!(finished - start <= Duration::from_millis(200));
            if let Some(failure) = response.failure() {
                assert_eq!(failure, &LlmError::Timeout(Duration::from_millis(200)));
                timed_out += 1;
            }
        }

        // Slots at 0ms and 100ms fit inside the 200ms window
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(timed_out, 48);
    }

    #[tokio::test(start_paused = true)]
    async fn generate_uses_configured_retry_budget() {
        let gateway = Arc::new(ScriptedGateway::always(rate_limited()));
        let config = RetryConfig {
            max_retries: 1,
            ..no_jitter()
        };
        let client = RetryOrchestrator::new(gateway.clone(), Arc::new(RequestPacer::default()), config);

        client.generate(request()).await;

        assert_eq!(gateway.call_count(), 2);
    }

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 6,
            base_delay_ms: 100,
            max_delay_ms: 3000,
            jitter_factor: 0.0, // No jitter for predictable test
        };
        let client = RetryOrchestrator::new(
            Arc::new(ScriptedGateway::always(success())),
            Arc::new(RequestPacer::default()),
            config,
        );

        assert_eq!(client.calculate_delay(0), 100);
        assert_eq!(client.calculate_delay(1), 200);
        assert_eq!(client.calculate_delay(2), 400);
        assert_eq!(client.calculate_delay(3), 800);
        assert_eq!(client.calculate_delay(4), 1600);
        // 100 * 2^5 = 3200, capped at 3000
        assert_eq!(client.calculate_delay(5), 3000);
    }

    #[test]
    fn jitter_stays_within_factor() {
        let config = RetryConfig {
            jitter_factor: 0.1,
            ..no_jitter()
        };
        let client = RetryOrchestrator::new(
            Arc::new(ScriptedGateway::always(success())),
            Arc::new(RequestPacer::default()),
            config,
        );

        for _ in 0..50 {
            let delay = client.calculate_delay(1);
            assert!((180..=220).contains(&delay), "delay {delay} out of range");
        }
    }
}
