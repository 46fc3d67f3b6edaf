use scalper_integration::{CircuitBreakerConfig, RateLimitConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Judge gateway & transport configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub enabled: bool,
    /// Reject entries the judge does not agree with, rather than only penalising them.
    pub require_agreement: bool,
    /// OpenAI compatible API base url, eg/ "https://api.openai.com/v1".
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Http request timeout.
    pub request_timeout_ms: u64,
    /// Hard bound on each judge attempt, regardless of transport.
    pub call_timeout_ms: u64,
    /// Minimum judge confidence for an entry to count as confirmed.
    pub min_agreement_confidence: f64,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            require_agreement: false,
            base_url: String::from("https://api.openai.com/v1"),
            api_key: None,
            model: String::from("gpt-4o-mini"),
            temperature: 0.2,
            max_tokens: 300,
            request_timeout_ms: 10_000,
            call_timeout_ms: 15_000,
            min_agreement_confidence: 65.0,
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl JudgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
