use crate::{
    client::JudgeClient,
    config::JudgeConfig,
    error::JudgeError,
    prompt::{EntryRequest, ExitRequest, Prompt},
    registry::ResilienceRegistry,
    verdict::{JudgeAction, JudgeResponse, Verdict, parse_response},
};
use scalper_integration::{BreakerError, retry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resilient gateway to an external judge.
///
/// Every call takes one token from the model's rate limiter, then runs through the model's
/// circuit breaker, inside which the request is retried with exponential backoff. Each attempt
/// is bounded by [`JudgeConfig::call_timeout`]. Failures never surface to callers: they degrade
/// to a conservative, non-agreeing [`Verdict`].
#[derive(Debug)]
pub struct JudgeGateway<Client> {
    client: Client,
    config: JudgeConfig,
    registry: Arc<ResilienceRegistry>,
}

impl<Client> JudgeGateway<Client>
where
    Client: JudgeClient,
{
    /// Construct a gateway owning a fresh [`ResilienceRegistry`].
    pub fn new(client: Client, config: JudgeConfig) -> Self {
        let registry = Arc::new(ResilienceRegistry::new(
            config.rate_limit,
            config.circuit_breaker,
        ));
        Self::with_registry(client, config, registry)
    }

    /// Construct a gateway sharing an existing [`ResilienceRegistry`], eg/ between agents.
    pub fn with_registry(
        client: Client,
        config: JudgeConfig,
        registry: Arc<ResilienceRegistry>,
    ) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    /// Ask the judge to confirm a candidate entry.
    ///
    /// Agreement requires the judge to choose the candidate side with at least
    /// `min_agreement_confidence`.
    pub async fn confirm_entry(&self, request: &EntryRequest) -> Verdict {
        let expected = JudgeAction::from(request.side);
        match self.consult(&request.prompt()).await {
            Ok(response) => {
                let agrees = response.action == expected
                    && response.confidence >= self.config.min_agreement_confidence;
                info!(
                    symbol = %request.symbol,
                    side = %request.side,
                    action = %response.action,
                    confidence = response.confidence,
                    agrees,
                    "judge entry verdict"
                );
                verdict(response, agrees)
            }
            Err(error) => {
                warn!(symbol = %request.symbol, %error, "judge entry confirmation degraded");
                Verdict::degraded(&error)
            }
        }
    }

    /// Ask the judge whether an open position should be closed now.
    ///
    /// Agreement means the judge recommends [`JudgeAction::Close`].
    pub async fn confirm_exit(&self, request: &ExitRequest) -> Verdict {
        match self.consult(&request.prompt()).await {
            Ok(response) => {
                let agrees = response.action == JudgeAction::Close;
                info!(
                    symbol = %request.symbol,
                    action = %response.action,
                    confidence = response.confidence,
                    agrees,
                    "judge exit verdict"
                );
                verdict(response, agrees)
            }
            Err(error) => {
                warn!(symbol = %request.symbol, %error, "judge exit check degraded");
                Verdict::degraded(&error)
            }
        }
    }

    async fn consult(&self, prompt: &Prompt) -> Result<JudgeResponse, JudgeError> {
        let resilience = self.registry.get(self.client.model());

        resilience
            .limiter
            .acquire()
            .await
            .map_err(|_| JudgeError::RateLimited)?;

        let call_timeout = self.config.call_timeout();
        let result = resilience
            .breaker
            .call(|| {
                retry(&self.config.retry, |attempt| async move {
                    debug!(model = self.client.model(), attempt, "consulting judge");
                    let text = tokio::time::timeout(call_timeout, self.client.complete(prompt))
                        .await
                        .map_err(|_| JudgeError::Timeout)??;
                    parse_response(&text)
                })
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(BreakerError::Open) => Err(JudgeError::CircuitOpen),
            Err(BreakerError::Inner(error)) => Err(error),
        }
    }
}

fn verdict(response: JudgeResponse, agrees: bool) -> Verdict {
    Verdict {
        action: response.action,
        confidence: response.confidence,
        reason: response.reason,
        agrees,
        degraded: false,
    }
}
