use fnv::FnvHashMap;
use parking_lot::RwLock;
use scalper_integration::{CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, TokenBucket};
use smol_str::SmolStr;
use std::sync::Arc;

/// Rate limiter & circuit breaker pair guarding one judge model.
#[derive(Debug)]
pub struct Resilience {
    pub limiter: TokenBucket,
    pub breaker: CircuitBreaker,
}

/// Process lifetime registry of per model [`Resilience`] state.
///
/// Entries are created lazily on first use and never replaced, so concurrent callers for the
/// same model id always share a single limiter & breaker.
#[derive(Debug)]
pub struct ResilienceRegistry {
    rate_limit: RateLimitConfig,
    circuit_breaker: CircuitBreakerConfig,
    models: RwLock<FnvHashMap<SmolStr, Arc<Resilience>>>,
}

impl ResilienceRegistry {
    pub fn new(rate_limit: RateLimitConfig, circuit_breaker: CircuitBreakerConfig) -> Self {
        Self {
            rate_limit,
            circuit_breaker,
            models: RwLock::new(FnvHashMap::default()),
        }
    }

    /// Find or create the [`Resilience`] state for `model`.
    pub fn get(&self, model: &str) -> Arc<Resilience> {
        if let Some(resilience) = self.models.read().get(model) {
            return Arc::clone(resilience);
        }

        let mut models = self.models.write();
        Arc::clone(models.entry(SmolStr::new(model)).or_insert_with(|| {
            Arc::new(Resilience {
                limiter: TokenBucket::new(&self.rate_limit),
                breaker: CircuitBreaker::new(self.circuit_breaker),
            })
        }))
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_shares_state_per_model() {
        let registry = ResilienceRegistry::new(
            RateLimitConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
        );

        let first = registry.get("gpt-4o-mini");
        let second = registry.get("gpt-4o-mini");
        assert!(Arc::ptr_eq(&first, &second));

        first.breaker.record_failure();
        assert!(!second.breaker.try_acquire());
        assert!(registry.get("other-model").breaker.try_acquire());
        assert_eq!(registry.len(), 2);
    }
}
