//! LLM Router
//!
//! Ranks the registered providers and calls them in order with a per-provider
//! timeout, failing over until one answers. The configured default provider
//! always ranks first; the rest are ordered cheapest first.

use super::{LLMError, LLMProvider, Message, ResponseFormat};
use crate::config::LLMConfig;
use std::sync::Arc;
use std::time::Duration;

/// LLM Router with ordered failover
pub struct LLMRouter {
    /// Available LLM providers
    providers: Vec<Box<dyn LLMProvider>>,

    /// LLM configuration
    config: Arc<LLMConfig>,
}

impl LLMRouter {
    /// Create a new LLM router
    ///
    /// # Arguments
    /// * `providers` - List of available LLM providers
    /// * `config` - LLM configuration
    pub fn new(providers: Vec<Box<dyn LLMProvider>>, config: Arc<LLMConfig>) -> Self {
        Self { providers, config }
    }

    /// True when at least one provider is registered.
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Estimate token count for the conversation
    ///
    /// Uses a simple heuristic: ~4 characters per token
    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        total_chars / 4
    }

    /// Rank providers for a request of `estimated_tokens`
    ///
    /// Ranking algorithm:
    /// 1. The configured default provider goes first
    /// 2. Remaining providers ordered by estimated cost (cheaper first)
    pub fn rank_providers(&self, estimated_tokens: usize) -> Vec<&dyn LLMProvider> {
        let mut providers: Vec<&dyn LLMProvider> =
            self.providers.iter().map(|b| b.as_ref()).collect();

        let default_provider = &self.config.default_provider;

        providers.sort_by(|a, b| {
            let mut score_a = 0.0_f64;
            let mut score_b = 0.0_f64;

            if a.name() == default_provider {
                score_a += 200.0;
            }
            if b.name() == default_provider {
                score_b += 200.0;
            }

            // Lower cost = higher score
            score_a -= a.estimated_cost(estimated_tokens) * 1000.0;
            score_b -= b.estimated_cost(estimated_tokens) * 1000.0;

            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        providers
    }

    /// Timeout applied to one provider attempt.
    ///
    /// Local providers get four times the configured budget to cover model loading.
    fn timeout_for(&self, provider: &dyn LLMProvider) -> Duration {
        let secs = if provider.is_local() {
            self.config.timeout_secs.saturating_mul(4)
        } else {
            self.config.timeout_secs
        };
        Duration::from_secs(secs)
    }

    /// Call LLM providers with automatic failover
    ///
    /// Returns the content and the name of the provider that produced it.
    pub async fn call(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> super::Result<(String, String)> {
        if self.providers.is_empty() {
            return Err(LLMError::ProviderUnavailable(
                "No LLM providers configured".to_string(),
            ));
        }

        let ranked_providers = self.rank_providers(self.estimate_tokens(messages));
        let mut last_error = None;

        for provider in ranked_providers {
            let timeout = self.timeout_for(provider);
            tracing::debug!(
                "Attempting provider: {} (timeout: {}s)",
                provider.name(),
                timeout.as_secs()
            );

            match tokio::time::timeout(timeout, provider.generate(messages, format)).await {
                Ok(Ok(content)) => {
                    tracing::debug!("Provider {} succeeded", provider.name());
                    return Ok((content, provider.name().to_string()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Provider {} timed out after {}s",
                        provider.name(),
                        timeout.as_secs()
                    );
                    last_error = Some(LLMError::Timeout);
                }
            }
        }

        tracing::error!("All LLM providers exhausted");
        Err(match last_error {
            Some(LLMError::Timeout) => LLMError::Timeout,
            _ => LLMError::ProviderUnavailable("All LLM providers failed".to_string()),
        })
    }

    /// Check the health of all registered providers
    /// Returns a list of (provider_name, is_healthy)
    pub async fn check_health(&self) -> Vec<(&str, bool)> {
        let mut results = Vec::new();
        for provider in &self.providers {
            let is_healthy = provider.check_health().await;
            results.push((provider.name(), is_healthy));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Mock provider for testing
    struct MockProvider {
        name: String,
        is_local: bool,
        cost_per_1k: f64,
        reply: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn new(name: &str, is_local: bool, cost_per_1k: f64, reply: Option<&str>) -> Self {
            Self {
                name: name.to_string(),
                is_local,
                cost_per_1k,
                reply: reply.map(str::to_string),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_local(&self) -> bool {
            self.is_local
        }

        fn estimated_cost(&self, tokens: usize) -> f64 {
            (tokens as f64 / 1000.0) * self.cost_per_1k
        }

        async fn generate(
            &self,
            _messages: &[Message],
            _format: ResponseFormat,
        ) -> Result<String, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| LLMError::ProviderUnavailable(self.name.clone()))
        }
    }

    fn create_test_config(default_provider: &str) -> Arc<LLMConfig> {
        let mut config = Config::default_config().llm;
        config.default_provider = default_provider.to_string();
        config.timeout_secs = 1;
        Arc::new(config)
    }

    #[test]
    fn test_estimate_tokens() {
        let router = LLMRouter::new(vec![], create_test_config("ollama"));
        let messages = vec![Message::user("This is a test message")];
        let tokens = router.estimate_tokens(&messages);
        assert!((5..=6).contains(&tokens));
    }

    #[test]
    fn test_rank_providers_default_first() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("ollama", true, 0.0, None)),
            Box::new(MockProvider::new("openai", false, 0.002, None)),
        ];
        let router = LLMRouter::new(providers, create_test_config("openai"));

        let ranked = router.rank_providers(1000);
        assert_eq!(ranked[0].name(), "openai");
        assert_eq!(ranked[1].name(), "ollama");
    }

    #[test]
    fn test_rank_providers_consider_cost() {
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(MockProvider::new("expensive", false, 0.010, None)),
            Box::new(MockProvider::new("cheap", false, 0.001, None)),
            Box::new(MockProvider::new("medium", false, 0.005, None)),
        ];
        let router = LLMRouter::new(providers, create_test_config("none"));

        let ranked = router.rank_providers(1000);
        assert_eq!(ranked[0].name(), "cheap");
        assert_eq!(ranked[1].name(), "medium");
        assert_eq!(ranked[2].name(), "expensive");
    }

    #[test]
    fn test_local_timeout_is_longer() {
        let router = LLMRouter::new(vec![], create_test_config("ollama"));
        let local = MockProvider::new("ollama", true, 0.0, None);
        let cloud = MockProvider::new("openai", false, 0.002, None);
        assert_eq!(router.timeout_for(&local), Duration::from_secs(4));
        assert_eq!(router.timeout_for(&cloud), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_call_fails_over() {
        let failing = MockProvider::new("openai", false, 0.002, None);
        let failing_calls = failing.calls.clone();
        let providers: Vec<Box<dyn LLMProvider>> = vec![
            Box::new(failing),
            Box::new(MockProvider::new("ollama", true, 0.0, Some("{}"))),
        ];
        let router = LLMRouter::new(providers, create_test_config("openai"));

        let (content, provider) = router
            .call(&[Message::user("hi")], ResponseFormat::Json)
            .await
            .unwrap();
        assert_eq!(content, "{}");
        assert_eq!(provider, "ollama");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_without_providers() {
        let router = LLMRouter::new(vec![], create_test_config("ollama"));
        assert!(!router.has_providers());
        let err = router
            .call(&[Message::user("hi")], ResponseFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::ProviderUnavailable(_)));
    }
}
