//! OpenAI-compatible chat completions provider
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, Groq, local gateways). When the configured model is reported as
//! missing, the configured fallback models are tried in order.

use super::{LLMError, LLMProvider, Message, ResponseFormat};
use crate::config::OpenAIConfig;
use crate::secrets::{scrub_secrets, SecretManager, OPENAI_API_KEY};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    secrets: Arc<SecretManager>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, secrets: Arc<SecretManager>) -> Self {
        Self {
            config,
            secrets,
            client: reqwest::Client::new(),
        }
    }

    /// Primary model first, then fallbacks, without duplicates.
    fn candidate_models(&self) -> Vec<&str> {
        let mut models = vec![self.config.model.as_str()];
        for model in &self.config.fallback_models {
            if !models.contains(&model.as_str()) {
                models.push(model.as_str());
            }
        }
        models
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        format: ResponseFormat,
    ) -> super::Result<String> {
        let api_key = self
            .secrets
            .get_secret(OPENAI_API_KEY)
            .map_err(|e| LLMError::AuthenticationFailed(e.to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": model,
            "messages": api_messages,
            "temperature": 0.2,
        });
        if format == ResponseFormat::Json {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(scrub_secrets(&e.to_string()))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = scrub_secrets(&response.text().await.unwrap_or_default());

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed(text),
                404 => LLMError::ModelNotFound(model.to_string()),
                429 => LLMError::RateLimitExceeded,
                _ if text.contains("model_not_found") || text.contains("model_decommissioned") => {
                    LLMError::ModelNotFound(model.to_string())
                }
                _ => LLMError::InvalidRequest(text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

        let message = choice
            .get("message")
            .ok_or_else(|| LLMError::ParseError("No message in choice".to_string()))?;

        message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_local(&self) -> bool {
        false
    }

    fn estimated_cost(&self, tokens: usize) -> f64 {
        // Approx $0.0006 per 1k tokens for small hosted models
        (tokens as f64 / 1000.0) * 0.0006
    }

    async fn check_health(&self) -> bool {
        self.secrets.has_secret(OPENAI_API_KEY)
    }

    async fn generate(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> super::Result<String> {
        let mut last_error = LLMError::ModelNotFound(self.config.model.clone());

        for model in self.candidate_models() {
            match self.complete(model, messages, format).await {
                Ok(content) => return Ok(content),
                Err(LLMError::ModelNotFound(m)) => {
                    tracing::warn!("Model '{}' unavailable, trying next fallback", m);
                    last_error = LLMError::ModelNotFound(m);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}
