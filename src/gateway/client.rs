//! Retrying HTTP client for the model endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::clean::clean_response;
use super::error::{GatewayError, GatewayResult};
use super::protocol::{ChatMessage, ChatRequest, ChatResponse};
use crate::config::ModelSettings;

/// System instruction sent with every extraction prompt.
const SYSTEM_INSTRUCTION: &str = "You are a SQL analysis expert. Output ONLY valid YAML. \
    NO explanations, NO thinking, NO tags, NO markdown formatting. \
    DO NOT use <think> tags. DO NOT explain your reasoning.";

/// A single request/response exchange with the language model.
///
/// `call` performs up to `max_retries` attempts with `2^attempt` seconds of
/// backoff between them; after all attempts fail it returns an empty string
/// rather than an error, so callers treat "no answer" uniformly. Every
/// successful raw response is cleaned before being returned.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn call(&self, prompt: &str) -> String;
}

/// Gateway backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGateway {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiGateway {
    /// Build a gateway from model settings, resolving the API key from the
    /// configured environment variable.
    pub fn from_settings(settings: &ModelSettings) -> GatewayResult<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| GatewayError::MissingApiKey(settings.api_key_env.clone()))?;
        let endpoint = settings
            .resolved_endpoint()
            .map_err(|err| GatewayError::InvalidEndpoint(err.to_string()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries,
        })
    }

    /// One attempt against the endpoint.
    async fn try_call(&self, prompt: &str) -> GatewayResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_INSTRUCTION),
                ChatMessage::user(prompt),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GatewayError::EmptyCompletion);
        }
        Ok(content)
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn call(&self, prompt: &str) -> String {
        for attempt in 0..self.max_retries {
            debug!(attempt = attempt + 1, max = self.max_retries, "model request");

            match self.try_call(prompt).await {
                Ok(raw) => {
                    let cleaned = clean_response(raw.trim());
                    if cleaned.is_empty() {
                        debug!("response contained no usable YAML");
                        return String::new();
                    }
                    debug!(bytes = cleaned.len(), "model request succeeded");
                    return cleaned;
                }
                Err(err) => {
                    warn!(attempt = attempt + 1, error = %err, "model request failed");
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    }
                }
            }
        }

        warn!(retries = self.max_retries, "model request exhausted retries");
        String::new()
    }
}
