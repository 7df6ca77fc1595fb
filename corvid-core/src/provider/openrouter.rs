//! OpenRouter chat-completions client
//!
//! Speaks the OpenAI-compatible chat endpoint, classifies HTTP failures
//! into [`ProviderError`] and applies the shared retry policy. Model output
//! is free-form text containing a JSON array of findings; the array is
//! extracted and validated before anything reaches the merger.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    extract_json_array, validate_findings, AiFinding, AiProvider, ProviderError, RawFinding,
    RetryPolicy,
};
use crate::config::ModelConfig;
use crate::context::ReviewPayload;

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Client for an OpenRouter-style model endpoint
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenRouterProvider {
    /// Build a provider from the model configuration and an API key
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: config.name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryPolicy::default(),
        })
    }

    /// Point the client at a different endpoint (tests, proxies)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Override the retry schedule
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One request against the endpoint; returns the completion text
    async fn request_once(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://github.com/corvid-review/corvid")
            .header("X-Title", "corvid code review")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = message.chars().take(200).collect::<String>();
            return Err(classify_status(status.as_u16(), message));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid response JSON: {}", e)))?;

        value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::Malformed("response carries no completion content".into())
            })
    }
}

#[async_trait]
impl AiProvider for OpenRouterProvider {
    async fn review(&self, payload: &ReviewPayload) -> Result<Vec<AiFinding>, ProviderError> {
        let prompt = payload.to_prompt();
        tracing::debug!(
            path = %payload.path,
            model = %self.model,
            prompt_chars = prompt.len(),
            "Requesting AI review"
        );

        let content = self
            .retry
            .run(&payload.path, || self.request_once(&prompt))
            .await?;

        let array = extract_json_array(&content).ok_or_else(|| {
            ProviderError::Malformed("completion contains no JSON findings array".into())
        })?;

        let raw: Vec<RawFinding> = serde_json::from_str(array)
            .map_err(|e| ProviderError::Malformed(format!("findings array unparseable: {}", e)))?;

        let findings = validate_findings(raw, payload.line_count);
        tracing::debug!(path = %payload.path, findings = findings.len(), "AI review received");
        Ok(findings)
    }
}

/// Classify reqwest transport errors
fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Classify an HTTP status into the retry taxonomy
fn classify_status(status: u16, message: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited,
        401 | 403 => ProviderError::Auth(message),
        500..=599 => ProviderError::Server { status, message },
        _ => ProviderError::Request { status, message },
    }
}
