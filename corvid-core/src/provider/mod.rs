//! AI review client: provider trait, error classification and response
//! validation
//!
//! The provider owns its retry policy; callers see one `review` call that
//! either yields validated findings (possibly none — "no issues" is a
//! valid result) or a classified `ProviderError` once retries are spent.

mod openrouter;
mod retry;

pub use openrouter::OpenRouterProvider;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comment::Severity;
use crate::context::ReviewPayload;

/// Errors from the model endpoint, classified for retry
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// 429 from the endpoint
    #[error("rate limited by provider")]
    RateLimited,

    /// Credentials rejected
    #[error("provider authentication failed: {0}")]
    Auth(String),

    /// 5xx from the endpoint
    #[error("provider server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Non-retryable 4xx other than rate limiting
    #[error("provider rejected request {status}: {message}")]
    Request { status: u16, message: String },

    /// The call exceeded its deadline
    #[error("provider request timed out")]
    Timeout,

    /// Connection-level failure
    #[error("provider network error: {0}")]
    Network(String),

    /// The endpoint answered, but not with anything usable
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Total attempts allowed for this class of failure
    ///
    /// Rate limits back off longest; permanent rejections get one attempt.
    pub fn max_attempts(&self) -> u32 {
        match self {
            ProviderError::RateLimited => 5,
            ProviderError::Server { .. } => 3,
            ProviderError::Timeout | ProviderError::Network(_) => 2,
            ProviderError::Auth(_)
            | ProviderError::Request { .. }
            | ProviderError::Malformed(_) => 1,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.max_attempts() > 1
    }
}

/// A candidate finding returned by the model, already validated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFinding {
    /// Post-change line number
    pub line: u32,
    /// Claimed severity
    pub severity: Severity,
    /// Finding description
    pub message: String,
    /// Optional suggested fix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Optional linter rule the model claims corroboration from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_hint: Option<String>,
}

/// The model endpoint behind the review pipeline
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Review one assembled payload
    ///
    /// Returns validated findings; an empty vector means the model found
    /// nothing. Errors only when the endpoint itself cannot be used.
    async fn review(&self, payload: &ReviewPayload) -> Result<Vec<AiFinding>, ProviderError>;
}

/// Shape the model is asked to produce, deserialized leniently so one bad
/// item cannot sink the rest of the response
#[derive(Debug, Deserialize)]
pub(crate) struct RawFinding {
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, alias = "comment")]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default, alias = "rule")]
    rule_hint: Option<String>,
}

/// Validate raw model findings against the reviewed file
///
/// Drops items missing required fields, carrying unknown severity tokens
/// or pointing outside the file. Malformed output degrades, it never
/// corrupts the comment stream.
pub(crate) fn validate_findings(raw: Vec<RawFinding>, line_count: u32) -> Vec<AiFinding> {
    let mut valid = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for item in raw {
        let candidate = (|| {
            let line = item.line?;
            if line == 0 || line > u64::from(line_count) {
                return None;
            }
            let severity: Severity = item.severity?.parse().ok()?;
            let message = item.message.filter(|m| !m.trim().is_empty())?;
            Some(AiFinding {
                line: line as u32,
                severity,
                message,
                suggestion: item.suggestion,
                rule_hint: item.rule_hint,
            })
        })();

        match candidate {
            Some(finding) => valid.push(finding),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, kept = valid.len(), "Dropped malformed AI findings");
    }
    valid
}

/// Extract the first JSON array embedded in free-form model text
pub(crate) fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}
