//! Remote inference boundary.
//!
//! The orchestration core only depends on the `InferenceClient` trait and
//! the transient/permanent classification of its errors. `OpenAiClient` is
//! the production implementation speaking the OpenAI-compatible
//! chat-completions wire format over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CallError;

/// Default endpoint for `OpenAiClient` when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ── Messages ────────────────────────────────────────────────────────────────

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
}

/// One message in the conversation sent to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A fully-formed inference request. Immutable once built; the executor
/// reissues the identical request on every retry attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

// ── Client trait ────────────────────────────────────────────────────────────

/// Contract for the remote inference backend.
///
/// Implementations must map backend failures onto `CallError` so the retry
/// policy can distinguish rate limits from permanent errors without knowing
/// the transport.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Issue one atomic request/response inference call.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError>;
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Immutable client configuration, owned by the caller and passed into the
/// client constructor. No process-wide key state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Load from `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional).
    pub fn from_env() -> Result<Self, CallError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CallError::MissingApiKey("OPENAI_API_KEY".to_string()))?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(api_key, base_url))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ── OpenAI-compatible client ────────────────────────────────────────────────

/// reqwest-backed client for OpenAI-compatible chat-completions endpoints.
///
/// The connection pool is shared read-only across all concurrent proposer
/// calls; each call is a fully independent request.
pub struct OpenAiClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self, CallError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CallError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn classify_status(status: u16, message: String) -> CallError {
        match status {
            429 => CallError::RateLimited(message),
            401 | 403 => CallError::Auth(message),
            s if (400..500).contains(&s) => CallError::InvalidRequest(format!("{s}: {message}")),
            s => CallError::Api { status: s, message },
        }
    }
}

#[async_trait]
impl InferenceClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), message));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallError::Parse(e.to_string()))?;

        resp_json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                CallError::Parse("missing choices[0].message.content in response".to_string())
            })
    }
}
