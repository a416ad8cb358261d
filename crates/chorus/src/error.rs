//! Error taxonomy with transient/permanent classification.
//!
//! Every error in the orchestration layer is represented here. The retry
//! policy queries `is_transient()` instead of string-matching backend
//! messages, so the executor stays decoupled from any specific transport.
//!
//! ## Classes
//!
//! | Class              | Retried | Converted to |
//! |--------------------|---------|--------------|
//! | RateLimited        | yes, bounded backoff | failure outcome on exhaustion |
//! | Auth / MissingApiKey | no    | failure outcome |
//! | InvalidRequest     | no      | failure outcome |
//! | Api (5xx)          | no      | failure outcome |
//! | Network            | no      | failure outcome |
//! | Parse              | no      | failure outcome |
//!
//! Per-proposer errors never surface as `WorkflowError`; they are folded
//! into `CallOutcome` slots. Only degenerate input, substrate failures,
//! cancellation, and a failed synthesis call abort the whole workflow.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification stored inside failure outcomes.
///
/// Collapses the error variants into the categories downstream consumers
/// care about, so a `CallOutcome` stays cheap to clone and serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    /// Transient capacity error. Expected to clear if the identical request
    /// is retried after a delay.
    RateLimited,
    /// Credentials missing or rejected.
    Auth,
    /// The request itself was malformed. Retrying cannot succeed.
    InvalidRequest,
    /// Non-retryable backend error (5xx class).
    Api,
    /// Transport-level failure (DNS, connect, timeout).
    Network,
    /// The backend replied, but not in the expected shape.
    Parse,
}

impl CallErrorKind {
    /// Only the rate-limit class is worth retrying with backoff.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Auth => write!(f, "auth"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Api => write!(f, "api"),
            Self::Network => write!(f, "network"),
            Self::Parse => write!(f, "parse"),
        }
    }
}

/// Error from a single inference call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Backend signalled a rate limit (HTTP 429 class).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The named API key environment variable is not set.
    #[error("API key not configured ({0})")]
    MissingApiKey(String),

    /// Credentials were rejected by the backend.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The backend rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Permanent backend error.
    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected schema.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl CallError {
    /// Classify this error for retry logic and failure outcomes.
    pub fn kind(&self) -> CallErrorKind {
        match self {
            Self::RateLimited(_) => CallErrorKind::RateLimited,
            Self::MissingApiKey(_) | Self::Auth(_) => CallErrorKind::Auth,
            Self::InvalidRequest(_) => CallErrorKind::InvalidRequest,
            Self::Api { .. } => CallErrorKind::Api,
            Self::Network(_) => CallErrorKind::Network,
            Self::Parse(_) => CallErrorKind::Parse,
        }
    }

    /// Returns `true` if the executor may retry after this error.
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

/// Workflow-level failure.
///
/// These are the only conditions that abort an invocation; everything a
/// single proposer does wrong stays inside its `CallOutcome` slot.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The proposer list was empty. Nothing to dispatch, nothing to aggregate.
    #[error("no proposers configured, nothing to dispatch")]
    NoProposers,

    /// The concurrency substrate failed (a worker task panicked or was
    /// aborted outside our control). Environment failure, not a per-call one.
    #[error("proposer task failed to join: {0}")]
    Join(String),

    /// The caller cancelled the invocation before the barrier or the
    /// synthesis call completed.
    #[error("workflow cancelled before completion")]
    Cancelled,

    /// The synthesis call failed after exhausting its own retries.
    #[error("synthesis call failed ({kind}): {message}")]
    Synthesis {
        kind: CallErrorKind,
        message: String,
    },
}
