//! Retrying call executor.
//!
//! Wraps one inference call with a bounded backoff policy for rate-limit
//! errors. The schedule is fixed at 1s, 2s, 4s (three retries after the
//! initial attempt, four attempts total), which caps worst-case single-call
//! latency. Any non-transient error returns immediately.
//!
//! The executor never raises: exhausted retries and permanent errors both
//! fold into a failure `CallOutcome`, so one proposer's trouble cannot
//! abort its siblings.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::client::{ChatMessage, CompletionRequest, InferenceClient};
use crate::types::{CallOutcome, CallResult, ProposerSpec};

/// Fixed backoff schedule between rate-limited attempts.
pub const BACKOFF_SCHEDULE: [std::time::Duration; 3] = [
    std::time::Duration::from_secs(1),
    std::time::Duration::from_secs(2),
    std::time::Duration::from_secs(4),
];

/// Executes single inference calls with bounded retry.
///
/// Cheap to clone; the underlying client is shared.
#[derive(Clone)]
pub struct CallExecutor {
    client: Arc<dyn InferenceClient>,
}

impl CallExecutor {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self { client }
    }

    /// Issue one call for `spec`, retrying rate limits per the fixed
    /// schedule. Always returns an outcome, success or failure.
    pub async fn execute(&self, task: &str, spec: &ProposerSpec) -> CallOutcome {
        // Built once; every retry reissues the identical request.
        let request = build_request(task, spec);
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.client.complete(&request).await {
                Ok(text) => {
                    debug!(model = %spec.model, attempts, "inference call succeeded");
                    return CallOutcome {
                        model: spec.model.clone(),
                        result: CallResult::Success(text),
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
                Err(err) if err.is_transient() && (attempts as usize) <= BACKOFF_SCHEDULE.len() => {
                    let delay = BACKOFF_SCHEDULE[attempts as usize - 1];
                    warn!(
                        model = %spec.model,
                        attempt = attempts,
                        delay_secs = delay.as_secs(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(model = %spec.model, attempts, error = %err, "inference call failed");
                    return CallOutcome {
                        model: spec.model.clone(),
                        result: CallResult::Failure {
                            kind: err.kind(),
                            message: err.to_string(),
                        },
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
            }
        }
    }
}

/// Message sequence for one call: optional system instruction, then the
/// task as user content. Built from inputs only.
fn build_request(task: &str, spec: &ProposerSpec) -> CompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &spec.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(task));

    CompletionRequest {
        model: spec.model.clone(),
        messages,
        temperature: spec.temperature,
        max_tokens: spec.max_tokens,
    }
}
