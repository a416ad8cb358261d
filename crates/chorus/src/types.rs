//! Domain types for the fan-out/fan-in pipeline.
//!
//! | Type           | Produced by        | Consumed by                  |
//! |----------------|--------------------|------------------------------|
//! | `ProposerSpec` | Caller             | Executor (one call each)     |
//! | `CallOutcome`  | Retrying executor  | `ResultSet`, prompt builder  |
//! | `ResultSet`    | Parallel dispatcher| Prompt builder, caller       |
//!
//! `ResultSet` is index-aligned 1:1 with the proposer sequence that produced
//! it: the outcome at position i always belongs to proposer i, regardless of
//! completion order.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CallErrorKind;

// ── ProposerSpec ────────────────────────────────────────────────────────────

/// One model to query, plus its per-call parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerSpec {
    /// Model identifier understood by the inference backend.
    pub model: String,
    /// Sampling temperature for this call.
    pub temperature: f64,
    /// Output size cap for this call.
    pub max_tokens: u32,
    /// Optional system instruction prepended to the task.
    pub system: Option<String>,
}

impl ProposerSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: 512,
            system: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

// ── CallOutcome ─────────────────────────────────────────────────────────────

/// Terminal result of one inference call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResult {
    /// The model replied.
    Success(String),
    /// The call failed permanently or exhausted its retries.
    Failure {
        kind: CallErrorKind,
        message: String,
    },
}

/// One proposer's outcome, created when its retrying call finishes and
/// never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    /// Model that was queried.
    pub model: String,
    /// Success payload or failure marker.
    pub result: CallResult,
    /// Total request attempts issued (1 on first-try success, up to 4).
    pub attempts: u32,
    /// Wall-clock time spent, backoff waits included.
    pub elapsed: Duration,
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, CallResult::Success(_))
    }

    /// Response text, if the call succeeded.
    pub fn text(&self) -> Option<&str> {
        match &self.result {
            CallResult::Success(text) => Some(text),
            CallResult::Failure { .. } => None,
        }
    }

    /// Failure classification and message, if the call failed.
    pub fn failure(&self) -> Option<(CallErrorKind, &str)> {
        match &self.result {
            CallResult::Success(_) => None,
            CallResult::Failure { kind, message } => Some((*kind, message.as_str())),
        }
    }
}

// ── ResultSet ───────────────────────────────────────────────────────────────

/// Ordered outcomes from one fan-out, index-aligned with the proposer list.
///
/// Every dispatched call contributes exactly one slot, success or failure;
/// outcomes are never silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    outcomes: Vec<CallOutcome>,
}

impl ResultSet {
    pub fn from_outcomes(outcomes: Vec<CallOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CallOutcome> {
        self.outcomes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallOutcome> {
        self.outcomes.iter()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}
