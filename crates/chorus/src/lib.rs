//! Parallel multi-model prompting with single-pass answer synthesis.
//!
//! Fans one task out to N proposer models concurrently, collects every
//! outcome in proposer order, then asks an aggregator model to merge the
//! candidate answers into a single refined reply.
//!
//! ```text
//! Phase 1: Fan-out
//!   JoinSet::spawn(executor, proposer_i) × N concurrent calls
//!
//! Phase 2: Barrier
//!   ResultSet[i] ← outcome of proposer_i (success or failure marker)
//!
//! Phase 3: Fan-in
//!   aggregator(preamble + numbered candidates, task) → final answer
//! ```
//!
//! ## Partial failure policy
//!
//! A proposer that keeps hitting rate limits or fails outright never aborts
//! its siblings. Its slot in the result set is an explicit failure marker,
//! and the aggregator still runs over the full, position-aligned list.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chorus::{ClientConfig, OpenAiClient, ProposerSpec, Workflow, WorkflowRequest};
//!
//! let client = Arc::new(OpenAiClient::new(ClientConfig::from_env()?)?);
//! let request = WorkflowRequest::new("What is 7 * 8?", "gpt-4o")
//!     .with_proposer(ProposerSpec::new("llama-3.1-70b"))
//!     .with_proposer(ProposerSpec::new("qwen-2.5-72b"));
//!
//! let outcome = Workflow::new(client).run(&request).await?;
//! println!("{}", outcome.final_answer);
//! ```

pub mod aggregate;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod types;
pub mod workflow;

// Re-export the prompt-building surface
pub use aggregate::{build_aggregation_prompt, DEFAULT_AGGREGATOR_PREAMBLE, NO_RESPONSE_MARKER};

// Re-export the inference-client boundary
pub use client::{
    ChatMessage, ClientConfig, CompletionRequest, InferenceClient, OpenAiClient, Role,
};

// Re-export key orchestration types
pub use dispatcher::Dispatcher;
pub use error::{CallError, CallErrorKind, WorkflowError};
pub use executor::{CallExecutor, BACKOFF_SCHEDULE};
pub use types::{CallOutcome, CallResult, ProposerSpec, ResultSet};
pub use workflow::{run_workflow, Workflow, WorkflowOutcome, WorkflowRequest};
