//! Workflow entry point: fan-out, aggregate, synthesize.
//!
//! ```text
//! Workflow::run(request)
//!   → Dispatcher::dispatch        all proposers, full barrier
//!   → build_aggregation_prompt    pure render of the result set
//!   → CallExecutor::execute       one synthesis call, after the barrier
//! ```
//!
//! The synthesis call goes through the same retrying executor as the
//! proposers, so a rate-limited aggregator gets the same bounded backoff.
//! It runs even when every proposer failed; the aggregator then sees a
//! list of `[no response]` markers and may still produce a degraded answer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aggregate::{build_aggregation_prompt, DEFAULT_AGGREGATOR_PREAMBLE};
use crate::client::InferenceClient;
use crate::dispatcher::Dispatcher;
use crate::error::WorkflowError;
use crate::executor::CallExecutor;
use crate::types::{CallResult, ProposerSpec, ResultSet};

// ── Request / Outcome ───────────────────────────────────────────────────────

/// Input for one workflow invocation. Each invocation owns its task,
/// proposer list, and (eventually) result set; nothing is shared across
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    /// Instruction given identically to every proposer and to the
    /// synthesis call.
    pub task: String,
    /// Ordered, non-empty proposer sequence. Position determines result
    /// position and list numbering.
    pub proposers: Vec<ProposerSpec>,
    /// Model that merges the candidate answers.
    pub aggregator_model: String,
    /// Preamble placed ahead of the numbered candidate list.
    pub aggregator_preamble: String,
}

impl WorkflowRequest {
    pub fn new(task: impl Into<String>, aggregator_model: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            proposers: Vec::new(),
            aggregator_model: aggregator_model.into(),
            aggregator_preamble: DEFAULT_AGGREGATOR_PREAMBLE.to_string(),
        }
    }

    pub fn with_proposer(mut self, spec: ProposerSpec) -> Self {
        self.proposers.push(spec);
        self
    }

    pub fn with_proposers(mut self, specs: impl IntoIterator<Item = ProposerSpec>) -> Self {
        self.proposers.extend(specs);
        self
    }

    pub fn with_aggregator_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.aggregator_preamble = preamble.into();
        self
    }
}

/// Externally visible output of one invocation: the synthesized answer
/// paired with every proposer outcome for observability.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub final_answer: String,
    pub results: ResultSet,
}

// ── Workflow ────────────────────────────────────────────────────────────────

/// Drives the two-phase dispatch-and-synthesize pipeline.
pub struct Workflow {
    executor: CallExecutor,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl Workflow {
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        let executor = CallExecutor::new(client);
        Self {
            dispatcher: Dispatcher::new(executor.clone()),
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound concurrent proposer calls. Unbounded by default.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.dispatcher = self.dispatcher.with_max_in_flight(max_in_flight);
        self
    }

    /// Attach a cancellation token covering both phases.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.dispatcher = self.dispatcher.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Run one invocation end to end.
    ///
    /// # Errors
    ///
    /// `NoProposers` for an empty proposer list, `Join` on substrate
    /// failure, `Cancelled` if the token fired, `Synthesis` if the final
    /// call failed after its own retries. Per-proposer failures do not
    /// error; they appear as failure slots in `results`.
    pub async fn run(&self, request: &WorkflowRequest) -> Result<WorkflowOutcome, WorkflowError> {
        let results = self
            .dispatcher
            .dispatch(&request.task, &request.proposers)
            .await?;
        info!(
            total = results.len(),
            succeeded = results.success_count(),
            "proposer fan-out complete"
        );

        let instruction = build_aggregation_prompt(&request.aggregator_preamble, &results);

        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let aggregator = ProposerSpec::new(&request.aggregator_model).with_system(instruction);
        let outcome = self.executor.execute(&request.task, &aggregator).await;

        match outcome.result {
            CallResult::Success(final_answer) => {
                info!(
                    model = %request.aggregator_model,
                    attempts = outcome.attempts,
                    "synthesis complete"
                );
                Ok(WorkflowOutcome {
                    final_answer,
                    results,
                })
            }
            CallResult::Failure { kind, message } => {
                error!(model = %request.aggregator_model, %kind, "synthesis failed");
                Err(WorkflowError::Synthesis { kind, message })
            }
        }
    }
}

/// Run one invocation with default settings.
pub async fn run_workflow(
    client: Arc<dyn InferenceClient>,
    request: WorkflowRequest,
) -> Result<WorkflowOutcome, WorkflowError> {
    Workflow::new(client).run(&request).await
}
