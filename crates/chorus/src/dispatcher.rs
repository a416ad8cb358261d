//! Parallel dispatcher: fan-out to the executor, fan-in at a full barrier.
//!
//! One `JoinSet` task per proposer, all concurrent, none blocking on a
//! sibling. Outcomes land in their spawn-index slot, so the returned
//! `ResultSet` lines up with the proposer list no matter which call
//! finishes first. The dispatch is a full barrier: partial result sets are
//! never returned.
//!
//! An optional semaphore bounds in-flight calls when proposer counts are
//! large, and an optional cancellation token aborts the whole barrier.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::WorkflowError;
use crate::executor::CallExecutor;
use crate::types::{CallOutcome, ProposerSpec, ResultSet};

/// Fans one task out to every proposer and collects all outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    executor: CallExecutor,
    max_in_flight: Option<usize>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(executor: CallExecutor) -> Self {
        Self {
            executor,
            max_in_flight: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Cap concurrent in-flight calls. Unbounded by default.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight.max(1));
        self
    }

    /// Attach a cancellation token. Cancelling it aborts every in-flight
    /// call and fails the dispatch; no partial result set escapes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Dispatch `task` to every proposer concurrently and wait for all of
    /// them to reach a terminal outcome.
    ///
    /// # Errors
    ///
    /// - `NoProposers` if `specs` is empty (nothing to aggregate).
    /// - `Join` if a worker task panicked (substrate failure).
    /// - `Cancelled` if the token fired before the barrier completed.
    pub async fn dispatch(
        &self,
        task: &str,
        specs: &[ProposerSpec],
    ) -> Result<ResultSet, WorkflowError> {
        if specs.is_empty() {
            return Err(WorkflowError::NoProposers);
        }

        let task: Arc<str> = Arc::from(task);
        let semaphore = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let mut join_set: JoinSet<(usize, CallOutcome)> = JoinSet::new();

        for (index, spec) in specs.iter().cloned().enumerate() {
            let executor = self.executor.clone();
            let task = Arc::clone(&task);
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let _permit = match semaphore {
                    Some(s) => Some(s.acquire_owned().await.expect("semaphore closed")),
                    None => None,
                };
                (index, executor.execute(&task, &spec).await)
            });
        }

        // Fan-in barrier. Slots keep outcomes aligned with spawn order.
        let mut slots: Vec<Option<CallOutcome>> = specs.iter().map(|_| None).collect();
        loop {
            tokio::select! {
                // Cancellation wins when both branches are ready, so a
                // pre-cancelled token never leaks a completed barrier.
                biased;
                () = self.cancel.cancelled() => {
                    join_set.abort_all();
                    info!(total = specs.len(), "dispatch cancelled, aborting in-flight calls");
                    return Err(WorkflowError::Cancelled);
                }
                joined = join_set.join_next() => match joined {
                    None => break,
                    Some(Ok((index, outcome))) => {
                        debug!(
                            model = %outcome.model,
                            index,
                            success = outcome.is_success(),
                            attempts = outcome.attempts,
                            "proposer call finished"
                        );
                        slots[index] = Some(outcome);
                    }
                    Some(Err(e)) => {
                        join_set.abort_all();
                        return Err(WorkflowError::Join(e.to_string()));
                    }
                },
            }
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(outcome) => outcomes.push(outcome),
                None => {
                    return Err(WorkflowError::Join(format!(
                        "proposer {index} produced no outcome"
                    )))
                }
            }
        }

        Ok(ResultSet::from_outcomes(outcomes))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::client::{CompletionRequest, InferenceClient};
    use crate::error::{CallError, CallErrorKind};

    /// Answers after a per-model delay, echoing the model name.
    struct LatencyClient {
        delays_ms: HashMap<String, u64>,
    }

    #[async_trait]
    impl InferenceClient for LatencyClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError> {
            let delay = self.delays_ms.get(&request.model).copied().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(format!("answer from {}", request.model))
        }
    }

    /// Fails for one designated model, succeeds for the rest.
    struct OneBadApple {
        bad_model: String,
    }

    #[async_trait]
    impl InferenceClient for OneBadApple {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError> {
            if request.model == self.bad_model {
                Err(CallError::InvalidRequest("unknown model".into()))
            } else {
                Ok(format!("ok from {}", request.model))
            }
        }
    }

    /// Records peak observed concurrency.
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InferenceClient for ConcurrencyProbe {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CallError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".into())
        }
    }

    fn specs(models: &[&str]) -> Vec<ProposerSpec> {
        models.iter().map(|m| ProposerSpec::new(*m)).collect()
    }

    fn dispatcher(client: impl InferenceClient + 'static) -> Dispatcher {
        Dispatcher::new(CallExecutor::new(Arc::new(client)))
    }

    #[tokio::test]
    async fn empty_proposer_list_is_rejected() {
        let d = dispatcher(LatencyClient {
            delays_ms: HashMap::new(),
        });
        let err = d.dispatch("task", &[]).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoProposers));
    }

    #[tokio::test(start_paused = true)]
    async fn result_set_length_matches_proposer_count() {
        let d = dispatcher(LatencyClient {
            delays_ms: HashMap::new(),
        });
        let results = d.dispatch("task", &specs(&["a", "b", "c", "d"])).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results.success_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_align_with_spec_order_despite_latency() {
        // Later proposers finish first; slots must still line up.
        let delays_ms = HashMap::from([
            ("m0".to_string(), 300),
            ("m1".to_string(), 200),
            ("m2".to_string(), 100),
        ]);
        let d = dispatcher(LatencyClient { delays_ms });

        let results = d.dispatch("task", &specs(&["m0", "m1", "m2"])).await.unwrap();

        for (i, expected) in ["m0", "m1", "m2"].iter().enumerate() {
            let outcome = results.get(i).unwrap();
            assert_eq!(outcome.model, *expected);
            assert_eq!(outcome.text(), Some(format!("answer from {expected}").as_str()));
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let d = dispatcher(OneBadApple {
            bad_model: "m1".into(),
        });

        let results = d.dispatch("task", &specs(&["m0", "m1", "m2"])).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.get(0).unwrap().is_success());
        assert!(results.get(2).unwrap().is_success());
        let (kind, _) = results.get(1).unwrap().failure().unwrap();
        assert_eq!(kind, CallErrorKind::InvalidRequest);
    }

    #[tokio::test(start_paused = true)]
    async fn max_in_flight_bounds_concurrency() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let d = Dispatcher::new(CallExecutor::new(probe.clone() as Arc<dyn InferenceClient>))
            .with_max_in_flight(2);

        let results = d
            .dispatch("task", &specs(&["a", "b", "c", "d", "e", "f"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 6);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_the_barrier() {
        let delays_ms = HashMap::from([
            ("slow0".to_string(), 60_000),
            ("slow1".to_string(), 60_000),
        ]);
        let cancel = CancellationToken::new();
        let d = dispatcher(LatencyClient { delays_ms }).with_cancellation(cancel.clone());

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = d
            .dispatch("task", &specs(&["slow0", "slow1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled));
    }

    /// Scripted per-model failure sequences, shared across concurrent calls.
    struct PerModelScript {
        scripts: Mutex<HashMap<String, Vec<Result<String, CallError>>>>,
    }

    #[async_trait]
    impl InferenceClient for PerModelScript {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CallError> {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts.entry(request.model.clone()).or_default();
            if queue.is_empty() {
                Ok(format!("default from {}", request.model))
            } else {
                queue.remove(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_proposer_recovers_while_siblings_run() {
        let scripts = Mutex::new(HashMap::from([(
            "flaky".to_string(),
            vec![
                Err(CallError::RateLimited("busy".into())),
                Err(CallError::RateLimited("busy".into())),
                Ok("recovered".to_string()),
            ],
        )]));
        let d = dispatcher(PerModelScript { scripts });

        let results = d
            .dispatch("task", &specs(&["steady", "flaky"]))
            .await
            .unwrap();

        assert_eq!(results.success_count(), 2);
        let flaky = results.get(1).unwrap();
        assert_eq!(flaky.text(), Some("recovered"));
        assert_eq!(flaky.attempts, 3);
    }
}
