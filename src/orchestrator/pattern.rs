//! Orchestrator pattern trait, run scope and result types

use crate::agent::{Agent, AgentResponse};
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::orchestrator::config::Pattern;
use crate::types::{RunId, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Output of an orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Unique run identifier
    pub run_id: RunId,
    /// Orchestrator that ran
    pub orchestrator: String,
    /// Pattern used
    pub pattern: Pattern,
    /// Agent responses in registration (or round/hop) order
    pub responses: Vec<AgentResponse>,
    /// Consolidated output
    pub final_output: String,
    /// Overall status
    pub status: RunStatus,
    /// Total wall-clock time
    pub elapsed_ms: u64,
    /// Rounds (group), hops (handoff), invocations (sequential) or 1 (concurrent)
    pub iterations: usize,
    /// Final carried context
    pub context: ExecutionContext,
    /// Why the run was cut short, if it was
    pub error: Option<String>,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// Pattern-specific data
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OrchestrationResult {
    /// Number of successful responses
    pub fn successes(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed responses
    pub fn failures(&self) -> usize {
        self.responses.len() - self.successes()
    }

    /// Responses produced by one agent
    pub fn responses_from<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a AgentResponse> + 'a {
        self.responses.iter().filter(move |r| r.agent_name == agent)
    }

    /// Order in which agents responded
    pub fn agent_order(&self) -> Vec<&str> {
        self.responses.iter().map(|r| r.agent_name.as_str()).collect()
    }
}

/// What a pattern reports when it finishes on its own
#[derive(Debug, Clone)]
pub struct PatternOutcome {
    /// Pattern-derived final output
    pub final_output: String,
    /// Final carried context
    pub context: ExecutionContext,
    /// False when the pattern stopped before its natural end
    pub complete: bool,
    /// Reason for an early stop
    pub error: Option<String>,
    /// Pattern-specific data
    pub extra: HashMap<String, serde_json::Value>,
}

impl PatternOutcome {
    /// A run that reached its natural end
    pub fn complete(final_output: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            final_output: final_output.into(),
            context,
            complete: true,
            error: None,
            extra: HashMap::new(),
        }
    }

    /// Mark the run as cut short
    pub fn cut_short(mut self, reason: Option<String>) -> Self {
        self.complete = false;
        self.error = reason;
        self
    }

    /// Add extra metadata
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Progress {
    pub responses: Vec<(usize, AgentResponse)>,
    pub iterations: usize,
    pub context: ExecutionContext,
}

impl Progress {
    /// Responses ordered by slot
    pub fn ordered_responses(&self) -> Vec<AgentResponse> {
        let mut slotted = self.responses.clone();
        slotted.sort_by_key(|(slot, _)| *slot);
        slotted.into_iter().map(|(_, r)| r).collect()
    }
}

/// Per-run bookkeeping shared between a pattern and its caller
///
/// Patterns record every response here as soon as it arrives, so the partial
/// result survives if the run is cut off by the time budget. Slots give each
/// response its position in the final list independent of completion order.
pub struct RunScope {
    cancel: CancellationToken,
    permits: Option<Arc<Semaphore>>,
    progress: Mutex<Progress>,
}

impl RunScope {
    /// Create a scope seeded with the initial context
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            cancel: CancellationToken::new(),
            permits: None,
            progress: Mutex::new(Progress {
                context,
                ..Progress::default()
            }),
        }
    }

    /// Bound simultaneous invocations with a shared semaphore
    pub fn with_permits(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    /// Signal in-flight invocations to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Invoke an agent under this run's cancellation token and permit pool
    pub async fn invoke(&self, agent: &Agent, task: &str, context: &ExecutionContext) -> AgentResponse {
        let _permit = match &self.permits {
            Some(permits) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let err = Error::agent_invocation(agent.name(), "invocation cancelled");
                    return AgentResponse::failure(agent.name(), err.to_string(), 0);
                }
                permit = permits.acquire() => permit.ok(),
            },
            None => None,
        };
        agent.invoke_cancellable(task, context, &self.cancel).await
    }

    /// Record a response at its slot
    pub fn record(&self, slot: usize, response: AgentResponse) {
        self.progress.lock().responses.push((slot, response));
    }

    /// Update the iteration counter
    pub fn set_iterations(&self, iterations: usize) {
        self.progress.lock().iterations = iterations;
    }

    /// Save the carried context so it survives a timeout
    pub fn checkpoint(&self, context: &ExecutionContext) {
        self.progress.lock().context = context.clone();
    }

    pub(crate) fn snapshot(&self) -> Progress {
        self.progress.lock().clone()
    }
}

/// Trait for orchestrator patterns
///
/// Implementations never fail: agent faults arrive as failed
/// [`AgentResponse`]s and are reflected in the outcome.
#[async_trait]
pub trait OrchestratorPattern: Send + Sync {
    /// Execute the pattern over the resolved members
    async fn execute(
        &self,
        scope: &RunScope,
        members: &[Arc<Agent>],
        task: &str,
        context: ExecutionContext,
    ) -> PatternOutcome;

    /// Get the pattern this strategy implements
    fn pattern(&self) -> Pattern;
}

/// Last successful output, or empty when nothing succeeded
pub(crate) fn last_successful_output(responses: &[AgentResponse]) -> String {
    responses
        .iter()
        .rev()
        .find(|r| r.is_success())
        .map(|r| r.output.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;

    #[test]
    fn test_progress_orders_by_slot() {
        let scope = RunScope::new(ExecutionContext::new());
        scope.record(2, AgentResponse::success("C", "c", 1));
        scope.record(0, AgentResponse::success("A", "a", 1));
        scope.record(1, AgentResponse::failure("B", "b", 1));

        let ordered = scope.snapshot().ordered_responses();
        let names: Vec<_> = ordered.iter().map(|r| r.agent_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(last_successful_output(&ordered), "c");
    }

    #[tokio::test]
    async fn test_cancelled_scope_skips_permit_wait() {
        let permits = Arc::new(Semaphore::new(1));
        let _held = permits.clone().acquire_owned().await.unwrap();
        let scope = RunScope::new(ExecutionContext::new()).with_permits(permits);
        scope.cancel();

        let agent = Agent::builder()
            .name("Waiter")
            .simulation(Simulation::respond())
            .build()
            .unwrap();
        let response = scope.invoke(&agent, "task", &ExecutionContext::new()).await;
        assert!(!response.is_success());
        assert_eq!(agent.stats().calls, 0);
    }
}
