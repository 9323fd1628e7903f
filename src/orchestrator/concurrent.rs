//! Concurrent orchestrator pattern
//!
//! All agents receive the same task and a read-only snapshot of the context
//! and execute in parallel. Results are joined behind a barrier and
//! aggregated according to the configured strategy.

use crate::agent::Agent;
use crate::context::ExecutionContext;
use crate::orchestrator::config::{AggregationStrategy, Pattern};
use crate::orchestrator::pattern::{OrchestratorPattern, PatternOutcome, RunScope};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Concurrent orchestrator - parallel execution with aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentOrchestrator {
    aggregation: AggregationStrategy,
}

impl ConcurrentOrchestrator {
    /// Create a new concurrent orchestrator
    pub fn new() -> Self {
        Self::default()
    }

    /// Set aggregation strategy
    pub fn with_aggregation(mut self, strategy: AggregationStrategy) -> Self {
        self.aggregation = strategy;
        self
    }
}

#[async_trait]
impl OrchestratorPattern for ConcurrentOrchestrator {
    async fn execute(
        &self,
        scope: &RunScope,
        members: &[Arc<Agent>],
        task: &str,
        mut context: ExecutionContext,
    ) -> PatternOutcome {
        let snapshot = context.clone();

        // join_all yields in input order, which is registration order
        let futures: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(slot, agent)| {
                let snapshot = &snapshot;
                async move {
                    let response = scope.invoke(agent, task, snapshot).await;
                    scope.record(slot, response.clone());
                    response
                }
            })
            .collect();
        let responses = join_all(futures).await;

        for response in responses.iter().filter(|r| r.is_success()) {
            context.record_contribution(&response.agent_name, &response.output);
        }
        scope.set_iterations(1);
        scope.checkpoint(&context);

        let failed = responses.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            tracing::warn!(failed, total = responses.len(), "concurrent run finished with failures");
        }

        let final_output = self.aggregation.aggregate(&responses);
        PatternOutcome::complete(final_output, context)
            .with_extra("aggregation", serde_json::json!(self.aggregation))
    }

    fn pattern(&self) -> Pattern {
        Pattern::Concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;
    use std::time::Duration;

    fn slow(name: &str, ms: u64) -> Arc<Agent> {
        Arc::new(
            Agent::builder()
                .name(name)
                .simulation(
                    Simulation::scripted(|_, _, name| Ok(name.to_lowercase()))
                        .with_latency(Duration::from_millis(ms)),
                )
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_results_follow_registration_order() {
        let members = vec![slow("A", 30), slow("B", 10), slow("C", 20)];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = ConcurrentOrchestrator::new()
            .with_aggregation(AggregationStrategy::Merge)
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert_eq!(outcome.final_output, "a\nb\nc");
        assert_eq!(outcome.context.contributors(), vec!["A", "B", "C"]);

        let names: Vec<_> = scope
            .snapshot()
            .ordered_responses()
            .into_iter()
            .map(|r| r.agent_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_runs_in_parallel() {
        let members = vec![slow("A", 60), slow("B", 60), slow("C", 60)];
        let scope = RunScope::new(ExecutionContext::new());
        let start = std::time::Instant::now();
        ConcurrentOrchestrator::new()
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(start.elapsed() < Duration::from_millis(170));
    }
}
