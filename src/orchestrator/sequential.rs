//! Sequential orchestrator pattern
//!
//! Agents execute in registration order. Each successful output becomes the
//! input of the next agent and is merged into the carried context, so later
//! agents see everything produced before them.

use crate::agent::{Agent, AgentResponse};
use crate::context::ExecutionContext;
use crate::orchestrator::config::{labeled_join, Pattern, SequentialOutput};
use crate::orchestrator::pattern::{last_successful_output, OrchestratorPattern, PatternOutcome, RunScope};
use async_trait::async_trait;
use std::sync::Arc;

/// Sequential orchestrator - agents execute in order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialOrchestrator {
    fail_fast: bool,
    output: SequentialOutput,
}

impl SequentialOrchestrator {
    /// Create a new sequential orchestrator
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort on the first failed agent
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set how the final output is derived
    pub fn with_output(mut self, output: SequentialOutput) -> Self {
        self.output = output;
        self
    }
}

#[async_trait]
impl OrchestratorPattern for SequentialOrchestrator {
    async fn execute(
        &self,
        scope: &RunScope,
        members: &[Arc<Agent>],
        task: &str,
        mut context: ExecutionContext,
    ) -> PatternOutcome {
        let mut responses: Vec<AgentResponse> = Vec::with_capacity(members.len());
        let mut current_input = task.to_string();
        let mut aborted = false;

        for (slot, agent) in members.iter().enumerate() {
            if scope.is_cancelled() {
                break;
            }

            let response = scope.invoke(agent, &current_input, &context).await;
            if response.is_success() {
                context.record_contribution(agent.name(), &response.output);
                current_input = response.output.clone();
            } else {
                context.insert(ExecutionContext::output_key(agent.name()), "");
            }

            scope.record(slot, response.clone());
            scope.set_iterations(slot + 1);
            scope.checkpoint(&context);

            let failed = !response.is_success();
            responses.push(response);
            if failed && self.fail_fast {
                tracing::warn!(agent = %agent.name(), "sequential run aborted (fail-fast)");
                aborted = true;
                break;
            }
        }

        let final_output = match self.output {
            SequentialOutput::Last => last_successful_output(&responses),
            SequentialOutput::Aggregate => labeled_join(responses.iter().filter(|r| r.is_success())),
        };

        let outcome = PatternOutcome::complete(final_output, context)
            .with_extra("output_mode", serde_json::json!(format!("{:?}", self.output)));
        if aborted {
            outcome.cut_short(Some("aborted after agent failure (fail-fast)".to_string()))
        } else {
            outcome
        }
    }

    fn pattern(&self) -> Pattern {
        Pattern::Sequential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;

    fn agent(name: &str, simulation: Simulation) -> Arc<Agent> {
        Arc::new(Agent::builder().name(name).simulation(simulation).build().unwrap())
    }

    fn echo(name: &str) -> Arc<Agent> {
        agent(
            name,
            Simulation::scripted(|task, _, name| Ok(format!("{}+{}", task, name))),
        )
    }

    #[tokio::test]
    async fn test_outputs_chain_through_agents() {
        let members = vec![echo("A"), echo("B"), echo("C")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = SequentialOrchestrator::new()
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(outcome.complete);
        assert_eq!(outcome.final_output, "t+A+B+C");
        assert_eq!(outcome.context.contributors(), vec!["A", "B", "C"]);
        assert_eq!(scope.snapshot().iterations, 3);
    }

    #[tokio::test]
    async fn test_failure_substitutes_empty_contribution() {
        let members = vec![echo("A"), agent("B", Simulation::failing("down")), echo("C")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = SequentialOrchestrator::new()
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(outcome.complete);
        assert_eq!(outcome.final_output, "t+A+C");
        assert_eq!(outcome.context.get_str("b_output"), Some(""));
        assert_eq!(scope.snapshot().responses.len(), 3);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_immediately() {
        let members = vec![echo("A"), agent("B", Simulation::failing("down")), echo("C")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = SequentialOrchestrator::new()
            .with_fail_fast(true)
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(outcome.final_output, "t+A");
        assert_eq!(scope.snapshot().responses.len(), 2);
    }

    #[tokio::test]
    async fn test_aggregate_mode_concatenates() {
        let members = vec![echo("A"), echo("B")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = SequentialOrchestrator::new()
            .with_output(SequentialOutput::Aggregate)
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert_eq!(outcome.final_output, "## A\n\nt+A\n\n---\n\n## B\n\nt+A+B");
    }
}
