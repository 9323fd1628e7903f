//! Handoff pattern
//!
//! Exactly one agent acts at a time. After each invocation the router names
//! the next member or ends the run. Total hops are bounded by
//! `max_iterations` and each member may act at most `repeat_limit` times.

use crate::agent::{Agent, AgentResponse};
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::orchestrator::config::Pattern;
use crate::orchestrator::pattern::{last_successful_output, OrchestratorPattern, PatternOutcome, RunScope};
use crate::orchestrator::routing::{HandoffRouter, MentionRouter, Route};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Context key naming the agent currently in control
pub const CURRENT_AGENT_KEY: &str = "current_agent";
/// Context key listing every member of the handoff run
pub const AVAILABLE_AGENTS_KEY: &str = "available_agents";
/// Context key naming the agent that handed off control
pub const PREVIOUS_AGENT_KEY: &str = "previous_agent";

/// Router-driven single-agent-at-a-time execution
pub struct HandoffOrchestrator {
    max_hops: usize,
    repeat_limit: usize,
    fail_fast: bool,
    entry_agent: Option<String>,
    router: Arc<dyn HandoffRouter>,
}

impl HandoffOrchestrator {
    /// Create a handoff orchestrator bounded to `max_hops` invocations
    pub fn new(max_hops: usize, repeat_limit: usize) -> Self {
        Self {
            max_hops,
            repeat_limit,
            fail_fast: false,
            entry_agent: None,
            router: Arc::new(MentionRouter::new()),
        }
    }

    /// Set the routing policy
    pub fn with_router(mut self, router: Arc<dyn HandoffRouter>) -> Self {
        self.router = router;
        self
    }

    /// Agent that receives the task first
    pub fn with_entry_agent(mut self, entry: Option<String>) -> Self {
        self.entry_agent = entry;
        self
    }

    /// Stop on the first failed invocation
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

#[async_trait]
impl OrchestratorPattern for HandoffOrchestrator {
    async fn execute(
        &self,
        scope: &RunScope,
        members: &[Arc<Agent>],
        task: &str,
        mut context: ExecutionContext,
    ) -> PatternOutcome {
        let names: Vec<String> = members.iter().map(|a| a.name().to_string()).collect();
        context.insert(AVAILABLE_AGENTS_KEY, json!(names));

        let entry = self
            .entry_agent
            .as_deref()
            .and_then(|name| members.iter().find(|a| a.name() == name))
            .or_else(|| members.first());
        let mut current = match entry {
            Some(agent) => Arc::clone(agent),
            None => return PatternOutcome::complete(String::new(), context),
        };

        let mut responses: Vec<AgentResponse> = Vec::new();
        let mut chain: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut stop_reason: Option<Error> = None;

        loop {
            if scope.is_cancelled() {
                break;
            }

            context.insert(CURRENT_AGENT_KEY, current.name());
            let response = scope.invoke(&current, task, &context).await;
            let hop = responses.len();
            *counts.entry(current.name().to_string()).or_insert(0) += 1;
            chain.push(current.name().to_string());

            if response.is_success() {
                context.record_contribution(current.name(), &response.output);
            }
            scope.record(hop, response.clone());
            scope.set_iterations(hop + 1);
            scope.checkpoint(&context);
            responses.push(response.clone());

            if !response.is_success() && self.fail_fast {
                stop_reason = Some(Error::agent_invocation(
                    current.name(),
                    "handoff aborted after failure (fail-fast)",
                ));
                break;
            }

            let next = match self.router.route(current.name(), &response, &names) {
                Route::Stop => break,
                Route::To(next) => next,
            };
            tracing::debug!(from = %current.name(), to = %next, router = self.router.name(), "handoff");

            let Some(agent) = members.iter().find(|a| a.name() == next) else {
                stop_reason = Some(Error::not_found("agent", next));
                break;
            };
            if responses.len() >= self.max_hops {
                stop_reason = Some(Error::cycle_limit(format!(
                    "hop limit of {} reached",
                    self.max_hops
                )));
                break;
            }
            if counts.get(&next).copied().unwrap_or(0) >= self.repeat_limit {
                stop_reason = Some(Error::cycle_limit(format!(
                    "agent '{}' selected more than {} times",
                    next, self.repeat_limit
                )));
                break;
            }

            context.insert(PREVIOUS_AGENT_KEY, current.name());
            current = Arc::clone(agent);
        }

        let final_agent = responses.last().map(|r| r.agent_name.clone());
        let outcome = PatternOutcome::complete(last_successful_output(&responses), context)
            .with_extra("handoff_chain", json!(chain))
            .with_extra("final_agent", json!(final_agent))
            .with_extra("router", json!(self.router.name()));

        match stop_reason {
            Some(err) => {
                tracing::warn!(error = %err, "handoff run cut short");
                outcome.cut_short(Some(err.to_string()))
            }
            None => outcome,
        }
    }

    fn pattern(&self) -> Pattern {
        Pattern::Handoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;
    use crate::orchestrator::routing::{FixedRouter, RoundRobinRouter};

    fn agent(name: &str, simulation: Simulation) -> Arc<Agent> {
        Arc::new(Agent::builder().name(name).simulation(simulation).build().unwrap())
    }

    fn says(name: &str, text: &'static str) -> Arc<Agent> {
        agent(name, Simulation::scripted(move |_, _, _| Ok(text.to_string())))
    }

    #[tokio::test]
    async fn test_mentions_drive_the_chain() {
        let members = vec![
            says("Planner", "Plan drafted, Writer please continue"),
            says("Writer", "Draft done, over to Reviewer"),
            says("Reviewer", "Approved. Final answer attached."),
        ];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = HandoffOrchestrator::new(10, 3)
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(outcome.complete);
        assert_eq!(outcome.final_output, "Approved. Final answer attached.");
        assert_eq!(outcome.extra["handoff_chain"], json!(["Planner", "Writer", "Reviewer"]));
        assert_eq!(outcome.context.get_str(CURRENT_AGENT_KEY), Some("Reviewer"));
    }

    #[tokio::test]
    async fn test_repeat_limit_cuts_loop() {
        let members = vec![says("A", "a"), says("B", "b")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = HandoffOrchestrator::new(10, 3)
            .with_router(Arc::new(FixedRouter::new("B")))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(outcome.extra["handoff_chain"], json!(["A", "B", "B", "B"]));
        assert!(outcome.error.unwrap().contains("selected more than 3 times"));
    }

    #[tokio::test]
    async fn test_hop_limit_bounds_iterations() {
        let members = vec![says("A", "a"), says("B", "b")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = HandoffOrchestrator::new(3, 10)
            .with_router(Arc::new(RoundRobinRouter))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(scope.snapshot().iterations, 3);
        assert_eq!(outcome.final_output, "a");
    }

    #[tokio::test]
    async fn test_entry_agent_and_unknown_target() {
        let members = vec![says("A", "a"), says("B", "b")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = HandoffOrchestrator::new(10, 3)
            .with_entry_agent(Some("B".to_string()))
            .with_router(Arc::new(FixedRouter::new("Ghost")))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(outcome.final_output, "b");
        assert_eq!(scope.snapshot().responses.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_on_failure() {
        let members = vec![agent("A", Simulation::failing("down")), says("B", "b")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = HandoffOrchestrator::new(10, 3)
            .with_fail_fast(true)
            .with_router(Arc::new(FixedRouter::new("B")))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(outcome.final_output, "");
    }
}
