//! Group collaboration pattern
//!
//! Members contribute in rounds. Within a round every member runs
//! concurrently against the transcript as it stood when the round began;
//! the round is joined before the next one starts. After each round the
//! convergence policy decides whether to stop, bounded by `max_iterations`.

use crate::agent::{Agent, AgentResponse};
use crate::context::{ExecutionContext, TRANSCRIPT_KEY};
use crate::orchestrator::config::Pattern;
use crate::orchestrator::convergence::{ConvergencePolicy, KeywordConvergence};
use crate::orchestrator::pattern::{last_successful_output, OrchestratorPattern, PatternOutcome, RunScope};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;

/// Round-based collaboration over a shared append-only transcript
pub struct GroupOrchestrator {
    max_rounds: usize,
    fail_fast: bool,
    closer: Option<String>,
    convergence: Arc<dyn ConvergencePolicy>,
}

impl GroupOrchestrator {
    /// Create a group orchestrator bounded to `max_rounds`
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds,
            fail_fast: false,
            closer: None,
            convergence: Arc::new(KeywordConvergence::new(["final answer", "concluded"])),
        }
    }

    /// Set the convergence policy
    pub fn with_convergence(mut self, policy: Arc<dyn ConvergencePolicy>) -> Self {
        self.convergence = policy;
        self
    }

    /// Member whose final-round output becomes the result
    pub fn with_closer(mut self, closer: Option<String>) -> Self {
        self.closer = closer;
        self
    }

    /// Stop after any round containing a failure
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    fn final_output(&self, members: &[Arc<Agent>], round: &[AgentResponse], all: &[AgentResponse]) -> String {
        let closer = self
            .closer
            .as_deref()
            .or_else(|| members.last().map(|a| a.name()));
        closer
            .and_then(|name| round.iter().find(|r| r.agent_name == name && r.is_success()))
            .map(|r| r.output.clone())
            .filter(|out| !out.is_empty())
            .unwrap_or_else(|| {
                let in_round = last_successful_output(round);
                if in_round.is_empty() {
                    last_successful_output(all)
                } else {
                    in_round
                }
            })
    }
}

fn transcript_entry(agent: &str, content: &str) -> Value {
    json!({ "agent": agent, "content": content })
}

/// Turn prompt: the task followed by the discussion so far
fn render_turn(task: &str, transcript: &[Value]) -> String {
    let discussion: Vec<String> = transcript
        .iter()
        .skip(1)
        .filter_map(|entry| {
            let agent = entry.get("agent")?.as_str()?;
            let content = entry.get("content")?.as_str()?;
            Some(format!("[{}]: {}", agent, content))
        })
        .collect();

    if discussion.is_empty() {
        task.to_string()
    } else {
        format!("{}\n\nDiscussion so far:\n{}", task, discussion.join("\n"))
    }
}

#[async_trait]
impl OrchestratorPattern for GroupOrchestrator {
    async fn execute(
        &self,
        scope: &RunScope,
        members: &[Arc<Agent>],
        task: &str,
        mut context: ExecutionContext,
    ) -> PatternOutcome {
        let mut transcript: Vec<Value> = vec![transcript_entry("task", task)];
        let mut all_responses: Vec<AgentResponse> = Vec::new();
        let mut last_round: Vec<AgentResponse> = Vec::new();
        let mut converged = false;
        let mut aborted = false;
        let mut rounds = 0;

        while rounds < self.max_rounds && !scope.is_cancelled() {
            rounds += 1;
            let view = context.clone().with(TRANSCRIPT_KEY, Value::Array(transcript.clone()));
            let input = render_turn(task, &transcript);
            let base_slot = (rounds - 1) * members.len();

            let futures: Vec<_> = members
                .iter()
                .enumerate()
                .map(|(idx, agent)| {
                    let (view, input) = (&view, &input);
                    async move {
                        let response = scope.invoke(agent, input, view).await;
                        scope.record(base_slot + idx, response.clone());
                        response
                    }
                })
                .collect();
            let round = join_all(futures).await;

            for response in round.iter().filter(|r| r.is_success()) {
                transcript.push(transcript_entry(&response.agent_name, &response.output));
                context.record_contribution(&response.agent_name, &response.output);
            }
            context.insert(TRANSCRIPT_KEY, Value::Array(transcript.clone()));
            scope.set_iterations(rounds);
            scope.checkpoint(&context);
            all_responses.extend(round.iter().cloned());

            let failed = round.iter().any(|r| !r.is_success());
            converged = self.convergence.converged(rounds, &round, &all_responses);
            tracing::debug!(round = rounds, converged, failed, "group round finished");
            last_round = round;

            if failed && self.fail_fast {
                tracing::warn!(round = rounds, "group run aborted (fail-fast)");
                aborted = true;
                break;
            }
            if converged {
                break;
            }
        }

        let final_output = self.final_output(members, &last_round, &all_responses);
        let outcome = PatternOutcome::complete(final_output, context)
            .with_extra("converged", json!(converged))
            .with_extra("rounds", json!(rounds))
            .with_extra("convergence_policy", json!(self.convergence.name()));

        if aborted {
            outcome.cut_short(Some(format!("aborted after failure in round {} (fail-fast)", rounds)))
        } else if !converged {
            tracing::info!(rounds, "group reached round limit without converging");
            outcome.cut_short(Some(format!("no convergence after {} rounds", rounds)))
        } else {
            outcome
        }
    }

    fn pattern(&self) -> Pattern {
        Pattern::Group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;
    use crate::orchestrator::convergence::{AfterRounds, FnConvergence, NeverConverge};

    fn agent(name: &str, simulation: Simulation) -> Arc<Agent> {
        Arc::new(Agent::builder().name(name).simulation(simulation).build().unwrap())
    }

    fn counting(name: &str) -> Arc<Agent> {
        agent(
            name,
            Simulation::scripted(|_, ctx, name| {
                let seen = ctx
                    .get(TRANSCRIPT_KEY)
                    .and_then(|t| t.as_array())
                    .map(|t| t.len())
                    .unwrap_or(0);
                Ok(format!("{} saw {}", name, seen))
            }),
        )
    }

    #[tokio::test]
    async fn test_converges_after_first_round() {
        let members = vec![counting("A"), counting("B")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = GroupOrchestrator::new(10)
            .with_convergence(Arc::new(FnConvergence::new(|round, _| round == 1)))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(outcome.complete);
        let progress = scope.snapshot();
        assert_eq!(progress.responses.len(), 2);
        assert_eq!(progress.iterations, 1);
        assert_eq!(outcome.final_output, "B saw 1");
    }

    #[tokio::test]
    async fn test_later_rounds_see_earlier_contributions() {
        let members = vec![counting("A"), counting("B")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = GroupOrchestrator::new(5)
            .with_convergence(Arc::new(AfterRounds(2)))
            .with_closer(Some("A".to_string()))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        // task + two contributions from round one
        assert_eq!(outcome.final_output, "A saw 3");
        let transcript = outcome.context.get(TRANSCRIPT_KEY).unwrap().as_array().unwrap();
        assert_eq!(transcript.len(), 5);
    }

    #[tokio::test]
    async fn test_round_limit_without_convergence_is_incomplete() {
        let members = vec![counting("A"), counting("B")];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = GroupOrchestrator::new(3)
            .with_convergence(Arc::new(NeverConverge))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert!(!outcome.complete);
        assert_eq!(scope.snapshot().iterations, 3);
        assert_eq!(scope.snapshot().responses.len(), 6);
        assert_eq!(outcome.extra["converged"], json!(false));
    }

    #[tokio::test]
    async fn test_failed_closer_falls_back() {
        let members = vec![counting("A"), agent("B", Simulation::failing("offline"))];
        let scope = RunScope::new(ExecutionContext::new());
        let outcome = GroupOrchestrator::new(2)
            .with_convergence(Arc::new(AfterRounds(1)))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert_eq!(outcome.final_output, "A saw 1");
    }

    #[tokio::test]
    async fn test_round_members_run_in_parallel() {
        let members: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .map(|name| {
                agent(
                    name,
                    Simulation::respond().with_latency(std::time::Duration::from_millis(60)),
                )
            })
            .collect();
        let scope = RunScope::new(ExecutionContext::new());
        let start = std::time::Instant::now();
        GroupOrchestrator::new(1)
            .with_convergence(Arc::new(AfterRounds(1)))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        assert_eq!(scope.snapshot().responses.len(), 3);
        assert!(start.elapsed() < std::time::Duration::from_millis(170));
    }

    #[tokio::test]
    async fn test_next_round_waits_for_every_member() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let members = vec![
            agent(
                "Slow",
                Simulation::respond().with_latency(std::time::Duration::from_millis(80)),
            ),
            agent(
                "Quick",
                Simulation::scripted(move |_, ctx, _| {
                    let len = ctx
                        .get(TRANSCRIPT_KEY)
                        .and_then(|t| t.as_array())
                        .map(|t| t.len())
                        .unwrap_or(0);
                    log.lock().push(len);
                    Ok("noted".to_string())
                }),
            ),
        ];
        let scope = RunScope::new(ExecutionContext::new());
        GroupOrchestrator::new(2)
            .with_convergence(Arc::new(AfterRounds(2)))
            .execute(&scope, &members, "t", ExecutionContext::new())
            .await;

        // round two opens with the task plus both round-one contributions
        assert_eq!(*seen.lock(), vec![1, 1 + members.len()]);
        assert_eq!(scope.snapshot().responses.len(), 4);
    }

    #[test]
    fn test_render_turn_lists_discussion() {
        let transcript = vec![transcript_entry("task", "t"), transcript_entry("A", "hi")];
        assert_eq!(render_turn("t", &transcript), "t\n\nDiscussion so far:\n[A]: hi");
        assert_eq!(render_turn("t", &transcript[..1]), "t");
    }
}
