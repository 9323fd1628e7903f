//! Orchestrator module - coordination patterns for multi-agent runs
//!
//! An [`Orchestrator`] binds a named, immutable list of member agents to one
//! coordination pattern. Runs are executed under a wall-clock budget; when
//! the budget elapses in-flight invocations are cancelled and whatever the
//! pattern had recorded is returned with status `TIMEOUT`.
//!
//! # Patterns
//!
//! - **Sequential**: Agents execute in order, output chains to next
//! - **Concurrent**: Parallel execution with aggregation
//! - **Group**: Round-based collaboration until convergence
//! - **Handoff**: Router-driven transfer of control between agents
//!
//! # Example
//!
//! ```rust,ignore
//! use maestro::orchestrator::{OrchestratorBuilder, Pattern};
//!
//! let orchestrator = OrchestratorBuilder::new("review", Pattern::Group)
//!     .agents(["Analyst", "Reviewer"])
//!     .max_iterations(4)
//!     .closer("Reviewer")
//!     .build()?;
//! ```

pub mod concurrent;
pub mod config;
pub mod convergence;
pub mod group;
pub mod handoff;
pub mod pattern;
pub mod routing;
pub mod sequential;

pub use concurrent::ConcurrentOrchestrator;
pub use config::{AggregationStrategy, ConvergenceConfig, Pattern, PatternSettings, SequentialOutput};
pub use convergence::{
    AfterRounds, ConvergencePolicy, FnConvergence, KeywordConvergence, NeverConverge,
    SimilarityConvergence,
};
pub use group::GroupOrchestrator;
pub use handoff::HandoffOrchestrator;
pub use pattern::{OrchestrationResult, OrchestratorPattern, PatternOutcome, RunScope};
pub use routing::{FixedRouter, FnRouter, HandoffRouter, MentionRouter, Route, RoundRobinRouter};
pub use sequential::SequentialOrchestrator;

use crate::agent::Agent;
use crate::context::{ExecutionContext, TASK_KEY};
use crate::error::{Error, Result};
use crate::registry::AgentRegistry;
use crate::types::{RunId, RunStatus};
use chrono::{DateTime, Utc};
use pattern::last_successful_output;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Time granted to a cancelled run to record its in-flight invocations
const CANCEL_GRACE: Duration = Duration::from_millis(100);

/// Run budget used by [`Orchestrator::run`] when the settings carry none
pub const DEFAULT_RUN_BUDGET: Duration = Duration::from_secs(300);

/// Immutable description of a registered orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorDescriptor {
    /// Unique name within the system
    pub name: String,
    /// Coordination pattern
    pub pattern: Pattern,
    /// Member agent names in registration order
    pub agents: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Per-orchestrator options
    pub settings: PatternSettings,
}

/// A named pattern bound to its member agents
pub struct Orchestrator {
    descriptor: OrchestratorDescriptor,
    strategy: Box<dyn OrchestratorPattern>,
}

impl Orchestrator {
    /// Start building an orchestrator
    pub fn builder(name: impl Into<String>, pattern: Pattern) -> OrchestratorBuilder {
        OrchestratorBuilder::new(name, pattern)
    }

    /// Orchestrator name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Coordination pattern
    pub fn pattern(&self) -> Pattern {
        self.descriptor.pattern
    }

    /// Member agent names
    pub fn agents(&self) -> &[String] {
        &self.descriptor.agents
    }

    /// Per-orchestrator options
    pub fn settings(&self) -> &PatternSettings {
        &self.descriptor.settings
    }

    /// Full descriptor
    pub fn descriptor(&self) -> &OrchestratorDescriptor {
        &self.descriptor
    }

    /// Resolve the members from `registry` and run
    ///
    /// Fails only when a member is no longer registered.
    pub async fn run(
        &self,
        registry: &AgentRegistry,
        task: &str,
        context: ExecutionContext,
    ) -> Result<OrchestrationResult> {
        let members = registry.resolve(self.agents())?;
        Ok(self.execute(&members, task, context, DEFAULT_RUN_BUDGET, None).await)
    }

    /// Run the pattern over `members` within a wall-clock budget
    ///
    /// `default_budget` applies unless the orchestrator's settings carry their
    /// own timeout. `permits`, when given, bounds simultaneous invocations.
    /// Agent faults never surface as errors; they are reflected in the
    /// returned result's status.
    pub async fn execute(
        &self,
        members: &[Arc<Agent>],
        task: &str,
        mut context: ExecutionContext,
        default_budget: Duration,
        permits: Option<Arc<Semaphore>>,
    ) -> OrchestrationResult {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let start = Instant::now();
        let budget = self.settings().timeout().unwrap_or(default_budget);

        context.insert(TASK_KEY, task);
        let mut scope = RunScope::new(context.clone());
        if let Some(permits) = permits {
            scope = scope.with_permits(permits);
        }

        tracing::info!(
            orchestrator = %self.name(),
            pattern = %self.pattern(),
            run_id = %run_id,
            agents = members.len(),
            "starting orchestration run"
        );

        let mut run = self.strategy.execute(&scope, members, task, context);
        let outcome = match tokio::time::timeout(budget, &mut run).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                tracing::warn!(
                    orchestrator = %self.name(),
                    budget_ms = budget.as_millis() as u64,
                    "orchestration run timed out; cancelling in-flight invocations"
                );
                scope.cancel();
                let _ = tokio::time::timeout(CANCEL_GRACE, &mut run).await;
                None
            }
        };
        drop(run);

        let progress = scope.snapshot();
        let responses = progress.ordered_responses();
        let successes = responses.iter().filter(|r| r.is_success()).count();
        let failures = responses.len() - successes;

        let mut result = OrchestrationResult {
            run_id,
            orchestrator: self.name().to_string(),
            pattern: self.pattern(),
            final_output: String::new(),
            status: RunStatus::Timeout,
            elapsed_ms: 0,
            iterations: progress.iterations,
            context: progress.context,
            error: None,
            started_at,
            metadata: Default::default(),
            responses,
        };

        match outcome {
            Some(outcome) => {
                result.status = RunStatus::derive(successes, failures, outcome.complete);
                result.final_output = if outcome.final_output.is_empty() {
                    last_successful_output(&result.responses)
                } else {
                    outcome.final_output
                };
                result.context = outcome.context;
                result.error = outcome.error;
                result.metadata = outcome.extra;
            }
            None => {
                result.final_output = last_successful_output(&result.responses);
                result.error = Some(
                    Error::timeout(format!("run exceeded its budget of {} ms", budget.as_millis()))
                        .to_string(),
                );
            }
        }
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            orchestrator = %self.name(),
            run_id = %result.run_id,
            status = %result.status,
            responses = result.responses.len(),
            iterations = result.iterations,
            elapsed_ms = result.elapsed_ms,
            "orchestration run finished"
        );
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.descriptor.name)
            .field("pattern", &self.descriptor.pattern)
            .field("agents", &self.descriptor.agents)
            .finish()
    }
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    name: String,
    pattern: Pattern,
    agents: Vec<String>,
    settings: PatternSettings,
    convergence: Option<Arc<dyn ConvergencePolicy>>,
    router: Option<Arc<dyn HandoffRouter>>,
}

impl OrchestratorBuilder {
    /// Create a builder with default settings
    pub fn new(name: impl Into<String>, pattern: Pattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            agents: Vec::new(),
            settings: PatternSettings::default(),
            convergence: None,
            router: None,
        }
    }

    /// Add one member agent
    pub fn agent(mut self, name: impl Into<String>) -> Self {
        self.agents.push(name.into());
        self
    }

    /// Add several member agents, in order
    pub fn agents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents.extend(names.into_iter().map(Into::into));
        self
    }

    /// Replace all settings
    pub fn settings(mut self, settings: PatternSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Round bound (group) or hop bound (handoff)
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.settings.max_iterations = max_iterations;
        self
    }

    /// Run budget for this orchestrator
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Abort on the first failed invocation
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.settings.fail_fast = fail_fast;
        self
    }

    /// Max invocations of one agent in a handoff run
    pub fn repeat_limit(mut self, limit: usize) -> Self {
        self.settings.repeat_limit = limit;
        self
    }

    /// Handoff entry agent
    pub fn entry_agent(mut self, name: impl Into<String>) -> Self {
        self.settings.entry_agent = Some(name.into());
        self
    }

    /// Group member whose final contribution is the result
    pub fn closer(mut self, name: impl Into<String>) -> Self {
        self.settings.closer = Some(name.into());
        self
    }

    /// Concurrent reduction
    pub fn aggregation(mut self, strategy: AggregationStrategy) -> Self {
        self.settings.aggregation = strategy;
        self
    }

    /// Sequential final output mode
    pub fn sequential_output(mut self, output: SequentialOutput) -> Self {
        self.settings.sequential_output = output;
        self
    }

    /// Group convergence policy, overriding the configured one
    pub fn convergence(mut self, policy: Arc<dyn ConvergencePolicy>) -> Self {
        self.convergence = Some(policy);
        self
    }

    /// Handoff router; mentions in agent output are used when unset
    pub fn router(mut self, router: Arc<dyn HandoffRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Orchestrator name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member names collected so far
    pub fn member_names(&self) -> &[String] {
        &self.agents
    }

    /// Validate and build
    pub fn build(self) -> Result<Orchestrator> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Orchestrator name must not be empty"));
        }
        if self.agents.is_empty() {
            return Err(Error::validation(format!(
                "Orchestrator '{}' needs at least one agent",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.agents.iter().find(|a| !seen.insert(a.as_str())) {
            return Err(Error::validation(format!(
                "Agent '{}' listed twice in orchestrator '{}'",
                dup, self.name
            )));
        }
        let mut keys = HashMap::new();
        for agent in &self.agents {
            let key = ExecutionContext::output_key(agent);
            if let Some(other) = keys.insert(key.clone(), agent.as_str()) {
                return Err(Error::validation(format!(
                    "Agents '{}' and '{}' share the context key '{}' in orchestrator '{}'",
                    other, agent, key, self.name
                )));
            }
        }
        self.settings.validate(&self.agents)?;

        let settings = &self.settings;
        let strategy: Box<dyn OrchestratorPattern> = match self.pattern {
            Pattern::Sequential => Box::new(
                SequentialOrchestrator::new()
                    .with_fail_fast(settings.fail_fast)
                    .with_output(settings.sequential_output),
            ),
            Pattern::Concurrent => {
                Box::new(ConcurrentOrchestrator::new().with_aggregation(settings.aggregation))
            }
            Pattern::Group => Box::new(
                GroupOrchestrator::new(settings.max_iterations)
                    .with_convergence(
                        self.convergence
                            .clone()
                            .unwrap_or_else(|| settings.convergence.build()),
                    )
                    .with_closer(settings.closer.clone())
                    .with_fail_fast(settings.fail_fast),
            ),
            Pattern::Handoff => Box::new(
                HandoffOrchestrator::new(settings.max_iterations, settings.repeat_limit)
                    .with_router(self.router.clone().unwrap_or_else(|| Arc::new(MentionRouter::new())))
                    .with_entry_agent(settings.entry_agent.clone())
                    .with_fail_fast(settings.fail_fast),
            ),
        };
        if strategy.pattern() != self.pattern {
            return Err(Error::validation(format!(
                "Orchestrator '{}' requested {} but was bound to {}",
                self.name,
                self.pattern,
                strategy.pattern()
            )));
        }

        Ok(Orchestrator {
            descriptor: OrchestratorDescriptor {
                name: self.name,
                pattern: self.pattern,
                agents: self.agents,
                created_at: Utc::now(),
                settings: self.settings,
            },
            strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Simulation;

    fn agent(name: &str, simulation: Simulation) -> Arc<Agent> {
        Arc::new(Agent::builder().name(name).simulation(simulation).build().unwrap())
    }

    #[test]
    fn test_build_rejects_bad_definitions() {
        let empty = Orchestrator::builder("x", Pattern::Sequential).build();
        assert!(matches!(empty, Err(Error::Validation(_))));

        let dup = Orchestrator::builder("x", Pattern::Sequential)
            .agents(["A", "A"])
            .build();
        assert!(matches!(dup, Err(Error::Validation(_))));

        let zero = Orchestrator::builder("x", Pattern::Group)
            .agent("A")
            .max_iterations(0)
            .build();
        assert!(matches!(zero, Err(Error::Validation(_))));

        let unnamed = Orchestrator::builder(" ", Pattern::Concurrent).agent("A").build();
        assert!(matches!(unnamed, Err(Error::Validation(_))));
    }

    #[test]
    fn test_build_rejects_members_sharing_an_output_key() {
        let clash = Orchestrator::builder("x", Pattern::Sequential)
            .agents(["Writer", "writer", "Reader"])
            .build();
        assert!(matches!(clash, Err(Error::Validation(msg)) if msg.contains("writer_output")));

        let spaced = Orchestrator::builder("x", Pattern::Concurrent)
            .agents(["Risk Analyst", "risk_analyst"])
            .build();
        assert!(matches!(spaced, Err(Error::Validation(_))));

        let distinct = Orchestrator::builder("x", Pattern::Sequential)
            .agents(["Writer", "Reader"])
            .build()
            .unwrap();
        assert_eq!(distinct.strategy.pattern(), distinct.pattern());
    }

    #[tokio::test]
    async fn test_execute_reports_pattern_and_task() {
        let orchestrator = Orchestrator::builder("pipeline", Pattern::Sequential)
            .agents(["A", "B"])
            .build()
            .unwrap();
        let members = vec![
            agent("A", Simulation::respond()),
            agent("B", Simulation::respond()),
        ];

        let result = orchestrator
            .execute(&members, "summarize", ExecutionContext::new(), Duration::from_secs(5), None)
            .await;

        assert_eq!(result.pattern, Pattern::Sequential);
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.agent_order(), vec!["A", "B"]);
        assert_eq!(result.context.get_str(TASK_KEY), Some("summarize"));
        assert!(!result.final_output.is_empty());
    }

    #[tokio::test]
    async fn test_hanging_agent_times_out_with_partial_output() {
        let orchestrator = Orchestrator::builder("stuck", Pattern::Sequential)
            .agents(["A", "B"])
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let members = vec![
            agent("A", Simulation::scripted(|_, _, _| Ok("first".to_string()))),
            agent("B", Simulation::hanging()),
        ];

        let start = Instant::now();
        let result = orchestrator
            .execute(&members, "t", ExecutionContext::new(), Duration::from_secs(60), None)
            .await;

        assert_eq!(result.status, RunStatus::Timeout);
        assert_eq!(result.final_output, "first");
        assert!(result.error.as_deref().unwrap_or_default().contains("budget"));
        assert!(start.elapsed() < Duration::from_millis(100) + CANCEL_GRACE + Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_run_resolves_members_from_registry() {
        let registry = AgentRegistry::new();
        registry.register(Agent::simulated("Writer", "writes").unwrap()).unwrap();
        let orchestrator = Orchestrator::builder("draft", Pattern::Handoff)
            .agents(["Writer", "Editor"])
            .build()
            .unwrap();

        let missing = orchestrator.run(&registry, "t", ExecutionContext::new()).await;
        assert!(matches!(missing, Err(Error::NotFound { kind: "agent", .. })));

        registry.register(Agent::simulated("Editor", "edits").unwrap()).unwrap();
        let result = orchestrator
            .run(&registry, "t", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(result.agent_order(), vec!["Writer"]);
        assert_eq!(result.metadata["final_agent"], serde_json::json!("Writer"));
    }

    #[tokio::test]
    async fn test_all_failures_is_failure() {
        let orchestrator = Orchestrator::builder("broken", Pattern::Concurrent)
            .agents(["A", "B"])
            .build()
            .unwrap();
        let members = vec![
            agent("A", Simulation::failing("x")),
            agent("B", Simulation::failing("y")),
        ];

        let result = orchestrator
            .execute(&members, "t", ExecutionContext::new(), Duration::from_secs(5), None)
            .await;

        assert_eq!(result.status, RunStatus::Failure);
        assert_eq!(result.failures(), 2);
        assert!(result.final_output.is_empty());
    }
}
