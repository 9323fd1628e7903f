//! Orchestration system: agent and orchestrator registries, budgets and metrics

use crate::agent::{Agent, AgentBuilder};
use crate::config::SystemConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::orchestrator::{
    OrchestrationResult, Orchestrator, OrchestratorBuilder, OrchestratorDescriptor, Pattern,
};
use crate::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Public view of a registered agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent name
    pub name: String,
    /// Description
    pub description: String,
    /// Capability tags
    pub capabilities: Vec<String>,
    /// Whether the agent is a simulated stand-in
    pub simulated: bool,
    /// Total invocations
    pub calls: u64,
    /// Failed invocations
    pub failures: u64,
    /// Latency of the most recent invocation
    pub last_latency_ms: Option<u64>,
}

impl From<&Agent> for AgentInfo {
    fn from(agent: &Agent) -> Self {
        let stats = agent.stats();
        Self {
            name: agent.name().to_string(),
            description: agent.config().description.clone(),
            capabilities: agent.config().capabilities.clone(),
            simulated: agent.is_simulated(),
            calls: stats.calls,
            failures: stats.failures,
            last_latency_ms: stats.last_latency_ms,
        }
    }
}

/// System-wide status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Number of registered agents
    pub agent_count: usize,
    /// Number of registered orchestrators
    pub orchestrator_count: usize,
    /// Registered agent names, sorted
    pub agents: Vec<String>,
    /// Registered orchestrator names, sorted
    pub orchestrators: Vec<String>,
    /// Current metrics
    pub metrics: MetricsSnapshot,
    /// When the report was taken
    pub timestamp: DateTime<Utc>,
}

/// Entry point for creating and running orchestrations
///
/// Registries and metrics are safe to share across concurrently executing
/// runs; wrap the system in an `Arc` to drive it from several tasks.
pub struct OrchestrationSystem {
    config: SystemConfig,
    agents: AgentRegistry,
    orchestrators: DashMap<String, Arc<Orchestrator>>,
    metrics: Arc<MetricsCollector>,
    permits: Arc<Semaphore>,
}

impl OrchestrationSystem {
    /// Create a system from a validated configuration
    pub fn new(config: SystemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: SystemConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.agents.max_concurrent));
        Self {
            config,
            agents: AgentRegistry::new(),
            orchestrators: DashMap::new(),
            metrics: Arc::new(MetricsCollector::new()),
            permits,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Shared metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Agent builder preloaded with the configured invocation timeout
    pub fn agent_builder(&self) -> AgentBuilder {
        match self.config.invoke_timeout() {
            Some(timeout) => Agent::builder().invoke_timeout(timeout),
            None => Agent::builder(),
        }
    }

    /// Register an agent; names must be unique
    pub fn register_agent(&self, agent: Agent) -> Result<Arc<Agent>> {
        self.agents.register(agent)
    }

    /// Remove an agent; orchestrators naming it fail at execution time
    pub fn unregister_agent(&self, name: &str) -> Result<()> {
        self.agents.unregister(name)?;
        tracing::info!(agent = %name, "agent unregistered");
        Ok(())
    }

    /// Look up one agent
    pub fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name)
    }

    /// Registered agents with their telemetry, sorted by name
    pub fn available_agents(&self) -> Vec<AgentInfo> {
        self.agents
            .list()
            .iter()
            .map(|agent| AgentInfo::from(agent.as_ref()))
            .collect()
    }

    /// Orchestrator builder seeded with the configured defaults
    pub fn orchestrator_builder(&self, name: impl Into<String>, pattern: Pattern) -> OrchestratorBuilder {
        Orchestrator::builder(name, pattern).settings(self.config.pattern_settings())
    }

    /// Create an orchestrator with default settings
    pub fn create_orchestrator<I, S>(&self, name: &str, pattern: Pattern, agent_names: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_orchestrator_with(self.orchestrator_builder(name, pattern).agents(agent_names))
    }

    /// Create an orchestrator using the configured default pattern
    pub fn create_default_orchestrator<I, S>(&self, name: &str, agent_names: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.create_orchestrator(name, self.config.orchestration.default_pattern, agent_names)
    }

    /// Create an orchestrator from a fully configured builder
    pub fn create_orchestrator_with(&self, builder: OrchestratorBuilder) -> Result<String> {
        if let Some(missing) = builder.member_names().iter().find(|n| !self.agents.contains(n)) {
            return Err(Error::validation(format!(
                "Orchestrator '{}' references unknown agent '{}'",
                builder.name(),
                missing
            )));
        }
        let orchestrator = builder.build()?;
        let name = orchestrator.name().to_string();

        match self.orchestrators.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::validation(format!(
                "Orchestrator '{}' already exists",
                name
            ))),
            Entry::Vacant(entry) => {
                tracing::info!(
                    orchestrator = %name,
                    pattern = %orchestrator.pattern(),
                    agents = ?orchestrator.agents(),
                    "orchestrator created"
                );
                entry.insert(Arc::new(orchestrator));
                Ok(name)
            }
        }
    }

    /// Run a registered orchestrator
    ///
    /// Only unknown orchestrator or agent names surface as errors; every run
    /// that starts produces a result and is recorded in the metrics once.
    #[instrument(skip_all, fields(orchestrator = %name))]
    pub async fn execute_orchestration(
        &self,
        name: &str,
        task: &str,
        context: ExecutionContext,
    ) -> Result<OrchestrationResult> {
        let orchestrator = self
            .orchestrators
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::not_found("orchestrator", name))?;
        let members = self.agents.resolve(orchestrator.agents())?;

        let result = orchestrator
            .execute(
                &members,
                task,
                context,
                self.config.timeout(),
                Some(Arc::clone(&self.permits)),
            )
            .await;

        self.metrics.record(
            orchestrator.name(),
            orchestrator.pattern(),
            result.status,
            Duration::from_millis(result.elapsed_ms),
        );
        Ok(result)
    }

    /// Descriptors of every orchestrator, sorted by name
    pub fn orchestrators(&self) -> Vec<OrchestratorDescriptor> {
        let mut descriptors: Vec<_> = self
            .orchestrators
            .iter()
            .map(|entry| entry.value().descriptor().clone())
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Descriptor of one orchestrator
    pub fn orchestrator(&self, name: &str) -> Option<OrchestratorDescriptor> {
        self.orchestrators
            .get(name)
            .map(|entry| entry.value().descriptor().clone())
    }

    /// Remove an orchestrator
    pub fn remove_orchestrator(&self, name: &str) -> Result<()> {
        self.orchestrators
            .remove(name)
            .map(|_| tracing::info!(orchestrator = %name, "orchestrator removed"))
            .ok_or_else(|| Error::not_found("orchestrator", name))
    }

    /// Current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Registries and metrics at a glance
    pub fn status(&self) -> SystemStatus {
        let mut orchestrators: Vec<String> =
            self.orchestrators.iter().map(|e| e.key().clone()).collect();
        orchestrators.sort();
        SystemStatus {
            agent_count: self.agents.len(),
            orchestrator_count: orchestrators.len(),
            agents: self.agents.names(),
            orchestrators,
            metrics: self.metrics.snapshot(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for OrchestrationSystem {
    fn default() -> Self {
        Self::with_valid_config(SystemConfig::default())
    }
}

impl std::fmt::Debug for OrchestrationSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestrationSystem")
            .field("agents", &self.agents.len())
            .field("orchestrators", &self.orchestrators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunStatus;

    fn system_with(names: &[&str]) -> OrchestrationSystem {
        let system = OrchestrationSystem::default();
        for name in names {
            system
                .register_agent(Agent::simulated(*name, format!("{} agent", name)).unwrap())
                .unwrap();
        }
        system
    }

    #[test]
    fn test_create_rejects_duplicates_and_unknown_agents() {
        let system = system_with(&["Analyst", "Writer"]);
        assert_eq!(
            system
                .create_orchestrator("pipeline", Pattern::Sequential, ["Analyst", "Writer"])
                .unwrap(),
            "pipeline"
        );

        let dup = system.create_orchestrator("pipeline", Pattern::Concurrent, ["Analyst"]);
        assert!(matches!(dup, Err(Error::Validation(_))));

        let unknown = system.create_orchestrator("other", Pattern::Sequential, ["Ghost"]);
        assert!(matches!(unknown, Err(Error::Validation(_))));
        assert_eq!(system.orchestrators().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_unknown_is_not_found() {
        let system = system_with(&[]);
        let result = system
            .execute_orchestration("nope", "task", ExecutionContext::new())
            .await;
        assert!(matches!(result, Err(Error::NotFound { kind: "orchestrator", .. })));
        assert_eq!(system.snapshot().totals.runs, 0);
    }

    #[tokio::test]
    async fn test_unregistered_member_fails_at_execution() {
        let system = system_with(&["Analyst", "Writer"]);
        system
            .create_orchestrator("pipeline", Pattern::Sequential, ["Analyst", "Writer"])
            .unwrap();
        system.unregister_agent("Writer").unwrap();

        let result = system
            .execute_orchestration("pipeline", "task", ExecutionContext::new())
            .await;
        assert!(matches!(result, Err(Error::NotFound { kind: "agent", .. })));
    }

    #[tokio::test]
    async fn test_run_updates_metrics_and_agent_stats() {
        let system = system_with(&["Analyst", "Writer"]);
        system
            .create_default_orchestrator("pipeline", ["Analyst", "Writer"])
            .unwrap();

        let result = system
            .execute_orchestration("pipeline", "market report", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.pattern, Pattern::Sequential);

        let counters = system.metrics().counters_for("pipeline").unwrap();
        assert_eq!((counters.runs, counters.successes), (1, 1));

        let info = system.available_agents();
        assert_eq!(info.len(), 2);
        assert!(info.iter().all(|a| a.calls == 1 && a.simulated));
    }

    #[test]
    fn test_remove_and_status() {
        let system = system_with(&["Analyst"]);
        system
            .create_orchestrator("solo", Pattern::Concurrent, ["Analyst"])
            .unwrap();
        assert!(system.orchestrator("solo").is_some());

        system.remove_orchestrator("solo").unwrap();
        assert!(matches!(system.remove_orchestrator("solo"), Err(Error::NotFound { .. })));

        let status = system.status();
        assert_eq!(status.agents, vec!["Analyst"]);
        assert_eq!((status.agent_count, status.orchestrator_count), (1, 0));
        assert!(status.orchestrators.is_empty());
    }
}
