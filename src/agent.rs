//! Agent abstraction: configuration, backends and the invoke contract

use crate::backend::AgentBackend;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::types::ResponseStatus;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Immutable description of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name
    pub name: String,
    /// What the agent is for
    pub description: String,
    /// Capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Opaque backend parameters (model, temperature, ...)
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl AgentConfig {
    /// Create a new agent configuration
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
            parameters: Map::new(),
        }
    }

    /// Add a capability tag
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Add a backend parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Scripted response function for simulated agents: `(task, context, name)`
pub type ScriptFn = Arc<dyn Fn(&str, &ExecutionContext, &str) -> Result<String> + Send + Sync>;

/// How a simulated agent behaves when invoked
#[derive(Clone)]
pub enum SimulatedBehavior {
    /// Role-aware canned response
    Respond,
    /// Always fail with the given message
    Fail(String),
    /// Never return
    Hang,
    /// Custom deterministic function
    Script(ScriptFn),
}

impl std::fmt::Debug for SimulatedBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Respond => f.write_str("Respond"),
            Self::Fail(msg) => f.debug_tuple("Fail").field(msg).finish(),
            Self::Hang => f.write_str("Hang"),
            Self::Script(_) => f.write_str("Script(..)"),
        }
    }
}

/// Deterministic stand-in for a real backend
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Artificial latency applied before responding
    pub latency: Duration,
    /// Response behaviour
    pub behavior: SimulatedBehavior,
}

impl Simulation {
    /// Canned role-aware responses with no latency
    pub fn respond() -> Self {
        Self {
            latency: Duration::ZERO,
            behavior: SimulatedBehavior::Respond,
        }
    }

    /// Always fail
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            latency: Duration::ZERO,
            behavior: SimulatedBehavior::Fail(message.into()),
        }
    }

    /// Never return
    pub fn hanging() -> Self {
        Self {
            latency: Duration::ZERO,
            behavior: SimulatedBehavior::Hang,
        }
    }

    /// Respond with a custom function of `(task, context, name)`
    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&str, &ExecutionContext, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            latency: Duration::ZERO,
            behavior: SimulatedBehavior::Script(Arc::new(script)),
        }
    }

    /// Set the artificial latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn run(&self, task: &str, context: &ExecutionContext, name: &str) -> Result<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.behavior {
            SimulatedBehavior::Respond => Ok(canned_response(task, context, name)),
            SimulatedBehavior::Fail(msg) => Err(Error::backend(msg.clone())),
            SimulatedBehavior::Hang => std::future::pending().await,
            SimulatedBehavior::Script(script) => script(task, context, name),
        }
    }
}

/// Role-aware canned response keyed on the agent's name
fn canned_response(task: &str, context: &ExecutionContext, name: &str) -> String {
    let lower = name.to_lowercase();
    let mut response = if lower.contains("analyst") {
        format!("Analysis of '{}': key patterns and relevant trends identified.", task)
    } else if lower.contains("writer") {
        format!("Content drafted for '{}': engaging, well-structured text produced.", task)
    } else if lower.contains("planner") {
        format!("Plan for '{}': detailed strategy with steps and timeline defined.", task)
    } else if lower.contains("reviewer") {
        format!("Review of '{}': quality verified, improvements suggested.", task)
    } else {
        format!("Processing of '{}' completed by agent {}.", task, name)
    };

    let prior = context.contributors().len();
    if prior > 0 {
        response.push_str(&format!(" (building on {} prior contributions)", prior));
    }
    response
}

enum AgentKind {
    Remote(Arc<dyn AgentBackend>),
    Simulated(Simulation),
}

/// Per-agent telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Total invocations
    pub calls: u64,
    /// Invocations that ended in failure
    pub failures: u64,
    /// Latency of the most recent invocation
    pub last_latency_ms: Option<u64>,
}

/// Result of a single agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Agent that produced this response
    pub agent_name: String,
    /// Output text (empty on failure)
    pub output: String,
    /// Wall-clock time of the invocation
    pub elapsed_ms: u64,
    /// Success or failure
    pub status: ResponseStatus,
    /// Error detail when failed
    pub error: Option<String>,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

impl AgentResponse {
    /// Create a successful response
    pub fn success(agent_name: impl Into<String>, output: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            agent_name: agent_name.into(),
            output: output.into(),
            elapsed_ms,
            status: ResponseStatus::Success,
            error: None,
            completed_at: Utc::now(),
        }
    }

    /// Create a failed response
    pub fn failure(agent_name: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            agent_name: agent_name.into(),
            output: String::new(),
            elapsed_ms,
            status: ResponseStatus::Failure,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }

    /// Whether the invocation succeeded
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// An agent: configuration plus a backend capability
pub struct Agent {
    config: AgentConfig,
    kind: AgentKind,
    invoke_timeout: Option<Duration>,
    stats: Mutex<AgentStats>,
}

impl Agent {
    /// Create a new agent builder
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Convenience constructor for a simulated agent with canned responses
    pub fn simulated(name: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        Self::builder()
            .name(name)
            .description(description)
            .simulation(Simulation::respond())
            .build()
    }

    /// Agent name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Whether this agent is a simulated stand-in
    pub fn is_simulated(&self) -> bool {
        matches!(self.kind, AgentKind::Simulated(_))
    }

    /// Snapshot of this agent's telemetry
    pub fn stats(&self) -> AgentStats {
        *self.stats.lock()
    }

    /// Invoke the agent; faults are captured in the returned response
    pub async fn invoke(&self, task: &str, context: &ExecutionContext) -> AgentResponse {
        self.invoke_cancellable(task, context, &CancellationToken::new())
            .await
    }

    /// Invoke the agent, giving up early if `cancel` fires
    pub async fn invoke_cancellable(
        &self,
        task: &str,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> AgentResponse {
        let start = Instant::now();
        tracing::debug!(agent = %self.name(), "invoking agent");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::other("invocation cancelled")),
            result = self.dispatch_with_timeout(task, context) => result,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let response = match outcome {
            Ok(output) => AgentResponse::success(self.name(), output, elapsed_ms),
            Err(e) => {
                let err = Error::agent_invocation(self.name(), e.to_string());
                tracing::warn!(agent = %self.name(), error = %err, "agent invocation failed");
                AgentResponse::failure(self.name(), err.to_string(), elapsed_ms)
            }
        };

        let mut stats = self.stats.lock();
        stats.calls += 1;
        if !response.is_success() {
            stats.failures += 1;
        }
        stats.last_latency_ms = Some(elapsed_ms);

        response
    }

    async fn dispatch_with_timeout(&self, task: &str, context: &ExecutionContext) -> Result<String> {
        let output = match self.invoke_timeout {
            Some(limit) => tokio::time::timeout(limit, self.dispatch(task, context))
                .await
                .map_err(|_| Error::timeout(format!("backend did not answer within {:?}", limit)))??,
            None => self.dispatch(task, context).await?,
        };

        if output.trim().is_empty() {
            return Err(Error::backend("empty response"));
        }
        Ok(output)
    }

    async fn dispatch(&self, task: &str, context: &ExecutionContext) -> Result<String> {
        match &self.kind {
            AgentKind::Remote(backend) => {
                let prompt = self.prompt_for(task);
                backend.submit(&prompt, context).await
            }
            AgentKind::Simulated(simulation) => simulation.run(task, context, self.name()).await,
        }
    }

    fn prompt_for(&self, task: &str) -> String {
        let mut prompt = format!("You are {}. {}\n", self.config.name, self.config.description);
        if !self.config.capabilities.is_empty() {
            prompt.push_str(&format!("Capabilities: {}\n", self.config.capabilities.join(", ")));
        }
        prompt.push_str(&format!("\nTask: {}", task));
        prompt
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.kind {
            AgentKind::Remote(backend) => backend.backend_type().to_string(),
            AgentKind::Simulated(_) => "simulated".to_string(),
        };
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("backend", &backend)
            .field("invoke_timeout", &self.invoke_timeout)
            .finish()
    }
}

/// Agent builder
pub struct AgentBuilder {
    config: Option<AgentConfig>,
    name: Option<String>,
    description: String,
    capabilities: Vec<String>,
    parameters: Map<String, Value>,
    kind: Option<AgentKind>,
    invoke_timeout: Option<Duration>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self {
            config: None,
            name: None,
            description: String::new(),
            capabilities: Vec::new(),
            parameters: Map::new(),
            kind: None,
            invoke_timeout: None,
        }
    }

    /// Start from a complete configuration
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the agent name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a capability tag
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Add multiple capability tags
    pub fn capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Add a backend parameter
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Bind the agent to a real backend
    pub fn backend(mut self, backend: Arc<dyn AgentBackend>) -> Self {
        self.kind = Some(AgentKind::Remote(backend));
        self
    }

    /// Make the agent a simulated stand-in
    pub fn simulation(mut self, simulation: Simulation) -> Self {
        self.kind = Some(AgentKind::Simulated(simulation));
        self
    }

    /// Bound each backend call
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let mut config = match self.config {
            Some(config) => config,
            None => AgentConfig::new(
                self.name.clone().unwrap_or_default(),
                self.description.clone(),
            ),
        };
        if let Some(name) = self.name {
            config.name = name;
        }
        config.capabilities.extend(self.capabilities);
        config.parameters.extend(self.parameters);

        if config.name.trim().is_empty() {
            return Err(Error::validation("Agent name is required"));
        }
        let kind = self
            .kind
            .ok_or_else(|| Error::config(format!("Agent '{}' has no backend configured", config.name)))?;

        Ok(Agent {
            config,
            kind,
            invoke_timeout: self.invoke_timeout,
            stats: Mutex::new(AgentStats::default()),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
