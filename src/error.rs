//! Error types for the maestro orchestration engine

use thiserror::Error;

/// Result type alias for maestro operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the orchestration engine
///
/// Only [`Error::Validation`] and [`Error::NotFound`] ever leave
/// [`OrchestrationSystem`](crate::system::OrchestrationSystem) calls. The
/// agent-level variants are captured inside a run and surface as error
/// detail on an [`AgentResponse`](crate::agent::AgentResponse) or an
/// [`OrchestrationResult`](crate::orchestrator::OrchestrationResult).
#[derive(Debug, Error)]
pub enum Error {
    /// Bad creation arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown orchestrator, agent or workflow
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up
        kind: &'static str,
        /// The missing name
        name: String,
    },

    /// Captured failure of a single agent invocation
    #[error("Agent invocation error: {agent}: {message}")]
    AgentInvocation {
        /// Agent that failed
        agent: String,
        /// Failure detail
        message: String,
    },

    /// The external backend capability failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Global or per-invocation time budget exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Handoff exceeded its repeat or iteration bound
    #[error("Cycle limit reached: {0}")]
    CycleLimit(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error for the given kind of entity
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an agent invocation error
    pub fn agent_invocation(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentInvocation {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a cycle limit error
    pub fn cycle_limit(msg: impl Into<String>) -> Self {
        Self::CycleLimit(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error is allowed to propagate out of the system API
    pub fn is_system_level(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}
