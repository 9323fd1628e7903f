//! # Maestro
//!
//! A multi-agent orchestration engine. Agents are capability units that turn
//! a task and a run-scoped context into a response; orchestrators coordinate
//! them under one of four patterns and always return one consolidated result.
//!
//! ## Features
//!
//! - **Sequential**: each agent consumes the previous agent's output
//! - **Concurrent**: fan-out with a configurable reduction
//! - **Group collaboration**: rounds over a shared transcript with pluggable convergence
//! - **Handoff**: one agent at a time with pluggable routing and cycle bounds
//! - **Run tracking**: global time budget with cancellation, per-orchestrator and per-pattern metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maestro::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> maestro::Result<()> {
//!     let system = OrchestrationSystem::new(SystemConfig::default())?;
//!     system.register_agent(Agent::simulated("Analyst", "Finds patterns")?)?;
//!     system.register_agent(Agent::simulated("Writer", "Drafts prose")?)?;
//!
//!     system.create_orchestrator("report", Pattern::Sequential, ["Analyst", "Writer"])?;
//!     let result = system
//!         .execute_orchestration("report", "Quarterly sales", ExecutionContext::new())
//!         .await?;
//!     println!("{}: {}", result.status, result.final_output);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod system;
pub mod telemetry;
pub mod types;
pub mod workflow;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder, AgentConfig, AgentResponse, AgentStats, Simulation};
pub use backend::AgentBackend;
pub use config::{LogFormat, LoggingConfig, SystemConfig};
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use metrics::{MetricsCollector, MetricsSnapshot, RunCounters};
pub use orchestrator::{
    OrchestrationResult, Orchestrator, OrchestratorBuilder, OrchestratorDescriptor, Pattern,
    PatternSettings,
};
pub use registry::AgentRegistry;
pub use system::{AgentInfo, OrchestrationSystem, SystemStatus};
pub use types::{ResponseStatus, RunId, RunStatus};
pub use workflow::{Workflow, WorkflowEngine, WorkflowResult, WorkflowStep};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentResponse, Simulation};
    pub use crate::backend::AgentBackend;
    pub use crate::config::SystemConfig;
    pub use crate::context::ExecutionContext;
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::{
        AggregationStrategy, ConvergencePolicy, HandoffRouter, OrchestrationResult, Pattern, Route,
    };
    pub use crate::system::OrchestrationSystem;
    pub use crate::types::*;
}
