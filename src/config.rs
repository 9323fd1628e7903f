//! Configuration types for the maestro orchestration engine
//!
//! Settings resolve in layers: built-in defaults, then an optional YAML/TOML
//! file, then `MAESTRO__SECTION__KEY` environment variables (a `.env` file is
//! honoured).

use crate::error::{Error, Result};
use crate::orchestrator::config::{AggregationStrategy, ConvergenceConfig, Pattern, PatternSettings};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MAESTRO";

/// Defaults applied to every orchestrator unless overridden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationDefaults {
    /// Round bound (group) or hop bound (handoff)
    pub max_iterations: usize,
    /// Global run budget in seconds
    pub timeout_secs: u64,
    /// Abort runs on the first failed invocation
    pub fail_fast: bool,
    /// Pattern used when none is given
    pub default_pattern: Pattern,
    /// Group convergence policy
    pub convergence_policy: ConvergenceConfig,
    /// Max invocations of one agent within a handoff run
    pub repeat_limit: usize,
    /// Concurrent reduction
    pub aggregation: AggregationStrategy,
}

impl Default for OrchestrationDefaults {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            timeout_secs: 300,
            fail_fast: false,
            default_pattern: Pattern::Sequential,
            convergence_policy: ConvergenceConfig::default(),
            repeat_limit: 3,
            aggregation: AggregationStrategy::default(),
        }
    }
}

/// Agent execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Simultaneous invocations across the whole system
    pub max_concurrent: usize,
    /// Per-invocation backend timeout in seconds
    pub invoke_timeout_secs: u64,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            invoke_timeout_secs: 30,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Top-level system configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Orchestration defaults
    pub orchestration: OrchestrationDefaults,
    /// Agent limits
    pub agents: AgentDefaults,
    /// Logging
    pub logging: LoggingConfig,
}

impl SystemConfig {
    /// Parse a YAML document; missing keys fall back to defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Resolve defaults, an optional file and `MAESTRO__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenv();

        let defaults = ::config::Config::try_from(&Self::default())
            .map_err(|e| Error::config(format!("Failed to seed defaults: {}", e)))?;
        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(format!("Failed to load configuration: {}", e)))?;
        loaded.validate()?;
        tracing::debug!(?path, "configuration loaded");
        Ok(loaded)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.orchestration.max_iterations == 0 {
            return Err(Error::config("orchestration.max_iterations must be at least 1"));
        }
        if self.orchestration.timeout_secs == 0 {
            return Err(Error::config("orchestration.timeout_secs must be greater than zero"));
        }
        if self.orchestration.repeat_limit == 0 {
            return Err(Error::config("orchestration.repeat_limit must be at least 1"));
        }
        if self.agents.max_concurrent == 0 {
            return Err(Error::config("agents.max_concurrent must be at least 1"));
        }
        Ok(())
    }

    /// Global run budget
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.orchestration.timeout_secs)
    }

    /// Per-invocation backend timeout; zero disables it
    pub fn invoke_timeout(&self) -> Option<Duration> {
        match self.agents.invoke_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Orchestrator settings seeded from these defaults
    pub fn pattern_settings(&self) -> PatternSettings {
        let o = &self.orchestration;
        PatternSettings {
            max_iterations: o.max_iterations,
            fail_fast: o.fail_fast,
            repeat_limit: o.repeat_limit,
            aggregation: o.aggregation,
            convergence: o.convergence_policy.clone(),
            ..PatternSettings::default()
        }
    }
}
