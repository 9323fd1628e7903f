//! Orchestrator settings: pattern identifiers and per-pattern options
//!
//! Everything here is plain data so that settings can be resolved from a
//! [`SystemConfig`](crate::config::SystemConfig) or parsed from YAML.
//! Injectable behaviour (convergence policies, routers) is attached through
//! [`OrchestratorBuilder`](crate::orchestrator::OrchestratorBuilder).

use crate::agent::AgentResponse;
use crate::error::{Error, Result};
use crate::orchestrator::convergence::{
    AfterRounds, ConvergencePolicy, KeywordConvergence, NeverConverge, SimilarityConvergence,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Supported coordination patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Agents run one after another, each consuming the previous output
    Sequential,
    /// Agents run in parallel on the same task
    Concurrent,
    /// Agents contribute in rounds over a shared transcript
    #[serde(alias = "group_chat")]
    Group,
    /// One agent at a time, passing control by routing decision
    Handoff,
}

impl Pattern {
    /// All patterns, in declaration order
    pub const ALL: [Pattern; 4] = [
        Pattern::Sequential,
        Pattern::Concurrent,
        Pattern::Group,
        Pattern::Handoff,
    ];

    /// Lowercase pattern name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent => "concurrent",
            Self::Group => "group",
            Self::Handoff => "handoff",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            "group" | "group_chat" => Ok(Self::Group),
            "handoff" => Ok(Self::Handoff),
            other => Err(Error::validation(format!(
                "Unsupported orchestration pattern: {}",
                other
            ))),
        }
    }
}

/// Reduction applied to concurrent outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Concatenate all outputs labeled by agent name
    #[default]
    Concatenate,
    /// Merge outputs, dropping duplicate lines
    Merge,
    /// Take only the first successful response in registration order
    First,
    /// Take the longest response
    Longest,
}

impl AggregationStrategy {
    /// Reduce the successful responses into one output
    pub fn aggregate(&self, responses: &[AgentResponse]) -> String {
        let outputs: Vec<&AgentResponse> = responses.iter().filter(|r| r.is_success()).collect();
        match self {
            Self::Concatenate => labeled_join(outputs.into_iter()),
            Self::First => outputs.first().map(|r| r.output.clone()).unwrap_or_default(),
            Self::Longest => outputs
                .iter()
                .max_by_key(|r| r.output.len())
                .map(|r| r.output.clone())
                .unwrap_or_default(),
            Self::Merge => {
                let mut seen = HashSet::new();
                outputs
                    .iter()
                    .flat_map(|r| r.output.lines())
                    .filter(|line| seen.insert(line.to_string()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }
}

/// Join outputs as `## name` sections
pub(crate) fn labeled_join<'a>(responses: impl Iterator<Item = &'a AgentResponse>) -> String {
    responses
        .map(|r| format!("## {}\n\n{}", r.agent_name, r.output))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// How a sequential run derives its final output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequentialOutput {
    /// Last successful agent's output
    #[default]
    Last,
    /// Labeled concatenation of every successful output
    Aggregate,
}

fn default_keywords() -> Vec<String> {
    vec!["final answer".to_string(), "concluded".to_string()]
}

/// Serializable description of a group convergence policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvergenceConfig {
    /// Stop when any response in the round contains a keyword
    Keywords {
        /// Case-insensitive completion markers
        #[serde(default = "default_keywords")]
        keywords: Vec<String>,
    },
    /// Stop when consecutive rounds overlap by at least `threshold`
    Similarity {
        /// Mean overlap required, `0.0..=1.0`
        threshold: f64,
    },
    /// Stop after a fixed number of rounds
    AfterRounds {
        /// Rounds to run
        rounds: usize,
    },
    /// Run until `max_iterations`
    Never,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self::Keywords {
            keywords: default_keywords(),
        }
    }
}

impl ConvergenceConfig {
    /// Instantiate the policy
    pub fn build(&self) -> Arc<dyn ConvergencePolicy> {
        match self {
            Self::Keywords { keywords } => Arc::new(KeywordConvergence::new(keywords.clone())),
            Self::Similarity { threshold } => Arc::new(SimilarityConvergence::new(*threshold)),
            Self::AfterRounds { rounds } => Arc::new(AfterRounds(*rounds)),
            Self::Never => Arc::new(NeverConverge),
        }
    }
}

fn default_max_iterations() -> usize {
    10
}
fn default_repeat_limit() -> usize {
    3
}

/// Per-orchestrator options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSettings {
    /// Round bound for group, hop bound for handoff
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Run budget override in milliseconds; the system default applies when unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Abort on the first failed invocation (sequential, group, handoff)
    #[serde(default)]
    pub fail_fast: bool,
    /// Max invocations of one agent within a handoff run
    #[serde(default = "default_repeat_limit")]
    pub repeat_limit: usize,
    /// Concurrent reduction
    #[serde(default)]
    pub aggregation: AggregationStrategy,
    /// Sequential final output mode
    #[serde(default)]
    pub sequential_output: SequentialOutput,
    /// Handoff entry agent; first member when unset
    #[serde(default)]
    pub entry_agent: Option<String>,
    /// Group member whose last contribution is the final output; last member when unset
    #[serde(default)]
    pub closer: Option<String>,
    /// Group convergence policy
    #[serde(default)]
    pub convergence: ConvergenceConfig,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_ms: None,
            fail_fast: false,
            repeat_limit: default_repeat_limit(),
            aggregation: AggregationStrategy::default(),
            sequential_output: SequentialOutput::default(),
            entry_agent: None,
            closer: None,
            convergence: ConvergenceConfig::default(),
        }
    }
}

impl PatternSettings {
    /// Load settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("Failed to parse YAML: {}", e)))
    }

    /// Run budget override as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the settings against the member list
    pub fn validate(&self, members: &[String]) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::validation("max_iterations must be at least 1"));
        }
        if self.repeat_limit == 0 {
            return Err(Error::validation("repeat_limit must be at least 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::validation("timeout must be greater than zero"));
        }
        for (role, name) in [("entry agent", &self.entry_agent), ("closer", &self.closer)] {
            if let Some(name) = name {
                if !members.iter().any(|m| m == name) {
                    return Err(Error::validation(format!(
                        "{} '{}' is not a member of the orchestrator",
                        role, name
                    )));
                }
            }
        }
        Ok(())
    }
}
