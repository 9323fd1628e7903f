//! Core type definitions for the orchestration engine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a run ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// The agent produced usable output
    Success,
    /// The agent failed; see the response's error detail
    Failure,
}

/// Overall outcome of an orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every invocation succeeded and the pattern completed normally
    Success,
    /// Some output was produced but the run was degraded or cut short
    Partial,
    /// No member produced usable output
    Failure,
    /// The global time budget expired
    Timeout,
}

impl RunStatus {
    /// Derive a status from invocation tallies
    ///
    /// `complete` is false when the pattern stopped early (fail-fast abort,
    /// iteration bound, repeat limit).
    pub fn derive(successes: usize, failures: usize, complete: bool) -> Self {
        if successes == 0 {
            Self::Failure
        } else if failures > 0 || !complete {
            Self::Partial
        } else {
            Self::Success
        }
    }

    /// Lowercase label used in logs and metrics keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
