//! Handoff routing decisions

use crate::agent::AgentResponse;
use parking_lot::Mutex;
use regex::{RegexSet, RegexSetBuilder};
use std::sync::Arc;

/// Routing decision taken after each handoff invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Transfer control to the named member
    To(String),
    /// End the run
    Stop,
}

/// Pluggable policy selecting the next agent in a handoff run
pub trait HandoffRouter: Send + Sync {
    /// Decide where control goes after `current` produced `response`
    fn route(&self, current: &str, response: &AgentResponse, members: &[String]) -> Route;

    /// Router name for logging
    fn name(&self) -> &str;
}

/// Hands off to the first other member named in the acting agent's output
///
/// Matching is case-insensitive on word boundaries. A failed response or an
/// output that names no other member ends the run. Mention patterns are
/// compiled once per member list and reused on every hop.
#[derive(Debug, Default)]
pub struct MentionRouter {
    compiled: Mutex<Option<(Vec<String>, RegexSet)>>,
}

impl MentionRouter {
    /// Create a router with no compiled patterns yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Indices of the members named in `output`, in member order
    fn mentioned(&self, output: &str, members: &[String]) -> Vec<usize> {
        let mut compiled = self.compiled.lock();
        let stale = compiled
            .as_ref()
            .map_or(true, |(names, _)| names.as_slice() != members);
        if stale {
            let patterns = members
                .iter()
                .map(|name| format!(r"\b{}\b", regex::escape(name)));
            match RegexSetBuilder::new(patterns).case_insensitive(true).build() {
                Ok(set) => *compiled = Some((members.to_vec(), set)),
                Err(e) => {
                    tracing::warn!(error = %e, "mention patterns failed to compile");
                    *compiled = None;
                    return Vec::new();
                }
            }
        }
        compiled
            .as_ref()
            .map(|(_, set)| set.matches(output).into_iter().collect())
            .unwrap_or_default()
    }
}

impl HandoffRouter for MentionRouter {
    fn route(&self, current: &str, response: &AgentResponse, members: &[String]) -> Route {
        if !response.is_success() {
            return Route::Stop;
        }
        self.mentioned(&response.output, members)
            .into_iter()
            .map(|idx| &members[idx])
            .find(|name| name.as_str() != current)
            .map(|name| Route::To(name.clone()))
            .unwrap_or(Route::Stop)
    }

    fn name(&self) -> &str {
        "mention"
    }
}

/// Always hands off to the same member
#[derive(Debug, Clone)]
pub struct FixedRouter {
    target: String,
}

impl FixedRouter {
    /// Route every decision to `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl HandoffRouter for FixedRouter {
    fn route(&self, _current: &str, _response: &AgentResponse, _members: &[String]) -> Route {
        Route::To(self.target.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Passes control to the next member in registration order, wrapping around
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinRouter;

impl HandoffRouter for RoundRobinRouter {
    fn route(&self, current: &str, _response: &AgentResponse, members: &[String]) -> Route {
        match members.iter().position(|m| m == current) {
            Some(idx) if members.len() > 1 => Route::To(members[(idx + 1) % members.len()].clone()),
            _ => Route::Stop,
        }
    }

    fn name(&self) -> &str {
        "round_robin"
    }
}

/// Closure-backed router
#[derive(Clone)]
pub struct FnRouter {
    decide: Arc<dyn Fn(&str, &AgentResponse, &[String]) -> Route + Send + Sync>,
}

impl FnRouter {
    /// Wrap a closure `(current, response, members) -> Route`
    pub fn new<F>(decide: F) -> Self
    where
        F: Fn(&str, &AgentResponse, &[String]) -> Route + Send + Sync + 'static,
    {
        Self {
            decide: Arc::new(decide),
        }
    }
}

impl HandoffRouter for FnRouter {
    fn route(&self, current: &str, response: &AgentResponse, members: &[String]) -> Route {
        (self.decide)(current, response, members)
    }

    fn name(&self) -> &str {
        "custom"
    }
}
