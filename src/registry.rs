//! Agent registry

use crate::agent::Agent;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;

/// Name-keyed set of live agents, safe for concurrent reads and writes
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<String, Arc<Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; names must be unique
    pub fn register(&self, agent: Agent) -> Result<Arc<Agent>> {
        let name = agent.name().to_string();
        match self.agents.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(Error::validation(format!(
                "Agent '{}' is already registered",
                entry.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let agent = Arc::new(agent);
                entry.insert(Arc::clone(&agent));
                tracing::info!(agent = %agent.name(), "agent registered");
                Ok(agent)
            }
        }
    }

    /// Remove an agent
    pub fn unregister(&self, name: &str) -> Result<Arc<Agent>> {
        self.agents
            .remove(name)
            .map(|(_, agent)| agent)
            .ok_or_else(|| Error::not_found("agent", name))
    }

    /// Look up one agent
    pub fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether an agent is registered
    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Resolve names to live agents, preserving order
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<Agent>>> {
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| Error::not_found("agent", name.as_str())))
            .collect()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Registered agents, sorted by name
    pub fn list(&self) -> Vec<Arc<Agent>> {
        let mut agents: Vec<Arc<Agent>> = self.agents.iter().map(|e| Arc::clone(e.value())).collect();
        agents.sort_by(|a, b| a.name().cmp(b.name()));
        agents
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
