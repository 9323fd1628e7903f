//! Run-scoped execution context shared across one orchestration's agents

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Context key holding the names of agents that contributed, in order
pub const CONTRIBUTORS_KEY: &str = "contributors";

/// Context key holding the task the run was started with
pub const TASK_KEY: &str = "task";

/// Context key holding the group collaboration transcript
pub const TRANSCRIPT_KEY: &str = "transcript";

/// String-keyed mapping owned by exactly one run
///
/// Patterns merge every agent's output under [`ExecutionContext::output_key`]
/// and append the agent's name to the [`CONTRIBUTORS_KEY`] list, so the
/// carried context records contribution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    values: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Key under which an agent's output is merged
    ///
    /// Names that slug to the same key cannot share an orchestrator.
    pub fn output_key(agent_name: &str) -> String {
        let slug: String = agent_name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}_output", slug)
    }

    /// Merge an agent's contribution and append it to the contributor list
    pub fn record_contribution(&mut self, agent_name: &str, output: &str) {
        self.insert(Self::output_key(agent_name), output);
        match self.values.get_mut(CONTRIBUTORS_KEY) {
            Some(Value::Array(names)) => names.push(Value::from(agent_name)),
            _ => {
                self.values.insert(
                    CONTRIBUTORS_KEY.to_string(),
                    Value::Array(vec![Value::from(agent_name)]),
                );
            }
        }
    }

    /// Agent names in contribution order
    pub fn contributors(&self) -> Vec<String> {
        match self.values.get(CONTRIBUTORS_KEY) {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Render the context as pretty JSON for prompt construction
    pub fn to_prompt_string(&self) -> String {
        serde_json::to_string_pretty(&self.values).unwrap_or_default()
    }
}

impl From<BTreeMap<String, Value>> for ExecutionContext {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for ExecutionContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
