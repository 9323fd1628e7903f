//! Backend capability trait bound to real agents

use crate::context::ExecutionContext;
use crate::error::Result;
use async_trait::async_trait;

/// External capability that turns a prompt into text
///
/// Implementations own all provider-specific request formatting. Failures
/// are reported as [`Error::Backend`](crate::error::Error::Backend) and are
/// captured by [`Agent::invoke`](crate::agent::Agent::invoke), never
/// propagated past the agent.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Submit a prompt together with the current run context
    async fn submit(&self, prompt: &str, context: &ExecutionContext) -> Result<String>;

    /// Get the backend type for debugging/logging
    fn backend_type(&self) -> &str;
}
