//! Multi-step workflows chaining registered orchestrators
//!
//! Each step's final output becomes the task of the next step. A step that
//! ends in `FAILURE` or `TIMEOUT` stops the workflow; `PARTIAL` steps pass
//! their degraded output along.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::orchestrator::OrchestrationResult;
use crate::system::OrchestrationSystem;
use crate::types::RunStatus;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// One workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step label
    pub name: String,
    /// Orchestrator to run
    pub orchestrator: String,
}

impl WorkflowStep {
    /// Create a step
    pub fn new(name: impl Into<String>, orchestrator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            orchestrator: orchestrator.into(),
        }
    }
}

/// Named ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Steps in execution order
    pub steps: Vec<WorkflowStep>,
    /// Definition timestamp
    pub created_at: DateTime<Utc>,
}

/// Outcome of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Workflow name
    pub workflow: String,
    /// Results of the steps that ran
    pub steps: Vec<OrchestrationResult>,
    /// Output of the last step that ran
    pub final_output: String,
    /// Worst status across the steps that ran
    pub status: RunStatus,
    /// Total wall-clock time
    pub elapsed_ms: u64,
}

/// Defines and runs workflows against an [`OrchestrationSystem`]
pub struct WorkflowEngine {
    system: Arc<OrchestrationSystem>,
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl WorkflowEngine {
    /// Create an engine over a shared system
    pub fn new(system: Arc<OrchestrationSystem>) -> Self {
        Self {
            system,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Define a workflow
    pub fn define_workflow(
        &self,
        name: impl Into<String>,
        steps: Vec<WorkflowStep>,
        description: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("Workflow name must not be empty"));
        }
        if steps.is_empty() {
            return Err(Error::validation(format!("Workflow '{}' has no steps", name)));
        }

        let mut workflows = self.workflows.write();
        if workflows.contains_key(&name) {
            return Err(Error::validation(format!("Workflow '{}' already exists", name)));
        }
        tracing::info!(workflow = %name, steps = steps.len(), "workflow defined");
        workflows.insert(
            name.clone(),
            Workflow {
                name,
                description: description.into(),
                steps,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Defined workflows, sorted by name
    pub fn workflows(&self) -> Vec<Workflow> {
        let mut list: Vec<Workflow> = self.workflows.read().values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Run a workflow
    pub async fn execute_workflow(
        &self,
        name: &str,
        input: &str,
        context: ExecutionContext,
    ) -> Result<WorkflowResult> {
        let workflow = self
            .workflows
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("workflow", name))?;

        let start = Instant::now();
        let mut steps: Vec<OrchestrationResult> = Vec::with_capacity(workflow.steps.len());
        let mut current = input.to_string();
        let mut status = RunStatus::Success;

        for step in &workflow.steps {
            tracing::info!(workflow = %workflow.name, step = %step.name, "running workflow step");
            let result = self
                .system
                .execute_orchestration(&step.orchestrator, &current, context.clone())
                .await?;

            if result.status != RunStatus::Success {
                status = result.status;
            }
            let stop = matches!(result.status, RunStatus::Failure | RunStatus::Timeout);
            if !stop {
                current = result.final_output.clone();
            }
            steps.push(result);
            if stop {
                tracing::warn!(workflow = %workflow.name, step = %step.name, status = %status, "workflow stopped");
                break;
            }
        }

        Ok(WorkflowResult {
            workflow: workflow.name,
            steps,
            final_output: current,
            status,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Simulation};
    use crate::orchestrator::Pattern;

    fn engine() -> WorkflowEngine {
        let system = OrchestrationSystem::default();
        system
            .register_agent(
                Agent::builder()
                    .name("Upper")
                    .simulation(Simulation::scripted(|task, _, _| Ok(task.to_uppercase())))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        system
            .register_agent(
                Agent::builder()
                    .name("Exclaim")
                    .simulation(Simulation::scripted(|task, _, _| Ok(format!("{}!", task))))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        system
            .register_agent(
                Agent::builder()
                    .name("Broken")
                    .simulation(Simulation::failing("offline"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        system.create_orchestrator("upper", Pattern::Sequential, ["Upper"]).unwrap();
        system.create_orchestrator("exclaim", Pattern::Sequential, ["Exclaim"]).unwrap();
        system.create_orchestrator("broken", Pattern::Sequential, ["Broken"]).unwrap();
        WorkflowEngine::new(Arc::new(system))
    }

    #[tokio::test]
    async fn test_steps_chain_outputs() {
        let engine = engine();
        engine
            .define_workflow(
                "shout",
                vec![WorkflowStep::new("up", "upper"), WorkflowStep::new("bang", "exclaim")],
                "uppercase then exclaim",
            )
            .unwrap();

        let result = engine
            .execute_workflow("shout", "hello", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(result.final_output, "HELLO!");
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_step_stops_workflow() {
        let engine = engine();
        engine
            .define_workflow(
                "fragile",
                vec![
                    WorkflowStep::new("up", "upper"),
                    WorkflowStep::new("fail", "broken"),
                    WorkflowStep::new("bang", "exclaim"),
                ],
                "",
            )
            .unwrap();

        let result = engine
            .execute_workflow("fragile", "hello", ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(result.status, RunStatus::Failure);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.final_output, "HELLO");
    }

    #[tokio::test]
    async fn test_definition_errors() {
        let engine = engine();
        assert!(matches!(
            engine.define_workflow("empty", vec![], ""),
            Err(Error::Validation(_))
        ));
        engine
            .define_workflow("once", vec![WorkflowStep::new("up", "upper")], "")
            .unwrap();
        assert!(matches!(
            engine.define_workflow("once", vec![WorkflowStep::new("up", "upper")], ""),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            engine.execute_workflow("missing", "x", ExecutionContext::new()).await,
            Err(Error::NotFound { kind: "workflow", .. })
        ));
        assert_eq!(engine.workflows().len(), 1);
    }
}
