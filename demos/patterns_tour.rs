//! Walk through all four coordination patterns with simulated agents
//!
//! Run with: cargo run --example patterns_tour

use anyhow::Result;
use maestro::orchestrator::{AggregationStrategy, SimilarityConvergence};
use maestro::prelude::*;
use maestro::telemetry::init_tracing;
use maestro::workflow::{WorkflowEngine, WorkflowStep};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SystemConfig::load(None)?;
    let _ = init_tracing(&config.logging);

    println!("=== Maestro Patterns Tour ===\n");

    let system = Arc::new(OrchestrationSystem::new(config)?);
    for (name, description, latency_ms) in [
        ("Analyst", "Finds patterns and trends", 40),
        ("Planner", "Turns findings into steps", 25),
        ("Writer", "Drafts the deliverable", 30),
        ("Reviewer", "Checks quality", 15),
    ] {
        let agent = system
            .agent_builder()
            .name(name)
            .description(description)
            .simulation(Simulation::respond().with_latency(Duration::from_millis(latency_ms)))
            .build()?;
        system.register_agent(agent)?;
    }
    println!("✓ Registered {} agents", system.available_agents().len());

    system.create_orchestrator(
        "pipeline",
        Pattern::Sequential,
        ["Analyst", "Planner", "Writer", "Reviewer"],
    )?;
    system.create_orchestrator_with(
        system
            .orchestrator_builder("brainstorm", Pattern::Concurrent)
            .agents(["Analyst", "Planner", "Writer"])
            .aggregation(AggregationStrategy::Concatenate),
    )?;
    system.create_orchestrator_with(
        system
            .orchestrator_builder("panel", Pattern::Group)
            .agents(["Analyst", "Writer", "Reviewer"])
            .max_iterations(3)
            .closer("Reviewer")
            .convergence(Arc::new(SimilarityConvergence::new(0.9))),
    )?;
    system.create_orchestrator_with(
        system
            .orchestrator_builder("relay", Pattern::Handoff)
            .agents(["Planner", "Writer", "Reviewer"])
            .entry_agent("Planner"),
    )?;

    let task = "Launch plan for a regional coffee subscription";
    for descriptor in system.orchestrators() {
        let result = system
            .execute_orchestration(&descriptor.name, task, ExecutionContext::new())
            .await?;
        println!("\n--- {} ({}) ---", descriptor.name, descriptor.pattern);
        println!(
            "status: {} | responses: {} | iterations: {} | {} ms",
            result.status,
            result.responses.len(),
            result.iterations,
            result.elapsed_ms
        );
        println!("{}", result.final_output);
    }

    let engine = WorkflowEngine::new(Arc::clone(&system));
    engine.define_workflow(
        "research-then-write",
        vec![
            WorkflowStep::new("research", "brainstorm"),
            WorkflowStep::new("draft", "pipeline"),
        ],
        "Parallel research feeding the writing pipeline",
    )?;
    let workflow = engine
        .execute_workflow("research-then-write", task, ExecutionContext::new())
        .await?;
    println!(
        "\n--- workflow {} --- status: {} after {} steps",
        workflow.workflow,
        workflow.status,
        workflow.steps.len()
    );

    println!("\n=== Metrics ===");
    println!("{}", serde_json::to_string_pretty(&system.status())?);
    Ok(())
}
