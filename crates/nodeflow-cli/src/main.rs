// crates/nodeflow-cli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nodeflow_core::{EventKind, ExecutionStatus, NodeSpec, Value, WorkflowGraph};
use nodeflow_runtime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "nodeflow workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial variables as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Maximum number of nodes running at once
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Run { verbose: true, .. });
    init_logging(verbose);

    match cli.command {
        Commands::Run {
            file,
            input,
            max_parallel,
            ..
        } => run_workflow(file, input, max_parallel).await?,
        Commands::Validate { file } => validate_workflow(file)?,
        Commands::Nodes => list_nodes(),
        Commands::Init { output } => create_example_workflow(output)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    nodeflow_nodes::register_all(&mut registry);
    registry
}

fn load_workflow(file: &PathBuf) -> Result<WorkflowGraph> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow file {}", file.display()))?;
    let workflow: WorkflowGraph = serde_json::from_str(&workflow_json)
        .with_context(|| format!("parsing workflow file {}", file.display()))?;
    Ok(workflow)
}

fn parse_input(input: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(input_str) = input else {
        return Ok(HashMap::new());
    };

    let json: serde_json::Value = serde_json::from_str(&input_str).context("parsing --input")?;
    match Value::from(json) {
        Value::Object(map) => Ok(map),
        other => bail!("Input must be a JSON object, got {}", other.type_name()),
    }
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    max_parallel: Option<usize>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;
    let variables = parse_input(input)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let config = RuntimeConfig {
        max_parallel_nodes: max_parallel,
        ..RuntimeConfig::default()
    };
    let runtime = FlowRuntime::with_registry(Arc::new(registry()), config);

    // Subscribe before starting so no event is missed
    let mut events = runtime.subscribe_events();
    let execution_id = runtime.start(workflow, variables).await?;

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event.execution_id != execution_id {
                continue;
            }
            match &event.kind {
                EventKind::Started { .. } => println!("▶️  Workflow started"),
                EventKind::NodeStarted { node_id, node_type } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, node_type);
                }
                EventKind::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => println!("  ✅ Node {} completed in {}ms", node_id, duration_ms),
                EventKind::NodeFailed { node_id, error } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                EventKind::NodeSkipped { node_id } => println!("  ⏭️  Node {} skipped", node_id),
                EventKind::Paused => println!("⏸️  Workflow paused"),
                EventKind::Resumed => println!("▶️  Workflow resumed"),
                EventKind::Completed { duration_ms } => {
                    println!("✨ Workflow completed successfully in {}ms", duration_ms);
                }
                EventKind::Failed { error } => println!("💥 Workflow failed: {}", error),
                EventKind::Cancelled => println!("🛑 Workflow cancelled"),
            }
            if event.is_terminal() {
                break;
            }
        }
    });

    let snapshot = tokio::select! {
        snapshot = runtime.wait(execution_id) => snapshot?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted, cancelling execution {}", execution_id);
            runtime.cancel(execution_id).await?;
            runtime.wait(execution_id).await?
        }
    };

    // Let the printer drain the terminal event
    if timeout(Duration::from_secs(1), event_task).await.is_err() {
        tracing::warn!("Event printer did not finish");
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", snapshot.execution_id);
    println!("   Status: {}", snapshot.status);
    println!(
        "   Finished: {}/{} nodes",
        snapshot.terminal_nodes(),
        snapshot.node_results.len()
    );

    let mut results: Vec<_> = snapshot.node_results.values().collect();
    results.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    let outputs: Vec<_> = results
        .iter()
        .filter_map(|r| r.output.as_ref().map(|o| (&r.node_id, o)))
        .collect();
    if !outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (node_id, output) in outputs {
            println!("   {}: {}", node_id, output);
        }
    }

    match snapshot.status {
        ExecutionStatus::Completed => Ok(()),
        ExecutionStatus::Failed => match snapshot.last_error {
            Some(error) => bail!("execution failed: {}", error),
            None => bail!("execution failed"),
        },
        other => bail!("execution ended as {}", other),
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    workflow.validate()?;

    let registry = registry();
    let unknown: Vec<&NodeSpec> = workflow
        .nodes
        .iter()
        .filter(|node| !registry.contains(&node.node_type))
        .collect();

    println!("✅ Workflow graph is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    for node in &unknown {
        println!(
            "   ⚠️  Node {} uses unregistered type {}",
            node.id, node.node_type
        );
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = WorkflowGraph::new("Example Approval Workflow");
    workflow.description =
        Some("Routes large amounts to manual review and logs the decision".to_string());

    workflow.add_node(NodeSpec::new("start", "trigger").with_name("Start"));
    workflow.add_node(
        NodeSpec::new("check", "condition")
            .with_name("Large amount?")
            .with_config("variable", "amount")
            .with_config("operator", "greater_or_equal")
            .with_config("value", 1000.0),
    );
    workflow.add_node(
        NodeSpec::new("manual", "variable.set")
            .with_name("Manual review")
            .with_config("key", "decision")
            .with_config("value", "manual review"),
    );
    workflow.add_node(
        NodeSpec::new("auto", "variable.set")
            .with_name("Auto approve")
            .with_config("key", "decision")
            .with_config("value", "approved"),
    );
    workflow.add_node(
        NodeSpec::new("log", "debug.log")
            .with_name("Log decision")
            .with_config("message", "decision made"),
    );

    workflow.connect("start", "check");
    workflow.connect_handle("check", "true", "manual");
    workflow.connect_handle("check", "false", "auto");
    workflow.connect("manual", "log");
    workflow.connect("auto", "log");

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --input '{{\"amount\": 250}}'",
        output.display()
    );

    Ok(())
}
