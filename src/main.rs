//! custmesh - customer-profile workflow orchestration.
//!
//! One-shot CLI over the orchestration engine: run a workflow request
//! to a terminal status, inspect agent status, and manage customer
//! records in the configured database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use custmesh_config::{Config, ConfigLoader};
use custmesh_engine::OrchestrationEngine;
use custmesh_protocols::customer::Customer;
use custmesh_protocols::store::CustomerStore;
use custmesh_protocols::workflow::{WorkflowRequest, WorkflowStatus};
use custmesh_store_sqlite::SqliteCustomerStore;

/// Custmesh CLI.
#[derive(Parser)]
#[command(name = "custmesh")]
#[command(about = "Customer-profile workflow orchestration")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/custmesh.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow request from a JSON file to a terminal status
    Run {
        /// Workflow request JSON file
        request: PathBuf,

        /// Print the workflow's recorded context trail afterwards
        #[arg(long)]
        show_context: bool,

        /// Status poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
    },

    /// Show engine configuration and agent status
    Status,

    /// Customer record utilities
    Customers {
        #[command(subcommand)]
        action: CustomersAction,
    },
}

#[derive(Subcommand)]
enum CustomersAction {
    /// Insert a customer record from a JSON file
    Add {
        /// Customer JSON file
        file: PathBuf,
    },

    /// List customer records
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run {
            request,
            show_context,
            poll_ms,
        } => run_workflow(&config, &request, show_context, poll_ms).await,
        Commands::Status => show_status(&config).await,
        Commands::Customers { action } => match action {
            CustomersAction::Add { file } => add_customer(&config, &file).await,
            CustomersAction::List { limit } => list_customers(&config, limit).await,
        },
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = if path.exists() {
        ConfigLoader::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn CustomerStore>> {
    let store = if config.database.path == ":memory:" {
        SqliteCustomerStore::in_memory().await?
    } else {
        let path = ConfigLoader::expand_path(&config.database.path);
        SqliteCustomerStore::open(&path).await?
    };
    Ok(Arc::new(store))
}

async fn run_workflow(
    config: &Config,
    request_path: &Path,
    show_context: bool,
    poll_ms: u64,
) -> anyhow::Result<()> {
    let request: WorkflowRequest = serde_json::from_str(
        &std::fs::read_to_string(request_path)
            .with_context(|| format!("failed to read {}", request_path.display()))?,
    )
    .context("invalid workflow request")?;

    let store = open_store(config).await?;
    let engine = Arc::new(OrchestrationEngine::new(
        store,
        config.orchestrator.max_concurrent_workflows,
    ));

    let response = engine.create_workflow(request).await;
    let Some(workflow_id) = response.workflow_id.clone() else {
        bail!("workflow rejected: {}", response.message);
    };
    info!(workflow_id, "workflow submitted");

    let final_status = loop {
        tokio::time::sleep(Duration::from_millis(poll_ms)).await;
        let Some(status) = engine.get_workflow_status(&workflow_id) else {
            bail!("workflow {workflow_id} disappeared");
        };
        if !matches!(
            status.status,
            WorkflowStatus::Pending | WorkflowStatus::Running
        ) {
            break status;
        }
    };

    println!("{}", serde_json::to_string_pretty(&final_status)?);
    if show_context {
        let entry = engine.workflow_context(&workflow_id);
        println!("{}", serde_json::to_string_pretty(&entry)?);
    }
    if final_status.status == WorkflowStatus::Failed {
        bail!("workflow failed: {}", final_status.message);
    }
    Ok(())
}

async fn show_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let engine = OrchestrationEngine::new(store, config.orchestrator.max_concurrent_workflows);

    let status = serde_json::json!({
        "max_concurrent_workflows": engine.max_concurrent_workflows(),
        "active_workflows": engine.active_workflows(),
        "agents": engine.agent_statuses(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn add_customer(config: &Config, file: &Path) -> anyhow::Result<()> {
    let customer: Customer = serde_json::from_str(
        &std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?,
    )
    .context("invalid customer record")?;
    let id = customer.mcp_id.clone();

    let store = open_store(config).await?;
    store.insert(customer).await?;
    info!(customer_id = id, "customer inserted");
    println!("inserted {id}");
    Ok(())
}

async fn list_customers(config: &Config, limit: usize) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let customers = store.list(limit).await?;
    println!("{}", serde_json::to_string_pretty(&customers)?);
    Ok(())
}
