//! Consilium CLI
//!
//! The `consilium` command routes a request to the relevant specialists and
//! prints their combined answer.
//!
//! ## Commands
//!
//! - `roles`: List registered roles
//! - `detect`: Show which roles a request would be dispatched to
//! - `ask`: Detect, dispatch and synthesize

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};
use uuid::Uuid;

use consilium_core::metrics::METRICS;
use consilium_core::telemetry::init_tracing;
use consilium_core::{
    load_role_definitions, ConnectorConfig, Orchestrator, OrchestratorConfig, ProgressReporter,
    ResultSet, RoleDetector, RoleRegistry, RoleSelection,
};
use consilium_llm::{GenerationMode, GenerationRouter, OllamaClient, TextGenerator};

#[derive(Parser)]
#[command(name = "consilium")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Route a request to a panel of specialist roles", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Role-definition document
    #[arg(long, global = true, env = "CONSILIUM_ROLES", default_value = "config/roles.json")]
    roles_file: PathBuf,

    /// Maximum number of roles running at once
    #[arg(long, global = true, env = "CONSILIUM_MAX_WORKERS", default_value_t = 3)]
    max_workers: usize,

    /// Deadline for one dispatched batch, in seconds
    #[arg(long, global = true, env = "CONSILIUM_DEADLINE_SECS", default_value_t = 200)]
    deadline_secs: u64,

    /// Where local-mode synthesis writes its partial summaries
    #[arg(long, global = true)]
    audit_file: Option<PathBuf>,

    /// Synthesis backend (local or external)
    #[arg(long, global = true, default_value = "external")]
    connector_mode: GenerationMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered roles
    Roles,

    /// Show the roles selected for a request
    Detect {
        /// Request text
        text: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Answer a request with the selected specialists
    Ask {
        /// Request text
        text: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// JSON document printed by `ask --format json`.
#[derive(Serialize)]
struct AskOutput<'a> {
    request_id: Uuid,
    generated_at: DateTime<Utc>,
    roles: &'a RoleSelection,
    results: &'a ResultSet,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let generator: Arc<dyn TextGenerator> = Arc::new(
        GenerationRouter::from_env().context("Failed to configure generation backends")?,
    );
    let orchestrator = build_orchestrator(&cli, generator)?;

    let outcome = match cli.command {
        Commands::Roles => cmd_roles(&orchestrator),
        Commands::Detect { text, format } => cmd_detect(&orchestrator, &text, format).await,
        Commands::Ask { text, format } => cmd_ask(&orchestrator, &text, format).await,
    };

    orchestrator
        .shutdown()
        .context("Failed to shut down worker pool")?;
    outcome
}

fn build_orchestrator(cli: &Cli, generator: Arc<dyn TextGenerator>) -> Result<Orchestrator> {
    let mut connector = ConnectorConfig::default().with_mode(cli.connector_mode);
    if let Some(path) = &cli.audit_file {
        connector = connector.with_audit_path(path);
    }

    let mut registry = RoleRegistry::with_builtins(generator.clone(), connector)
        .context("Failed to register built-in roles")?;
    let added = registry.load_definitions(load_role_definitions(&cli.roles_file), generator.clone());
    info!(path = %cli.roles_file.display(), added, "roles configured");

    let registry = Arc::new(registry);
    let detector = RoleDetector::new(registry.clone(), generator);
    let config = OrchestratorConfig {
        max_workers: cli.max_workers,
        deadline: Duration::from_secs(cli.deadline_secs),
        ..OrchestratorConfig::default()
    };
    Ok(Orchestrator::new(registry, detector, config))
}

/// List registered roles
fn cmd_roles(orchestrator: &Orchestrator) -> Result<()> {
    for (id, display_name) in orchestrator.list_roles() {
        println!("{:<14} {}", id, display_name);
    }
    Ok(())
}

/// Show the detected roles for a request
async fn cmd_detect(orchestrator: &Orchestrator, text: &str, format: OutputFormat) -> Result<()> {
    warn_if_local_server_down().await;
    let selection = orchestrator.detect_roles(text).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&selection)?),
        OutputFormat::Text if selection.is_empty() => println!("No roles detected."),
        OutputFormat::Text => {
            for id in selection.iter() {
                let label = orchestrator
                    .registry()
                    .get(id)
                    .map(|r| r.display_name().to_string())
                    .unwrap_or_default();
                println!("{:<14} {}", id, label);
            }
        }
    }
    Ok(())
}

/// Run a full request, streaming progress to stderr
async fn cmd_ask(orchestrator: &Orchestrator, text: &str, format: OutputFormat) -> Result<()> {
    warn_if_local_server_down().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            eprintln!("{line}");
        }
    });

    let reporter = ProgressReporter::channel(tx);
    let response = orchestrator.respond(text, &reporter).await;
    drop(reporter);
    printer.await.context("Progress printer panicked")?;

    match format {
        OutputFormat::Json => {
            let output = AskOutput {
                request_id: response.request_id,
                generated_at: Utc::now(),
                roles: &response.roles,
                results: &response.results,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            for (label, content) in response.results.iter() {
                println!("## {label}\n\n{content}\n");
            }
        }
    }

    METRICS.flush();
    Ok(())
}

/// Detection runs on the local server; without it every request uses
/// keyword fallback.
async fn warn_if_local_server_down() {
    let client = match OllamaClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "local inference client unavailable");
            return;
        }
    };
    if !client.is_available().await {
        warn!(
            host = %client.config().host,
            "local inference server unreachable, detection will use keyword fallback"
        );
    }
}
