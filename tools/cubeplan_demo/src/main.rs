//! cubeplan-demo: compile queries and funnels from the command line
//!
//! ```text
//! cubeplan-demo compile --schema schema.yaml --query '{"measures":["orders.count"]}' \
//!     --context '{"organizationId":"org-1"}'
//! cubeplan-demo funnel --schema schema.yaml --request funnel.json \
//!     --context '{"organizationId":"org-1"}' --events rows.json
//! ```

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use cubeplan::{
    parser, Compiler, CompilerConfig, FunnelEvent, FunnelRequest, QueryRequest, SecurityContext,
};

#[derive(Parser)]
#[command(name = "cubeplan-demo")]
#[command(about = "Compile analytics queries and funnels into tenant-isolated plans")]
#[command(version)]
struct Args {
    /// Cube schema YAML file
    #[arg(long, global = true, default_value = "schema.yaml")]
    schema: PathBuf,

    /// Compiler config YAML file (timezone, weekStart)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Security context as inline JSON or a path to a JSON file
    #[arg(long, global = true)]
    context: Option<String>,

    /// Reference instant for relative date ranges (RFC 3339); defaults to now
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print the secured plan as JSON
    Compile {
        /// Query descriptor as inline JSON or a path to a JSON file
        #[arg(long)]
        query: String,
    },
    /// Compile a funnel, optionally sequencing event rows into step counts
    Funnel {
        /// Funnel descriptor as inline JSON or a path to a JSON file
        #[arg(long)]
        request: String,

        /// JSON array of {"key", "time", "step"} rows ordered by key and time
        #[arg(long)]
        events: Option<PathBuf>,
    },
}

/// One event row as an engine would return it
#[derive(Debug, Deserialize)]
struct EventRow {
    key: String,
    time: DateTime<Utc>,
    step: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cubeplan=info,cubeplan_demo=info".into()),
        )
        .init();

    let args = Args::parse();

    // 1. Schema and config
    let registry = parser::parse_file(&args.schema)
        .with_context(|| format!("loading schema {}", args.schema.display()))?;
    let config = match &args.config {
        Some(path) => parser::parse_config_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CompilerConfig::default(),
    }
    .with_env_overrides();
    info!(cubes = registry.len(), timezone = %config.timezone, "Schema loaded");

    let compiler = Compiler::new(registry).with_config(config);
    let ctx: Option<SecurityContext> = args
        .context
        .as_deref()
        .map(|c| read_json(c).context("parsing security context"))
        .transpose()?;
    let now = match &args.now {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --now '{}'", s))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    // 2. Compile (and sequence)
    match args.command {
        Commands::Compile { query } => {
            let request: QueryRequest = read_json(&query).context("parsing query")?;
            let plan = compiler
                .compile_at(&request, ctx.as_ref(), now)
                .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Funnel { request, events } => {
            let request: FunnelRequest = read_json(&request).context("parsing funnel")?;
            let compiled = compiler
                .compile_funnel_at(&request, ctx.as_ref(), now)
                .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;

            let Some(path) = events else {
                println!("{}", serde_json::to_string_pretty(&compiled.plan)?);
                return Ok(());
            };
            let rows: Vec<EventRow> = read_json_file(&path)?;
            info!(rows = rows.len(), steps = compiled.definition.len(), "Sequencing events");
            let result = cubeplan::run_funnel(
                &compiled.definition,
                rows.into_iter()
                    .map(|r| FunnelEvent::new(r.key, r.time, r.step)),
            )?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// Inline JSON if the argument looks like JSON, otherwise a file path
fn read_json<T: serde::de::DeserializeOwned>(arg: &str) -> anyhow::Result<T> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(serde_json::from_str(arg)?);
    }
    read_json_file(Path::new(arg))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        bail!("file not found: {}", path.display());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
