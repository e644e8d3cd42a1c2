//! CLI command definitions for abet-harness.

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::agent::{AgentSpec, TranslatorSpec};
use crate::config::HarnessConfig;
use crate::dataset::JsonlDataset;
use crate::harness::Harness;
use crate::runner::{RunConfig, Strategy, DEFAULT_MAX_ATTEMPTS};
use crate::worker;

/// Agent benchmark evaluation harness.
#[derive(Parser)]
#[command(name = "abet-harness")]
#[command(about = "Run a black-box agent over a benchmark dataset")]
#[command(version)]
#[command(
    long_about = "abet-harness drives an agent over a JSONL dataset under a configurable \
concurrency strategy, retries failed items up to a bounded attempt budget, and writes \
translated outputs back keyed by item.\n\nExample usage:\n  abet-harness run --dataset \
./data.jsonl --agent echo --strategy thread_pool --workers 4"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run an agent over a dataset and write results back.
    Run(RunArgs),

    /// Serve the process-pool worker protocol over stdin/stdout.
    ///
    /// Spawned by the process-pool strategy; not intended for direct use.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

/// Arguments for `abet-harness run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// YAML config file; when given, the flags below are ignored.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSONL dataset file (one {"input": ..., "target": ...} per line).
    #[arg(short, long)]
    pub dataset: Option<PathBuf>,

    /// Registered agent name.
    #[arg(long, default_value = "echo")]
    pub agent: String,

    /// Agent construction parameters as JSON.
    #[arg(long)]
    pub agent_params: Option<String>,

    /// Registered translator name.
    #[arg(long, default_value = "identity")]
    pub translator: String,

    /// Translator construction parameters as JSON.
    #[arg(long)]
    pub translator_params: Option<String>,

    /// Concurrency strategy (sequential, thread_pool, process_pool, async).
    #[arg(short, long, default_value = "sequential")]
    pub strategy: String,

    /// Number of workers / processes / concurrent tasks.
    #[arg(short, long, default_value = "1")]
    pub workers: usize,

    /// Invocation budget per item.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Results file; defaults to the dataset path with a results.jsonl
    /// extension.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the hidden `abet-harness worker` subcommand.
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Agent spec as JSON, e.g. {"name": "echo"}.
    #[arg(long)]
    pub agent_spec: String,

    /// Translator spec as JSON, e.g. {"name": "identity"}.
    #[arg(long)]
    pub translator_spec: String,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses CLI arguments and runs the selected command.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli())
}

/// Runs the selected command with already-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_evaluation(args),
        Commands::Worker(args) => serve_worker(args),
    }
}

fn parse_params(params: Option<&str>, what: &str) -> anyhow::Result<Value> {
    match params {
        Some(text) => {
            serde_json::from_str(text).with_context(|| format!("invalid {what} params JSON"))
        }
        None => Ok(Value::Null),
    }
}

fn resolve_config(args: RunArgs) -> anyhow::Result<HarnessConfig> {
    if let Some(path) = args.config {
        return HarnessConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let dataset = args
        .dataset
        .context("either --config or --dataset is required")?;
    let strategy: Strategy = args.strategy.parse()?;

    Ok(HarnessConfig {
        agent: AgentSpec::new(args.agent).with_params(parse_params(
            args.agent_params.as_deref(),
            "agent",
        )?),
        translator: TranslatorSpec::new(args.translator).with_params(parse_params(
            args.translator_params.as_deref(),
            "translator",
        )?),
        dataset,
        output: args.output,
        run: RunConfig::new(strategy)
            .with_worker_count(args.workers)
            .with_max_attempts(args.max_attempts),
    })
}

fn run_evaluation(args: RunArgs) -> anyhow::Result<()> {
    let config = resolve_config(args)?;
    let output_path = config.output_path();

    let mut dataset = JsonlDataset::load(&config.dataset)
        .with_context(|| format!("failed to load dataset {}", config.dataset.display()))?;
    info!(
        dataset = %config.dataset.display(),
        items = dataset.len(),
        "Dataset loaded"
    );

    let harness = Harness::new();
    let report = harness.run(&config.agent, &config.translator, &mut dataset, &config.run)?;

    dataset
        .write_outputs(&output_path)
        .with_context(|| format!("failed to write results {}", output_path.display()))?;
    info!(
        run_id = %report.run_id,
        resolved = report.resolved,
        dropped = report.dropped,
        output = %output_path.display(),
        "Results written"
    );

    Ok(())
}

fn serve_worker(args: WorkerArgs) -> anyhow::Result<()> {
    let agent_spec: AgentSpec =
        serde_json::from_str(&args.agent_spec).context("invalid --agent-spec JSON")?;
    let translator_spec: TranslatorSpec =
        serde_json::from_str(&args.translator_spec).context("invalid --translator-spec JSON")?;

    let registry = crate::registry::Registry::with_builtins();
    worker::serve(&registry, &agent_spec, &translator_spec)?;
    Ok(())
}
