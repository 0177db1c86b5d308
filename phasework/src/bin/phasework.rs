//! phasework: run multi-phase batch pipelines from the command line.
//!
//! ```bash
//! # Count words in a file, then total the counts
//! phasework run --tasks word_count,add --text-file book.txt
//!
//! # Sum numbers across 3 segments
//! phasework run --tasks add --segments 3 --data '[1,2,3,4,5,6,7,8,9,10]'
//!
//! # Run the configured schedules until Ctrl-C
//! phasework schedule --config phasework.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tokio::time::MissedTickBehavior;

use phasework::{Orchestrator, PhaseworkOptions, ScheduleEntry, init_logging};

/// Multi-phase fan-out/fan-in batch pipelines.
#[derive(Parser, Debug)]
#[command(name = "phasework")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pipeline and print its result.
    Run(RunArgs),
    /// Run every configured schedule until interrupted.
    Schedule,
    /// List registered phases.
    Phases,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Comma-separated phase names, in pipeline order.
    #[arg(short, long, value_delimiter = ',', required = true)]
    tasks: Vec<String>,

    /// Segments per phase (defaults to the configured value).
    #[arg(short, long)]
    segments: Option<usize>,

    #[command(flatten)]
    input: InputArgs,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Inline JSON input.
    #[arg(long)]
    data: Option<String>,

    /// File holding JSON input.
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Plain-text file, passed to the first phase as `{"path": ...}`.
    #[arg(long)]
    text_file: Option<PathBuf>,
}

impl InputArgs {
    fn load(&self) -> Result<Value> {
        if let Some(raw) = &self.data {
            return serde_json::from_str(raw).context("--data is not valid JSON");
        }
        if let Some(path) = &self.data_file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", path.display()));
        }
        if let Some(path) = &self.text_file {
            return Ok(json!({ "path": path.to_string_lossy() }));
        }
        bail!("no input given")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = load_options(cli.config.as_deref())?;
    let _guard = init_logging(&options.logging).context("Failed to initialize logging")?;

    match cli.command {
        Command::Run(args) => run(options, args).await,
        Command::Schedule => schedule(options).await,
        Command::Phases => {
            let orchestrator = Orchestrator::from_options(options)?;
            for name in orchestrator.registry().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<PhaseworkOptions> {
    match path {
        Some(path) => PhaseworkOptions::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PhaseworkOptions::default()),
    }
}

async fn run(options: PhaseworkOptions, args: RunArgs) -> Result<()> {
    let data = args.input.load()?;
    let orchestrator = Orchestrator::from_options(options)?;

    let output = orchestrator
        .run_pipeline(data, args.tasks, args.segments)
        .await
        .context("Pipeline failed")?;

    println!("{}", serde_json::to_string_pretty(&output.result)?);

    let metrics = &output.metrics;
    let summary: Vec<String> = metrics
        .phases
        .iter()
        .map(|phase| {
            format!(
                "{}={}ms/{} segments",
                phase.phase, phase.duration_ms, phase.segments
            )
        })
        .collect();
    eprintln!(
        "job {} finished in {}ms ({} retries): {}",
        metrics.job_id,
        metrics.total_duration_ms,
        metrics.retries(),
        summary.join(", ")
    );

    Ok(())
}

async fn schedule(options: PhaseworkOptions) -> Result<()> {
    if options.schedules.is_empty() {
        bail!("no schedules configured");
    }

    let schedules = options.schedules.clone();
    let orchestrator = Arc::new(Orchestrator::from_options(options)?);

    let workers: Vec<_> = schedules
        .into_iter()
        .map(|entry| tokio::spawn(run_schedule(Arc::clone(&orchestrator), entry)))
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down schedules");

    for worker in workers {
        worker.abort();
    }

    let metrics = orchestrator.metrics();
    tracing::info!(
        completed = metrics.pipelines_completed,
        failed = metrics.pipelines_failed,
        interrupted = metrics.pipelines_in_flight(),
        "Scheduler stopped"
    );
    Ok(())
}

async fn run_schedule(orchestrator: Arc<Orchestrator>, entry: ScheduleEntry) {
    let mut ticker = tokio::time::interval(entry.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tracing::info!(schedule = %entry.name, tasks = ?entry.tasks, "Running scheduled pipeline");

        match orchestrator
            .run_pipeline(entry.data.clone(), entry.tasks.clone(), entry.segments)
            .await
        {
            Ok(output) => tracing::info!(
                schedule = %entry.name,
                job_id = %output.metrics.job_id,
                result = %output.result,
                "Scheduled pipeline finished"
            ),
            Err(e) => tracing::error!(
                schedule = %entry.name,
                error = %e,
                "Scheduled pipeline failed"
            ),
        }
    }
}
