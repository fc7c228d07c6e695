//! PeerBrief: open peer review collection for editorial synthesis.
//! Entry point for the `peerbrief` binary.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use peerbrief_common::CollectionConfig;
use peerbrief_ingestion::analysis::CollectionReport;
use peerbrief_ingestion::prepare::prepare_run;
use peerbrief_ingestion::{CollectionProgress, CollectionRun, RunState};

use config::{CollectArgs, PrepareArgs};

#[derive(Debug, Parser)]
#[command(name = "peerbrief", version, about = "Collect open peer reviews and prepare them for synthesis")]
struct Cli {
    /// Debug-level logging for peerbrief crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect manuscripts and their reviews into a new run directory
    Collect(CollectArgs),
    /// Flatten a collection run into synthesis pipeline input
    Prepare(PrepareArgs),
    /// Report on the contents of a collection run
    Analyze {
        run_dir: PathBuf,
    },
}

/// A parsed command with its configuration resolved.
#[derive(Debug)]
enum Task {
    Collect(CollectionConfig),
    Prepare(PrepareArgs),
    Analyze(PathBuf),
}

impl Command {
    fn into_task(self, verbose: bool) -> anyhow::Result<Task> {
        Ok(match self {
            Command::Collect(args) => Task::Collect(args.to_config(verbose)?),
            Command::Prepare(args) => Task::Prepare(args),
            Command::Analyze { run_dir } => Task::Analyze(run_dir),
        })
    }
}

/// A collect config file may ask for debug logging too.
fn wants_debug(cli_verbose: bool, task: &anyhow::Result<Task>) -> bool {
    cli_verbose || matches!(task, Ok(Task::Collect(config)) if config.verbose)
}

fn default_filter(debug: bool) -> &'static str {
    if debug { "peerbrief=debug,info" } else { "info" }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let task = cli.command.into_task(cli.verbose);

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(wants_debug(cli.verbose, &task)))),
        )
        .init();

    debug!("Version: {}", env!("CARGO_PKG_VERSION"));

    let result = match task {
        Ok(task) => run(task).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the command ran but produced nothing usable.
async fn run(task: Task) -> anyhow::Result<bool> {
    match task {
        Task::Collect(config) => collect(config).await,
        Task::Prepare(args) => {
            let run_dir = args.run_dir()?;
            let output_dir = args.output_dir.clone();
            info!("🗂️  Preparing {} into {}", run_dir.display(), output_dir.display());
            let summary = tokio::task::spawn_blocking(move || prepare_run(&run_dir, &output_dir)).await??;
            info!("Reviews:     {}", summary.reviews_path.display());
            info!("Manuscripts: {}", summary.manuscripts_path.display());
            if summary.reviews == 0 {
                warn!("Run contains no reviews; the synthesis pipeline will have nothing to do");
            }
            Ok(true)
        }
        Task::Analyze(run_dir) => {
            let report = tokio::task::spawn_blocking(move || CollectionReport::from_run(&run_dir)).await??;
            report.log_report();
            Ok(true)
        }
    }
}

async fn collect(config: CollectionConfig) -> anyhow::Result<bool> {
    debug!("Resolved config: {:?}", config);
    info!("🔬 PeerBrief collection starting...");
    info!(
        "Sources: {} | manuscripts per source: {} | delay: {}s",
        config.enabled_sources().join(", "),
        config.num_manuscripts,
        config.rate_limit_delay_secs
    );

    let (tx, rx) = broadcast::channel(64);
    let progress = tokio::spawn(log_progress(rx));

    let mut run = CollectionRun::from_config(config)?.with_progress(tx);
    let result = run.run().await;
    // Dropping the run closes the channel so the logger finishes.
    drop(run);
    let _ = progress.await;

    let outcome = result?;
    for err in &outcome.source_errors {
        warn!("Source failed: {}", err);
    }
    match outcome.status {
        RunState::Failed => {
            error!("❌ Every source failed; nothing was collected");
            Ok(false)
        }
        state => {
            info!(
                "✅ Collected {} manuscripts ({:?}) into {}",
                outcome.manuscripts.len(),
                state,
                outcome.run_dir.display()
            );
            Ok(true)
        }
    }
}

async fn log_progress(mut rx: broadcast::Receiver<CollectionProgress>) {
    loop {
        match rx.recv().await {
            Ok(event) => debug!(
                stage = %event.stage,
                collected = event.manuscripts_collected,
                "{}",
                event.message
            ),
            Err(broadcast::error::RecvError::Lagged(n)) => debug!("Skipped {} progress events", n),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
