//! Quorum Trading - consensus aggregation and backtesting from the command line.
//!
//! Reads JSON job files and prints JSON (or a text report) to stdout.
//! Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use quorum_common::config::Config;
use quorum_common::logging::init_logging;
use quorum_trading::job::{self, BacktestJob, ConsensusJob};
use quorum_trading::Quorum;

#[derive(Parser, Debug)]
#[command(name = "quorum-trading")]
#[command(version)]
#[command(about = "Weighted analyst consensus and signal backtesting", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.quorum/config.json plus modular overlays)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate opinions into a consensus recommendation
    Consensus {
        /// JSON file with `subject` and `opinions`
        file: PathBuf,
    },

    /// Run a backtest from a job file with inline prices
    Backtest {
        /// JSON file with the request, `prices`, `benchmark_prices` and optional `signals`
        file: PathBuf,

        /// Print a text report instead of JSON
        #[arg(long)]
        text: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    config
        .validate()
        .map_err(|e| quorum_common::Error::Config(e.to_string()))
        .context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<quorum_common::Error>())
            .map_or(1, quorum_common::Error::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::debug!("Quorum Trading v{}", env!("CARGO_PKG_VERSION"));

    let quorum = Quorum::new(config);

    match cli.command {
        Commands::Consensus { file } => {
            let job: ConsensusJob = job::load(&file)?;
            let outcome = quorum
                .aggregate(&job.subject, &job.opinions)
                .with_context(|| format!("Consensus failed for {}", job.subject))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Backtest { file, text } => {
            let job: BacktestJob = job::load(&file)?;
            let report = quorum.run_job(job).await?;
            if text {
                print!("{}", report.to_text());
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}
