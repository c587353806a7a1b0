//! Scenario runner - runs generated browser test scenarios in bounded chunks
//!
//! Each scenario is regenerated and re-executed on failure, under a global
//! concurrency limit and a per-scenario timeout.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use scenario_runner::common::logging;
use scenario_runner::{cli, commands};

#[derive(Parser)]
#[command(name = "scenario-runner", about = "Orchestrates generated test scenarios")]
#[command(version, long_about = None)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so the file writer flushes
    let _guard = match &cli.log_file {
        Some(path) => logging::init_with_file(path),
        None => {
            logging::init_cli();
            None
        }
    };

    let code = match cli::dispatch(cli.command).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) if e.is_unexpected() => {
            tracing::error!(error = %e, "Unexpected error");
            eprintln!("Unexpected error: {e}");
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    std::process::exit(code);
}
