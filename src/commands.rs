//! CLI command definitions
//!
//! Defines the clap commands for the scenario runner.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run scenarios from the catalog
    Run {
        /// Only run the scenario with this exact tag
        tag: Option<String>,

        /// Environment to resolve ${CONFIG.*} placeholders against
        /// (local, dev, staging, production; default: local)
        environment: Option<String>,

        /// Path to the scenario catalog (default: ./scenarios.yaml)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Path to the config file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the final statistics as JSON
        #[arg(long)]
        json: bool,

        /// Verbose progress output
        #[arg(long, short)]
        verbose: bool,
    },

    /// List the scenarios in the catalog
    List {
        /// Path to the scenario catalog (default: ./scenarios.yaml)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the catalog and resolve every prompt without running anything
    Check {
        /// Environment to resolve placeholders against (default: local)
        environment: Option<String>,

        /// Path to the scenario catalog (default: ./scenarios.yaml)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Path to the config file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
