//! CLI command handling
//!
//! Wires configuration, catalog and process collaborators into an
//! orchestrator and formats the results.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::collab::{CommandExecutor, CommandGenerator};
use crate::commands::Commands;
use crate::common::config::{Config, Environment};
use crate::common::paths::{default_artifacts_dir, DEFAULT_CATALOG};
use crate::common::{Error, ErrorReport, Result};
use crate::scenario::{
    placeholder_keys, resolve_placeholders, ConsoleSink, EventSink, RunStatistics,
    ScenarioOrchestrator, ScenarioRetryRunner, TracingSink,
};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when the command ran but something failed.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            tag,
            environment,
            catalog,
            config,
            json,
            verbose,
        } => {
            let result = run(tag, environment, catalog, config, json, verbose).await;
            if json {
                if let Err(e) = &result {
                    println!("{}", serde_json::to_string_pretty(&ErrorReport::from(e))?);
                }
            }
            result
        }

        Commands::List { catalog, json } => {
            let config = Config::load()?;
            let catalog = Catalog::load(&catalog_path(catalog, &config))?;

            if json {
                println!("{}", serde_json::to_string_pretty(catalog.scenarios())?);
            } else if catalog.is_empty() {
                println!("No scenarios in catalog");
            } else {
                println!("Scenarios:");
                for scenario in catalog.scenarios() {
                    println!("  {} {}", scenario.tag.white().bold(), scenario.description.dimmed());
                }
            }
            Ok(true)
        }

        Commands::Check {
            environment,
            catalog,
            config,
        } => check(environment, catalog, config),
    }
}

fn parse_environment(name: Option<String>) -> Result<Environment> {
    name.map(|n| n.parse::<Environment>()).transpose().map(Option::unwrap_or_default)
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    }
}

fn catalog_path(arg: Option<PathBuf>, config: &Config) -> PathBuf {
    arg.or_else(|| config.paths.catalog.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG))
}

/// Cancel `token` on Ctrl-C; scenarios already running are left to finish
fn spawn_abort_listener(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{}", "Received interrupt, not starting further scenarios...".yellow());
            token.cancel();
        }
    });
}

async fn run(
    tag: Option<String>,
    environment: Option<String>,
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
    json: bool,
    verbose: bool,
) -> Result<bool> {
    // Validated before anything is loaded or started
    let environment = parse_environment(environment)?;
    let config = load_config(config_path)?;
    let catalog = Catalog::load(&catalog_path(catalog, &config))?;
    let run_config = config.run_configuration();

    let artifacts_dir = config
        .paths
        .artifacts_dir
        .clone()
        .unwrap_or_else(default_artifacts_dir);
    let generator = CommandGenerator::from_config(&config.generator, artifacts_dir)?;
    let executor = CommandExecutor::from_config(&config.executor)?;

    let sink: Arc<dyn EventSink> = if json {
        Arc::new(TracingSink)
    } else {
        Arc::new(ConsoleSink::new(verbose))
    };

    tracing::info!(
        environment = %environment,
        catalog = ?catalog.path(),
        scenarios = catalog.len(),
        "Preparing run"
    );

    let runner = Arc::new(ScenarioRetryRunner::new(
        Arc::new(generator),
        Arc::new(executor),
        sink.clone(),
    ));
    let abort = CancellationToken::new();
    spawn_abort_listener(abort.clone());

    let orchestrator =
        ScenarioOrchestrator::new(runner, config.config_map(environment), sink).with_abort(abort);

    match orchestrator
        .run(catalog.scenarios(), &run_config, tag.as_deref())
        .await
    {
        Ok(stats) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_summary(&stats);
            }
            Ok(stats.all_passed())
        }
        Err(Error::RunAborted { tag, stats }) => {
            if !json {
                print_summary(&stats);
            }
            Err(Error::RunAborted { tag, stats })
        }
        Err(e) => Err(e),
    }
}

fn check(
    environment: Option<String>,
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<bool> {
    let environment = parse_environment(environment)?;
    let config = load_config(config_path)?;
    let catalog = Catalog::load(&catalog_path(catalog, &config))?;
    let config_map = config.config_map(environment);

    println!(
        "\n{} {} scenario(s) against '{}'",
        "Checking:".blue().bold(),
        catalog.len(),
        environment
    );

    let mut ok = true;
    for scenario in catalog.scenarios() {
        match resolve_placeholders(&scenario.prompt, &config_map, &scenario.tag) {
            Ok(_) => {
                let keys = placeholder_keys(&scenario.prompt);
                println!("  {} {} {}", "✓".green(), scenario.tag, format!("{:?}", keys).dimmed());
            }
            Err(e) => {
                ok = false;
                println!("  {} {}: {}", "✗".red(), scenario.tag, e);
            }
        }
    }

    Ok(ok)
}

fn print_summary(stats: &RunStatistics) {
    println!("\n{}", "Summary:".cyan().bold());
    println!("  Total:    {}", stats.total);
    println!("  Passed:   {}", stats.passed.to_string().green());
    if stats.failed_tags.is_empty() {
        println!("  Failed:   0");
    } else {
        println!(
            "  Failed:   {} ({})",
            stats.failed().to_string().red(),
            stats.failed_tags.join(", ")
        );
    }
    if stats.not_run() > 0 {
        println!("  Not run:  {}", stats.not_run().to_string().yellow());
    }
    println!("  Duration: {} ms", stats.duration_ms);

    if stats.all_passed() {
        println!("\n{} {}\n", "✓".green().bold(), "All scenarios passed".green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), "Run failed".red().bold());
    }
}
