//! Configuration file handling
//!
//! The config file supplies run defaults, the generator/executor commands and
//! one placeholder map per environment. Run settings can be overridden from
//! the process environment.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};
use crate::scenario::{ConfigMap, RunConfiguration};

/// Environment variable overriding the chunk size
pub const ENV_CONCURRENCY: &str = "SCENARIO_CONCURRENCY";
/// Environment variable overriding the per-scenario timeout (milliseconds)
pub const ENV_TIMEOUT_MS: &str = "SCENARIO_TIMEOUT_MS";
/// Environment variable overriding the generate+execute attempt count
pub const ENV_RETRY_ATTEMPTS: &str = "SCENARIO_RETRY_ATTEMPTS";
/// Environment variable overriding continue-on-failure
pub const ENV_CONTINUE_ON_FAILURE: &str = "SCENARIO_CONTINUE_ON_FAILURE";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Run defaults (overridable from the environment)
    #[serde(default)]
    pub run: RunDefaults,

    /// Catalog and artifact locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// External generator command
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// External executor command
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Placeholder values per environment name
    #[serde(default)]
    pub environments: HashMap<String, BTreeMap<String, String>>,
}

/// Run defaults
#[derive(Debug, Deserialize, Clone)]
pub struct RunDefaults {
    /// Number of scenarios executed concurrently per chunk
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-scenario timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub scenario_timeout_ms: u64,

    /// Generate+execute attempts per scenario
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Keep running remaining chunks after a failure
    #[serde(default = "default_continue_on_failure")]
    pub continue_on_failure: bool,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            scenario_timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            continue_on_failure: default_continue_on_failure(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_timeout_ms() -> u64 {
    5 * 60 * 1000
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_continue_on_failure() -> bool {
    true
}

/// Catalog and artifact locations
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PathsConfig {
    /// Scenario catalog (YAML)
    pub catalog: Option<PathBuf>,

    /// Directory receiving generated artifacts
    pub artifacts_dir: Option<PathBuf>,
}

/// Command that turns a prompt into an executable test
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Executable name or path
    #[serde(default = "default_generator_command")]
    pub command: String,

    /// Extra arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// File extension given to generated artifacts
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_generator_command(),
            args: Vec::new(),
            extension: default_extension(),
        }
    }
}

fn default_generator_command() -> String {
    "scenario-generate".to_string()
}
fn default_extension() -> String {
    "spec.ts".to_string()
}

/// Command that runs a generated artifact
///
/// `{artifact}` and `{tag}` in `args` are substituted before spawning.
#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_command")]
    pub command: String,

    #[serde(default = "default_executor_args")]
    pub args: Vec<String>,

    /// Directory the command runs from (default: current directory)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: default_executor_command(),
            args: default_executor_args(),
            working_dir: None,
        }
    }
}

fn default_executor_command() -> String {
    "npx".to_string()
}
fn default_executor_args() -> Vec<String> {
    vec![
        "playwright".to_string(),
        "test".to_string(),
        "{artifact}".to_string(),
    ]
}

/// Target environment a run is resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Local,
    Dev,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 4] = [
        Environment::Local,
        Environment::Dev,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Environment::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Environment::ALL.iter().map(|e| e.as_str()).collect();
                Error::invalid_environment(s, &names)
            })
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Placeholder map for an environment
    ///
    /// `ENVIRONMENT` is always present and holds the environment name.
    pub fn config_map(&self, env: Environment) -> ConfigMap {
        let mut map = self
            .environments
            .get(env.as_str())
            .cloned()
            .unwrap_or_default();
        map.entry("ENVIRONMENT".to_string())
            .or_insert_with(|| env.as_str().to_string());
        map
    }

    /// Run configuration from the process environment over file defaults
    pub fn run_configuration(&self) -> RunConfiguration {
        resolve_run_configuration(&self.run, |key| std::env::var(key).ok())
    }
}

/// Apply environment overrides to run defaults
///
/// Missing, non-numeric and out-of-range values fall back to the defaults.
pub fn resolve_run_configuration<F>(defaults: &RunDefaults, lookup: F) -> RunConfiguration
where
    F: Fn(&str) -> Option<String>,
{
    let concurrency = lookup(ENV_CONCURRENCY)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(defaults.concurrency.max(1));

    let timeout_ms = lookup(ENV_TIMEOUT_MS)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(if defaults.scenario_timeout_ms > 0 {
            defaults.scenario_timeout_ms
        } else {
            default_timeout_ms()
        });

    let retry_attempts = lookup(ENV_RETRY_ATTEMPTS)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(defaults.retry_attempts.max(1));

    let continue_on_failure = lookup(ENV_CONTINUE_ON_FAILURE)
        .and_then(|v| parse_bool(&v))
        .unwrap_or(defaults.continue_on_failure);

    RunConfiguration {
        concurrency,
        scenario_timeout: Duration::from_millis(timeout_ms),
        retry_attempts,
        continue_on_failure,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let cfg = resolve_run_configuration(&RunDefaults::default(), lookup_from(&[]));
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.scenario_timeout, Duration::from_secs(300));
        assert_eq!(cfg.retry_attempts, 2);
        assert!(cfg.continue_on_failure);
    }

    #[test]
    fn test_environment_overrides() {
        let cfg = resolve_run_configuration(
            &RunDefaults::default(),
            lookup_from(&[
                (ENV_CONCURRENCY, "4"),
                (ENV_TIMEOUT_MS, "1500"),
                (ENV_RETRY_ATTEMPTS, "3"),
                (ENV_CONTINUE_ON_FAILURE, "false"),
            ]),
        );
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.scenario_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.retry_attempts, 3);
        assert!(!cfg.continue_on_failure);
    }

    #[test]
    fn test_garbage_falls_back() {
        let defaults = RunDefaults {
            concurrency: 3,
            ..RunDefaults::default()
        };
        let cfg = resolve_run_configuration(
            &defaults,
            lookup_from(&[
                (ENV_CONCURRENCY, "lots"),
                (ENV_TIMEOUT_MS, "0"),
                (ENV_RETRY_ATTEMPTS, "-1"),
                (ENV_CONTINUE_ON_FAILURE, "maybe"),
            ]),
        );
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.scenario_timeout, Duration::from_secs(300));
        assert_eq!(cfg.retry_attempts, 2);
        assert!(cfg.continue_on_failure);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("staging".parse::<Environment>().unwrap(), Environment::Staging);
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(matches!(err, Error::InvalidEnvironment { .. }));
        assert!(err.to_string().contains("local, dev, staging, production"));
    }

    #[test]
    fn test_parse_config_file() {
        let config: Config = toml::from_str(
            r#"
            [run]
            concurrency = 2

            [generator]
            command = "gen"

            [environments.dev]
            BASE_URL = "https://dev.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.concurrency, 2);
        assert_eq!(config.run.retry_attempts, 2);
        assert_eq!(config.generator.command, "gen");
        assert_eq!(config.generator.extension, "spec.ts");
        assert_eq!(config.executor.command, "npx");

        let map = config.config_map(Environment::Dev);
        assert_eq!(map["BASE_URL"], "https://dev.example.com");
        assert_eq!(map["ENVIRONMENT"], "dev");

        let local = config.config_map(Environment::Local);
        assert_eq!(local.len(), 1);
    }
}
