//! Error types for the scenario runner
//!
//! Configuration problems fail fast with a structured payload, scenario and
//! action failures carry enough context (tag, attempts, truncated message)
//! to reproduce them from the log alone.

use std::io;
use thiserror::Error;

use crate::scenario::RunStatistics;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Unknown environment '{name}'. Valid environments: {valid}")]
    InvalidEnvironment { name: String, valid: String },

    #[error("Scenario '{tag}' references unknown placeholder '${{CONFIG.{key}}}'. Available keys: {}", .available.join(", "))]
    UnknownPlaceholder {
        tag: String,
        key: String,
        available: Vec<String>,
    },

    #[error("Scenario '{tag}' has an empty prompt")]
    EmptyPrompt { tag: String },

    // === Catalog Errors ===
    #[error("Failed to parse scenario catalog '{path}': {error}")]
    CatalogParse { path: String, error: String },

    #[error("No scenario matches tag '{tag}'. Available: {}", .available.join(", "))]
    NoMatchingScenario { tag: String, available: Vec<String> },

    // === Scenario Errors ===
    #[error("Generation failed for '{tag}': {message}")]
    Generation { tag: String, message: String },

    #[error("Execution failed for '{tag}': {message}")]
    Execution { tag: String, message: String },

    #[error("Scenario '{tag}' failed after {attempts} attempt(s): {message}")]
    AttemptsExhausted {
        tag: String,
        attempts: u32,
        message: String,
    },

    // === Action Errors ===
    #[error("Action on '{target}' failed after {attempts} attempt(s): {message}")]
    ActionFailed {
        target: String,
        attempts: u32,
        message: String,
    },

    #[error("Check failed for '{target}': {reason}")]
    CheckFailed { target: String, reason: String },

    // === Timeout / Cancellation ===
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    // === Run Errors ===
    #[error("Run aborted: scenario '{tag}' failed and continue-on-failure is disabled")]
    RunAborted {
        tag: String,
        stats: Box<RunStatistics>,
    },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used for exit handling and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid input detected before any scenario ran
    Configuration,
    /// Generation or execution of a single scenario failed
    Scenario,
    /// A retried interaction ran out of attempts
    Action,
    /// The run stopped early because a scenario failed
    RunAborted,
    /// Work was cancelled through a token
    Cancelled,
    /// Anything else; reported as unexpected
    Internal,
}

impl Error {
    /// Create a check failed error
    pub fn check_failed(target: &str, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an invalid environment error listing the accepted names
    pub fn invalid_environment<S: AsRef<str>>(name: &str, valid: &[S]) -> Self {
        Self::InvalidEnvironment {
            name: name.to_string(),
            valid: valid.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::ConfigParse(_)
            | Error::InvalidEnvironment { .. }
            | Error::UnknownPlaceholder { .. }
            | Error::EmptyPrompt { .. }
            | Error::CatalogParse { .. }
            | Error::NoMatchingScenario { .. }
            | Error::FileRead { .. } => ErrorKind::Configuration,
            Error::Generation { .. } | Error::Execution { .. } | Error::AttemptsExhausted { .. } => {
                ErrorKind::Scenario
            }
            Error::ActionFailed { .. } | Error::CheckFailed { .. } | Error::Timeout(_) => {
                ErrorKind::Action
            }
            Error::RunAborted { .. } => ErrorKind::RunAborted,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error should be surfaced as an unexpected failure
    pub fn is_unexpected(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Structured error payload for JSON output
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> Self {
        let code = match e {
            Error::InvalidEnvironment { .. } => "INVALID_ENVIRONMENT",
            Error::UnknownPlaceholder { .. } => "UNKNOWN_PLACEHOLDER",
            Error::EmptyPrompt { .. } => "EMPTY_PROMPT",
            Error::CatalogParse { .. } => "CATALOG_PARSE",
            Error::NoMatchingScenario { .. } => "NO_MATCHING_SCENARIO",
            Error::Config(_) | Error::ConfigParse(_) | Error::FileRead { .. } => "CONFIG",
            Error::Generation { .. } => "GENERATION_FAILED",
            Error::Execution { .. } => "EXECUTION_FAILED",
            Error::AttemptsExhausted { .. } => "ATTEMPTS_EXHAUSTED",
            Error::ActionFailed { .. } | Error::CheckFailed { .. } => "ACTION_FAILED",
            Error::Timeout(_) => "TIMEOUT",
            Error::Cancelled => "CANCELLED",
            Error::RunAborted { .. } => "RUN_ABORTED",
            _ => "INTERNAL_ERROR",
        }
        .to_string();

        let details = match e {
            Error::InvalidEnvironment { name, valid } => {
                serde_json::json!({ "environment": name, "valid": valid.split(", ").collect::<Vec<_>>() })
            }
            Error::UnknownPlaceholder { tag, key, available } => {
                serde_json::json!({ "tag": tag, "key": key, "available_keys": available })
            }
            Error::EmptyPrompt { tag } => serde_json::json!({ "tag": tag }),
            Error::NoMatchingScenario { tag, available } => {
                serde_json::json!({ "tag": tag, "available_tags": available })
            }
            Error::AttemptsExhausted { tag, attempts, .. } => {
                serde_json::json!({ "tag": tag, "attempts": attempts })
            }
            Error::ActionFailed { target, attempts, .. } => {
                serde_json::json!({ "target": target, "attempts": attempts })
            }
            Error::RunAborted { tag, stats } => {
                serde_json::json!({ "tag": tag, "statistics": stats })
            }
            _ => serde_json::Value::Null,
        };

        Self {
            code,
            kind: e.kind(),
            message: e.to_string(),
            details,
        }
    }
}

/// Truncate diagnostic text to at most `max` characters, marking the cut
pub fn truncate_message(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > max {
        let head: String = trimmed.chars().take(max).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}
