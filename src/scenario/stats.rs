//! Scenario outcomes and run statistics

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a scenario failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The scenario timer fired before the retry runner settled
    Timeout { timeout_ms: u64 },
    /// The abort signal was set before the scenario started
    Aborted,
    /// Every generate+execute attempt failed
    Error { message: String },
}

impl FailureReason {
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            timeout_ms: limit.as_millis() as u64,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout { timeout_ms } => write!(f, "timed out after {} ms", timeout_ms),
            FailureReason::Aborted => f.write_str("aborted before start"),
            FailureReason::Error { message } => f.write_str(message),
        }
    }
}

/// Final result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed { tag: String, duration_ms: u64 },
    Failed { tag: String, reason: FailureReason },
}

impl ScenarioOutcome {
    pub fn passed(tag: impl Into<String>, duration: Duration) -> Self {
        Self::Passed {
            tag: tag.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failed(tag: impl Into<String>, reason: FailureReason) -> Self {
        Self::Failed {
            tag: tag.into(),
            reason,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            ScenarioOutcome::Passed { tag, .. } | ScenarioOutcome::Failed { tag, .. } => tag,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Passed { .. })
    }
}

/// Aggregate pass/fail counts for a run
///
/// Only the orchestrator mutates this, after a whole chunk has settled.
///
/// `passed + failed_tags.len() == total` holds only for a run that went
/// through every chunk. Statistics carried by [`Error::RunAborted`] or
/// reported after a configuration error leave the remaining scenarios
/// unrecorded; [`RunStatistics::not_run`] counts them.
///
/// [`Error::RunAborted`]: crate::common::Error::RunAborted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub total: usize,
    pub passed: usize,
    /// Failed tags in the order their outcomes were recorded
    pub failed_tags: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::start(0)
    }
}

impl RunStatistics {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            passed: 0,
            failed_tags: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            duration_ms: 0,
        }
    }

    pub fn record(&mut self, outcome: &ScenarioOutcome) {
        match outcome {
            ScenarioOutcome::Passed { .. } => self.passed += 1,
            ScenarioOutcome::Failed { tag, .. } => self.failed_tags.push(tag.clone()),
        }
    }

    /// Stamp end time and duration
    pub fn finish(&mut self) {
        let end = Utc::now();
        self.duration_ms = (end - self.start_time).num_milliseconds().max(0) as u64;
        self.end_time = Some(end);
    }

    pub fn failed(&self) -> usize {
        self.failed_tags.len()
    }

    /// Scenarios selected but never recorded; zero for a completed run
    pub fn not_run(&self) -> usize {
        self.total.saturating_sub(self.passed + self.failed())
    }

    pub fn all_passed(&self) -> bool {
        self.failed_tags.is_empty() && self.passed == self.total
    }
}
