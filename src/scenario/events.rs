//! Run progress events and the sinks that receive them
//!
//! Components get a sink at construction instead of writing to a global
//! channel, so tests can record exactly what a run reported.

use std::sync::Mutex;

use colored::Colorize;
use serde::Serialize;

use super::stats::{RunStatistics, ScenarioOutcome};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        total: usize,
        chunks: usize,
        concurrency: usize,
    },
    ChunkStarted {
        index: usize,
        size: usize,
    },
    ScenarioStarted {
        tag: String,
    },
    AttemptStarted {
        tag: String,
        attempt: u32,
        attempts: u32,
    },
    AttemptFailed {
        tag: String,
        attempt: u32,
        attempts: u32,
        message: String,
    },
    ScenarioFinished {
        outcome: ScenarioOutcome,
    },
    RunFinished {
        statistics: RunStatistics,
    },
}

/// Receiver of run progress events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::AttemptFailed {
                tag,
                attempt,
                attempts,
                message,
            } => tracing::warn!(tag = %tag, attempt, attempts, error = %message, "Attempt failed"),
            RunEvent::ScenarioFinished {
                outcome: ScenarioOutcome::Failed { tag, reason },
            } => tracing::warn!(tag = %tag, reason = %reason, "Scenario failed"),
            other => tracing::debug!(event = ?other, "Run event"),
        }
    }
}

/// Human-readable progress on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink {
    pub verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                total,
                chunks,
                concurrency,
            } => {
                println!(
                    "\n{} {} scenario(s) in {} chunk(s), concurrency {}",
                    "Running:".blue().bold(),
                    total.to_string().white().bold(),
                    chunks,
                    concurrency
                );
            }
            RunEvent::ChunkStarted { index, size } => {
                if self.verbose {
                    println!("\n{} {} ({} scenario(s))", "Chunk".cyan(), index + 1, size);
                }
            }
            RunEvent::ScenarioStarted { tag } => {
                if self.verbose {
                    println!("  {} {}", "→".dimmed(), tag);
                }
            }
            RunEvent::AttemptStarted { .. } => {}
            RunEvent::AttemptFailed {
                tag,
                attempt,
                attempts,
                message,
            } => {
                println!(
                    "  {} {} attempt {}/{}: {}",
                    "!".yellow(),
                    tag,
                    attempt,
                    attempts,
                    message.dimmed()
                );
            }
            RunEvent::ScenarioFinished { outcome } => match outcome {
                ScenarioOutcome::Passed { tag, duration_ms } => {
                    println!("  {} {} {}", "✓".green(), tag, format!("({} ms)", duration_ms).dimmed());
                }
                ScenarioOutcome::Failed { tag, reason } => {
                    println!("  {} {}: {}", "✗".red(), tag, reason);
                }
            },
            RunEvent::RunFinished { .. } => {}
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Tags of started scenarios, in start order
    pub fn started_tags(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::ScenarioStarted { tag } => Some(tag),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
