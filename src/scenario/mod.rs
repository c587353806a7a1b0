//! Scenario scheduling, retry and reporting
//!
//! [`ScenarioOrchestrator`] drives a batch, [`ScenarioRetryRunner`] retries
//! the generate+execute pipeline of a single scenario.

pub mod events;
mod orchestrator;
mod placeholder;
mod runner;
mod stats;

pub use events::{ConsoleSink, EventSink, RecordingSink, RunEvent, TracingSink};
pub use orchestrator::{chunk_scenarios, select_scenarios, RunConfiguration, ScenarioOrchestrator};
pub use placeholder::{placeholder_keys, resolve_placeholders, ConfigMap};
pub use runner::{Artifact, Executor, Generator, ScenarioRetryRunner, MAX_ERROR_CHARS};
pub use stats::{FailureReason, RunStatistics, ScenarioOutcome};
