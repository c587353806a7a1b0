//! Scenario runner - orchestration and retry core for generated test scenarios
//!
//! This library schedules scenarios in bounded-concurrency chunks, retries
//! each scenario's generate+execute pipeline, and provides a generic
//! backoff retrier for the browser interactions inside a scenario.

pub mod catalog;
pub mod cli;
pub mod collab;
pub mod commands;
pub mod common;
pub mod retry;
pub mod scenario;

// Re-export commonly used types for tests
pub use catalog::{Catalog, Scenario};
pub use common::{Error, Result};
pub use scenario::{RunConfiguration, RunStatistics, ScenarioOrchestrator, ScenarioRetryRunner};
