//! Bounded-concurrency scheduling of a scenario batch
//!
//! Scenarios are split into chunks of `concurrency` elements. Chunks run one
//! after another; inside a chunk every scenario starts at once and the whole
//! chunk is awaited before the next one begins, so at most `concurrency`
//! scenarios are in flight and chunks never interleave.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::events::{EventSink, RunEvent};
use super::placeholder::{resolve_placeholders, ConfigMap};
use super::runner::ScenarioRetryRunner;
use super::stats::{FailureReason, RunStatistics, ScenarioOutcome};
use crate::catalog::Scenario;
use crate::common::{Error, Result};

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Scenarios per chunk, at least 1
    pub concurrency: usize,
    /// Time allowed for one scenario, all attempts included
    pub scenario_timeout: Duration,
    /// Generate+execute attempts per scenario, at least 1
    pub retry_attempts: u32,
    /// Keep going after a failed chunk
    pub continue_on_failure: bool,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            concurrency: 1,
            scenario_timeout: Duration::from_secs(5 * 60),
            retry_attempts: 2,
            continue_on_failure: true,
        }
    }
}

/// Split `items` into consecutive groups of `size` (last group may be shorter)
pub fn chunk_scenarios<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Scenarios matching `filter_tag` exactly, or all of them
pub fn select_scenarios<'a>(scenarios: &'a [Scenario], filter_tag: Option<&str>) -> Result<Vec<&'a Scenario>> {
    let Some(tag) = filter_tag else {
        return Ok(scenarios.iter().collect());
    };

    let selected: Vec<&Scenario> = scenarios.iter().filter(|s| s.tag == tag).collect();
    if selected.is_empty() {
        return Err(Error::NoMatchingScenario {
            tag: tag.to_string(),
            available: scenarios.iter().map(|s| s.tag.clone()).collect(),
        });
    }
    Ok(selected)
}

/// Top-level scheduler for a batch of scenarios
pub struct ScenarioOrchestrator {
    runner: Arc<ScenarioRetryRunner>,
    config_map: ConfigMap,
    sink: Arc<dyn EventSink>,
    abort: CancellationToken,
}

impl ScenarioOrchestrator {
    pub fn new(runner: Arc<ScenarioRetryRunner>, config_map: ConfigMap, sink: Arc<dyn EventSink>) -> Self {
        Self {
            runner,
            config_map,
            sink,
            abort: CancellationToken::new(),
        }
    }

    /// Use an externally owned abort signal
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Signal checked before each scenario starts
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Run the selected scenarios and return the aggregated statistics
    ///
    /// Fails when `filter_tag` matches nothing, when a placeholder can't be
    /// resolved, or, with `continue_on_failure` off, after the first failing
    /// chunk (the error carries the statistics gathered so far). On a
    /// configuration error the chunk's settled outcomes are still recorded and
    /// reported through the final `RunFinished` event.
    pub async fn run(
        &self,
        scenarios: &[Scenario],
        config: &RunConfiguration,
        filter_tag: Option<&str>,
    ) -> Result<RunStatistics> {
        let selected = select_scenarios(scenarios, filter_tag)?;
        let mut stats = RunStatistics::start(selected.len());

        if selected.is_empty() {
            tracing::info!("No scenarios selected");
            return Ok(self.finish(stats));
        }

        let chunks = chunk_scenarios(&selected, config.concurrency);
        tracing::info!(
            total = selected.len(),
            chunks = chunks.len(),
            concurrency = config.concurrency,
            timeout_ms = config.scenario_timeout.as_millis() as u64,
            attempts = config.retry_attempts,
            "Starting run"
        );
        self.sink.emit(&RunEvent::RunStarted {
            total: selected.len(),
            chunks: chunks.len(),
            concurrency: config.concurrency.max(1),
        });

        for (index, chunk) in chunks.into_iter().enumerate() {
            self.sink.emit(&RunEvent::ChunkStarted {
                index,
                size: chunk.len(),
            });

            let results = join_all(chunk.iter().map(|scenario| self.run_scenario(scenario, config))).await;

            // Siblings that settled are recorded even when one scenario had a configuration error
            let mut outcomes = Vec::with_capacity(results.len());
            let mut config_error = None;
            for result in results {
                match result {
                    Ok(outcome) => {
                        stats.record(&outcome);
                        outcomes.push(outcome);
                    }
                    Err(e) => {
                        config_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = config_error {
                tracing::error!(chunk = index, error = %e, "Configuration error, stopping run");
                self.finish(stats);
                return Err(e);
            }

            if !config.continue_on_failure {
                if let Some(failed) = outcomes.iter().find(|o| !o.is_passed()) {
                    let tag = failed.tag().to_string();
                    tracing::error!(tag = %tag, chunk = index, "Scenario failed, stopping run");
                    let stats = self.finish(stats);
                    return Err(Error::RunAborted {
                        tag,
                        stats: Box::new(stats),
                    });
                }
            }
        }

        Ok(self.finish(stats))
    }

    fn finish(&self, mut stats: RunStatistics) -> RunStatistics {
        stats.finish();
        tracing::info!(
            total = stats.total,
            passed = stats.passed,
            failed = stats.failed(),
            duration_ms = stats.duration_ms,
            "Run finished"
        );
        self.sink.emit(&RunEvent::RunFinished {
            statistics: stats.clone(),
        });
        stats
    }

    /// Execute one scenario; only configuration problems surface as `Err`
    async fn run_scenario(&self, scenario: &Scenario, config: &RunConfiguration) -> Result<ScenarioOutcome> {
        let tag = scenario.tag.clone();

        if self.abort.is_cancelled() {
            tracing::info!(tag = %tag, "Abort requested, skipping scenario");
            return Ok(self.report(ScenarioOutcome::failed(tag, FailureReason::Aborted)));
        }

        let prompt = resolve_placeholders(&scenario.prompt, &self.config_map, &tag)?;
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt { tag });
        }

        self.sink.emit(&RunEvent::ScenarioStarted { tag: tag.clone() });
        let started = Instant::now();

        // The runner lives in its own task so the timer can abandon it;
        // the token tells it to stop at its next suspension point.
        let cancel = CancellationToken::new();
        let runner = self.runner.clone();
        let task_tag = tag.clone();
        let task_cancel = cancel.clone();
        let attempts = config.retry_attempts;
        let mut handle =
            tokio::spawn(async move { runner.run(&prompt, &task_tag, attempts, &task_cancel).await });

        let outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(Ok(())) => ScenarioOutcome::passed(tag, started.elapsed()),
                Ok(Err(e)) => ScenarioOutcome::failed(tag, FailureReason::error(e.to_string())),
                Err(e) => ScenarioOutcome::failed(
                    tag,
                    FailureReason::error(format!("scenario task failed: {}", e)),
                ),
            },
            _ = tokio::time::sleep(config.scenario_timeout) => {
                cancel.cancel();
                tracing::warn!(
                    tag = %tag,
                    timeout_ms = config.scenario_timeout.as_millis() as u64,
                    "Scenario timed out"
                );
                ScenarioOutcome::failed(tag, FailureReason::timeout(config.scenario_timeout))
            }
        };

        Ok(self.report(outcome))
    }

    fn report(&self, outcome: ScenarioOutcome) -> ScenarioOutcome {
        self.sink.emit(&RunEvent::ScenarioFinished {
            outcome: outcome.clone(),
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes() {
        let items = [1, 2, 3, 4, 5];
        let chunks = chunk_scenarios(&items, 2);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chunks[2], &[5]);
        assert_eq!(chunks[0], &[1, 2]);
    }

    #[test]
    fn test_chunk_size_zero_is_one() {
        let items = ["a", "b"];
        assert_eq!(chunk_scenarios(&items, 0).len(), 2);
        assert!(chunk_scenarios::<u8>(&[], 3).is_empty());
    }

    #[test]
    fn test_select_exact_tag() {
        let scenarios = vec![
            Scenario::new("login", "", "a"),
            Scenario::new("login-admin", "", "b"),
        ];
        let selected = select_scenarios(&scenarios, Some("login")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].tag, "login");

        assert_eq!(select_scenarios(&scenarios, None).unwrap().len(), 2);
    }

    #[test]
    fn test_select_unknown_tag_lists_available() {
        let scenarios = vec![Scenario::new("login", "", "a")];
        let err = select_scenarios(&scenarios, Some("logout")).unwrap_err();
        match err {
            Error::NoMatchingScenario { tag, available } => {
                assert_eq!(tag, "logout");
                assert_eq!(available, vec!["login"]);
            }
            other => panic!("Expected NoMatchingScenario, got {:?}", other),
        }
    }
}
