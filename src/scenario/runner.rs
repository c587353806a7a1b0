//! Generate-then-execute retry loop for one scenario
//!
//! Every attempt asks the generator for a fresh artifact. A failed attempt
//! may be caused by a bad generation, so a previous artifact is never reused.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::events::{EventSink, RunEvent};
use crate::common::{truncate_message, Error, Result};

/// Maximum characters of the underlying error kept in the final failure
pub const MAX_ERROR_CHARS: usize = 500;

/// An executable test produced by the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub tag: String,
    pub path: PathBuf,
    pub source: String,
}

/// Turns a resolved prompt into an executable artifact
///
/// Called once per attempt, possibly several times for the same `(prompt, tag)`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, tag: &str, cancel: &CancellationToken) -> Result<Artifact>;
}

/// Runs an artifact; `Ok` means every check in it passed
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, artifact: &Artifact, cancel: &CancellationToken) -> Result<()>;
}

/// Retries the generate+execute pipeline of a scenario
pub struct ScenarioRetryRunner {
    generator: Arc<dyn Generator>,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn EventSink>,
}

impl ScenarioRetryRunner {
    pub fn new(
        generator: Arc<dyn Generator>,
        executor: Arc<dyn Executor>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            generator,
            executor,
            sink,
        }
    }

    /// Run up to `attempts` generate+execute cycles, stopping at the first success
    pub async fn run(
        &self,
        prompt: &str,
        tag: &str,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let attempts = attempts.max(1);
        let mut last_error: Option<Error> = None;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                tracing::info!(tag = %tag, attempt, "Scenario cancelled, not starting attempt");
                return Err(Error::Cancelled);
            }

            self.sink.emit(&RunEvent::AttemptStarted {
                tag: tag.to_string(),
                attempt,
                attempts,
            });
            tracing::debug!(tag = %tag, attempt, attempts, "Starting attempt");

            match self.attempt(prompt, tag, cancel).await {
                Ok(()) => {
                    tracing::info!(tag = %tag, attempt, "Scenario passed");
                    return Ok(());
                }
                Err(Error::Cancelled) => {
                    tracing::info!(tag = %tag, attempt, "Scenario cancelled mid-attempt");
                    return Err(Error::Cancelled);
                }
                Err(e) => {
                    let message = truncate_message(&e.to_string(), MAX_ERROR_CHARS);
                    tracing::warn!(tag = %tag, attempt, attempts, error = %message, "Attempt failed");
                    self.sink.emit(&RunEvent::AttemptFailed {
                        tag: tag.to_string(),
                        attempt,
                        attempts,
                        message,
                    });
                    last_error = Some(e);
                }
            }
        }

        let message = last_error
            .map(|e| truncate_message(&e.to_string(), MAX_ERROR_CHARS))
            .unwrap_or_default();
        tracing::error!(tag = %tag, attempts, error = %message, "Scenario failed on every attempt");

        Err(Error::AttemptsExhausted {
            tag: tag.to_string(),
            attempts,
            message,
        })
    }

    async fn attempt(&self, prompt: &str, tag: &str, cancel: &CancellationToken) -> Result<()> {
        let artifact = self.generator.generate(prompt, tag, cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.executor.execute(&artifact, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::events::RecordingSink;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(&self, prompt: &str, tag: &str, _cancel: &CancellationToken) -> Result<Artifact> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Artifact {
                tag: tag.to_string(),
                path: PathBuf::from(format!("{}-{}.spec.ts", tag, n)),
                source: prompt.to_string(),
            })
        }
    }

    /// Fails until `pass_on` executions have happened (0 = never passes)
    struct ScriptedExecutor {
        calls: AtomicU32,
        pass_on: u32,
        seen: std::sync::Mutex<Vec<PathBuf>>,
    }

    impl ScriptedExecutor {
        fn new(pass_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                pass_on,
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(&self, artifact: &Artifact, _cancel: &CancellationToken) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(artifact.path.clone());
            if self.pass_on != 0 && n >= self.pass_on {
                Ok(())
            } else {
                Err(Error::Execution {
                    tag: artifact.tag.clone(),
                    message: format!("assertion failed on run {}", n),
                })
            }
        }
    }

    fn runner(
        generator: &Arc<CountingGenerator>,
        executor: &Arc<ScriptedExecutor>,
        sink: &Arc<RecordingSink>,
    ) -> ScenarioRetryRunner {
        ScenarioRetryRunner::new(generator.clone(), executor.clone(), sink.clone())
    }

    #[tokio::test]
    async fn test_exhausts_exactly_attempts() {
        let generator = Arc::new(CountingGenerator::default());
        let executor = Arc::new(ScriptedExecutor::new(0));
        let sink = Arc::new(RecordingSink::new());

        let err = runner(&generator, &executor, &sink)
            .run("do it", "checkout", 3, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        match err {
            Error::AttemptsExhausted { tag, attempts, message } => {
                assert_eq!(tag, "checkout");
                assert_eq!(attempts, 3);
                assert!(message.contains("assertion failed on run 3"));
            }
            other => panic!("Expected AttemptsExhausted, got {:?}", other),
        }

        let failures = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, RunEvent::AttemptFailed { .. }))
            .count();
        assert_eq!(failures, 3);
    }

    #[tokio::test]
    async fn test_regenerates_every_attempt() {
        let generator = Arc::new(CountingGenerator::default());
        let executor = Arc::new(ScriptedExecutor::new(2));
        let sink = Arc::new(RecordingSink::new());

        runner(&generator, &executor, &sink)
            .run("do it", "login", 3, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        let seen = executor.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![PathBuf::from("login-1.spec.ts"), PathBuf::from("login-2.spec.ts")]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let generator = Arc::new(CountingGenerator::default());
        let executor = Arc::new(ScriptedExecutor::new(1));
        let sink = Arc::new(RecordingSink::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner(&generator, &executor, &sink)
            .run("do it", "login", 3, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_long_error_is_truncated() {
        struct NoisyExecutor;

        #[async_trait]
        impl Executor for NoisyExecutor {
            async fn execute(&self, artifact: &Artifact, _cancel: &CancellationToken) -> Result<()> {
                Err(Error::Execution {
                    tag: artifact.tag.clone(),
                    message: "x".repeat(2_000),
                })
            }
        }

        let generator = Arc::new(CountingGenerator::default());
        let sink = Arc::new(RecordingSink::new());
        let runner = ScenarioRetryRunner::new(generator, Arc::new(NoisyExecutor), sink);

        let err = runner
            .run("p", "noisy", 1, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::AttemptsExhausted { message, .. } => {
                assert!(message.chars().count() <= MAX_ERROR_CHARS + 3);
                assert!(message.ends_with("..."));
            }
            other => panic!("Expected AttemptsExhausted, got {:?}", other),
        }
    }
}
