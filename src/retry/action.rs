//! Bounded retry with exponential backoff for a single fallible action
//!
//! Ordinary action failure never surfaces as `Err`: the caller always gets an
//! [`ActionOutcome`] and decides whether a failed outcome is fatal.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::{Error, Result};

/// Callback invoked after every failed attempt with the error and 1-based attempt number
pub type ErrorCallback = Arc<dyn Fn(&Error, u32) + Send + Sync>;

/// Options for one retried action
#[derive(Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts (at least 1)
    pub retries: u32,
    /// Upper bound for a single attempt; `None` lets an attempt run unbounded
    pub timeout: Option<Duration>,
    /// Base backoff delay, doubled after every failed attempt
    pub delay: Duration,
    /// Log every failed attempt at WARN instead of DEBUG
    pub verbose: bool,
    /// Label identifying what the action operates on (e.g. a selector)
    pub target: String,
    pub on_error: Option<ErrorCallback>,
    /// Stops the loop before the next attempt or during backoff
    pub cancel: CancellationToken,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout: Some(Duration::from_secs(30)),
            delay: Duration::from_millis(500),
            verbose: false,
            target: String::from("action"),
            on_error: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .field("verbose", &self.verbose)
            .field("target", &self.target)
            .field("on_error", &self.on_error.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RetryOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Error, u32) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of a retried action
#[derive(Debug)]
pub struct ActionOutcome<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error: Option<Error>,
    /// Attempts made, `1..=retries`
    ///
    /// Includes an attempt that was cancelled before the action was invoked,
    /// so a pre-cancelled token reports 1 without ever calling the action.
    pub attempts: u32,
    pub duration: Duration,
}

impl<T> ActionOutcome<T> {
    fn succeeded(value: T, attempts: u32, duration: Duration) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            attempts,
            duration,
        }
    }

    fn failed(error: Error, attempts: u32, duration: Duration) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error),
            attempts,
            duration,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }

    /// Escalate a failed outcome into an error
    pub fn into_result(self) -> Result<T> {
        match (self.value, self.error) {
            (Some(value), _) if self.success => Ok(value),
            (_, Some(error)) => Err(error),
            _ => Err(Error::Internal(
                "action outcome has neither value nor error".to_string(),
            )),
        }
    }
}

/// Delay before the attempt following `attempt` (1-based): `delay * 2^(attempt-1)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

async fn run_attempt<T, F, Fut>(action: &mut F, timeout: Option<Duration>) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, action()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
        },
        None => action().await,
    }
}

/// Run `action` up to `options.retries` times with exponential backoff
pub async fn retry_with_backoff<T, F, Fut>(mut action: F, options: &RetryOptions) -> ActionOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let retries = options.retries.max(1);
    let target = options.target.as_str();
    let mut attempt = 0;

    loop {
        attempt += 1;

        // The action never runs, so there is no failure to report to on_error
        if options.cancel.is_cancelled() {
            tracing::debug!(label = %target, attempt, "Cancelled before attempt");
            return ActionOutcome::failed(
                exhausted(target, attempt, &Error::Cancelled),
                attempt,
                start.elapsed(),
            );
        }

        let result = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => Err(Error::Cancelled),
            result = run_attempt(&mut action, options.timeout) => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(label = %target, attempt, "Action succeeded after retry");
                }
                return ActionOutcome::succeeded(value, attempt, start.elapsed());
            }
            Err(e) => e,
        };

        if options.verbose {
            tracing::warn!(label = %target, attempt, retries, error = %error, "Action attempt failed");
        } else {
            tracing::debug!(label = %target, attempt, retries, error = %error, "Action attempt failed");
        }

        if let Some(callback) = &options.on_error {
            callback(&error, attempt);
        }

        let cancelled = matches!(error, Error::Cancelled);
        if attempt >= retries || cancelled {
            return ActionOutcome::failed(exhausted(target, attempt, &error), attempt, start.elapsed());
        }

        let delay = backoff_delay(options.delay, attempt);
        tokio::select! {
            biased;
            _ = options.cancel.cancelled() => {
                let message = format!("{} (cancelled during backoff)", error);
                return ActionOutcome::failed(
                    Error::ActionFailed {
                        target: target.to_string(),
                        attempts: attempt,
                        message,
                    },
                    attempt,
                    start.elapsed(),
                );
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn exhausted(target: &str, attempts: u32, last: &Error) -> Error {
    Error::ActionFailed {
        target: target.to_string(),
        attempts,
        message: last.to_string(),
    }
}

/// Retry engine carrying default options for the interactions built on it
#[derive(Debug, Clone, Default)]
pub struct ActionRetrier {
    defaults: RetryOptions,
}

impl ActionRetrier {
    pub fn new(defaults: RetryOptions) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RetryOptions {
        &self.defaults
    }

    /// Run `action` with explicit options
    pub async fn execute<T, F, Fut>(&self, action: F, options: &RetryOptions) -> ActionOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_backoff(action, options).await
    }

    /// Run `action` with the default options, labelled with `target`
    pub async fn run<T, F, Fut>(&self, target: &str, action: F) -> ActionOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let options = self.defaults.clone().with_target(target);
        retry_with_backoff(action, &options).await
    }
}
