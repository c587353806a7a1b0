//! Retried browser interactions
//!
//! Every interaction runs through the same [`ActionRetrier`]; what differs is
//! the set of [`Checks`] wrapped around the underlying page call. The page
//! itself belongs to an external automation engine and is reached only
//! through the [`Page`] trait.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::action::{ActionOutcome, ActionRetrier, RetryOptions};
use crate::common::{Error, Result};

/// A network response observed by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub url: String,
    pub status: u16,
}

/// Browser page operations provided by the automation engine
#[async_trait]
pub trait Page: Send + Sync {
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    async fn is_enabled(&self, selector: &str) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Current value of an input element
    async fn input_value(&self, selector: &str) -> Result<String>;

    /// Wait for the next response whose URL contains `url_pattern`
    async fn wait_for_response(&self, url_pattern: &str) -> Result<NetworkResponse>;
}

/// Pre/post conditions applied around a page call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checks {
    /// Element must be visible before acting
    pub visible: bool,
    /// Element must be enabled before acting
    pub enabled: bool,
    /// Read the written value back after a fill
    pub verify_write: bool,
}

impl Checks {
    pub const NONE: Checks = Checks {
        visible: false,
        enabled: false,
        verify_write: false,
    };

    /// Checks used for clicks
    pub fn for_click(force: bool) -> Self {
        if force {
            Self::NONE
        } else {
            Self {
                visible: true,
                enabled: true,
                verify_write: false,
            }
        }
    }

    /// Checks used for fills; the read-back is kept even when forced
    pub fn for_fill(force: bool) -> Self {
        Self {
            verify_write: true,
            ..Self::for_click(force)
        }
    }
}

/// Per-call options for an interaction
#[derive(Debug, Clone, Default)]
pub struct InteractionOptions {
    /// Skip visibility and enabled checks
    pub force: bool,
    /// Override the retrier's attempt count
    pub retries: Option<u32>,
    /// Override the retrier's per-attempt timeout
    pub timeout: Option<Duration>,
}

/// Retried interactions against one page
pub struct Interactions<'a, P: Page + ?Sized> {
    page: &'a P,
    retrier: ActionRetrier,
}

impl<'a, P: Page + ?Sized> Interactions<'a, P> {
    pub fn new(page: &'a P, retrier: ActionRetrier) -> Self {
        Self { page, retrier }
    }

    fn options(&self, target: &str, opts: &InteractionOptions) -> RetryOptions {
        let mut options = self.retrier.defaults().clone().with_target(target);
        if let Some(retries) = opts.retries {
            options.retries = retries;
        }
        if opts.timeout.is_some() {
            options.timeout = opts.timeout;
        }
        options
    }

    async fn precheck(&self, selector: &str, checks: Checks) -> Result<()> {
        if checks.visible && !self.page.is_visible(selector).await? {
            return Err(Error::check_failed(selector, "element is not visible"));
        }
        if checks.enabled && !self.page.is_enabled(selector).await? {
            return Err(Error::check_failed(selector, "element is not enabled"));
        }
        Ok(())
    }

    /// Click an element
    pub async fn click(&self, selector: &str, opts: &InteractionOptions) -> ActionOutcome<()> {
        let checks = Checks::for_click(opts.force);
        let options = self.options(selector, opts);
        self.retrier
            .execute(
                || async move {
                    self.precheck(selector, checks).await?;
                    self.page.click(selector).await
                },
                &options,
            )
            .await
    }

    /// Fill an input and verify the value stuck
    ///
    /// A read-back mismatch fails the attempt so a partial write is retried
    /// instead of accepted.
    pub async fn fill(
        &self,
        selector: &str,
        value: &str,
        opts: &InteractionOptions,
    ) -> ActionOutcome<()> {
        let checks = Checks::for_fill(opts.force);
        let options = self.options(selector, opts);
        self.retrier
            .execute(
                || async move {
                    self.precheck(selector, checks).await?;
                    self.page.fill(selector, value).await?;
                    if checks.verify_write {
                        let actual = self.page.input_value(selector).await?;
                        if actual != value {
                            return Err(Error::check_failed(
                                selector,
                                format!("expected value '{}', found '{}'", value, actual),
                            ));
                        }
                    }
                    Ok(())
                },
                &options,
            )
            .await
    }

    /// Retry until `condition` reports true
    pub async fn wait_until<F, Fut>(
        &self,
        label: &str,
        mut condition: F,
        opts: &InteractionOptions,
    ) -> ActionOutcome<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let options = self.options(label, opts);
        self.retrier
            .execute(
                || {
                    let check = condition();
                    async move {
                        if check.await? {
                            Ok(())
                        } else {
                            Err(Error::check_failed(label, "condition not met"))
                        }
                    }
                },
                &options,
            )
            .await
    }

    /// Wait for a response matching `url_pattern`, optionally with a given status
    pub async fn wait_for_response(
        &self,
        url_pattern: &str,
        expected_status: Option<u16>,
        opts: &InteractionOptions,
    ) -> ActionOutcome<NetworkResponse> {
        let options = self.options(url_pattern, opts);
        self.retrier
            .execute(
                || async move {
                    let response = self.page.wait_for_response(url_pattern).await?;
                    match expected_status {
                        Some(status) if status != response.status => Err(Error::check_failed(
                            url_pattern,
                            format!("expected status {}, got {}", status, response.status),
                        )),
                        _ => Ok(response),
                    }
                },
                &options,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// In-memory page with scripted element state
    #[derive(Default)]
    struct FakePage {
        visible: bool,
        enabled: bool,
        values: Mutex<HashMap<String, String>>,
        /// Number of fills that silently drop the last character
        truncated_fills: AtomicU32,
        clicks: AtomicU32,
        fills: AtomicU32,
        responses: Mutex<Vec<NetworkResponse>>,
    }

    impl FakePage {
        fn ready() -> Self {
            Self {
                visible: true,
                enabled: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Page for FakePage {
        async fn is_visible(&self, _selector: &str) -> Result<bool> {
            Ok(self.visible)
        }

        async fn is_enabled(&self, _selector: &str) -> Result<bool> {
            Ok(self.enabled)
        }

        async fn click(&self, _selector: &str) -> Result<()> {
            self.clicks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fill(&self, selector: &str, value: &str) -> Result<()> {
            self.fills.fetch_add(1, Ordering::SeqCst);
            let mut written = value.to_string();
            let pending = self.truncated_fills.load(Ordering::SeqCst);
            if pending > 0 {
                self.truncated_fills.store(pending - 1, Ordering::SeqCst);
                written.pop();
            }
            self.values.lock().unwrap().insert(selector.to_string(), written);
            Ok(())
        }

        async fn input_value(&self, selector: &str) -> Result<String> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .get(selector)
                .cloned()
                .unwrap_or_default())
        }

        async fn wait_for_response(&self, url_pattern: &str) -> Result<NetworkResponse> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(Error::Internal(format!("no response for {}", url_pattern)));
            }
            Ok(responses.remove(0))
        }
    }

    fn retrier() -> ActionRetrier {
        ActionRetrier::new(
            RetryOptions::default()
                .with_retries(3)
                .with_delay(Duration::from_millis(10)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_requires_visibility() {
        let page = FakePage {
            visible: false,
            enabled: true,
            ..FakePage::default()
        };
        let interactions = Interactions::new(&page, retrier());

        let outcome = interactions.click("#buy", &InteractionOptions::default()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(page.clicks.load(Ordering::SeqCst), 0);
        assert!(outcome.error.unwrap().to_string().contains("not visible"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_skips_prechecks() {
        let page = FakePage::default();
        let interactions = Interactions::new(&page, retrier());
        let opts = InteractionOptions {
            force: true,
            ..InteractionOptions::default()
        };

        let outcome = interactions.click("#buy", &opts).await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(page.clicks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_retries_partial_write() {
        let page = FakePage::ready();
        page.truncated_fills.store(1, Ordering::SeqCst);
        let interactions = Interactions::new(&page, retrier());

        let outcome = interactions
            .fill("#email", "a@b.c", &InteractionOptions::default())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(page.fills.load(Ordering::SeqCst), 2);
        assert_eq!(page.input_value("#email").await.unwrap(), "a@b.c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_gives_up_when_value_never_sticks() {
        let page = FakePage::ready();
        page.truncated_fills.store(10, Ordering::SeqCst);
        let interactions = Interactions::new(&page, retrier());
        let opts = InteractionOptions {
            retries: Some(2),
            ..InteractionOptions::default()
        };

        let outcome = interactions.fill("#email", "abc", &opts).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 2);
        let message = outcome.error.unwrap().to_string();
        assert!(message.contains("#email"));
        assert!(message.contains("expected value 'abc', found 'ab'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_polls_condition() {
        let page = FakePage::ready();
        let interactions = Interactions::new(&page, retrier());
        let polls = AtomicU32::new(0);

        let outcome = interactions
            .wait_until(
                "cart badge",
                || {
                    let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Ok::<_, Error>(n >= 3) }
                },
                &InteractionOptions::default(),
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_response_checks_status() {
        let page = FakePage::ready();
        page.responses.lock().unwrap().extend([
            NetworkResponse {
                url: "/api/cart".to_string(),
                status: 500,
            },
            NetworkResponse {
                url: "/api/cart".to_string(),
                status: 200,
            },
        ]);
        let interactions = Interactions::new(&page, retrier());

        let outcome = interactions
            .wait_for_response("/api/cart", Some(200), &InteractionOptions::default())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.value.unwrap().status, 200);
    }
}
