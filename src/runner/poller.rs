//! Bounded wait-until-true polling
//!
//! The driven application gives no push signal for UI readiness, so state
//! transitions are detected by re-evaluating a condition a bounded number of
//! times. Evaluation errors (an element detached mid-check) count as "not
//! yet" and are logged.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use crate::driver::Browser;
use crate::error::{E2eError, Result};
use crate::runner::condition::{Condition, ErrorBanner};

/// Attempt count and interval for one polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBound {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollBound {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound of the time spent sleeping between evaluations
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for PollBound {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

/// Evaluate `condition` until it yields `true`, at most `max_attempts` times.
///
/// Sleeps `interval` between unsuccessful evaluations but never after the
/// last one. Never fails: exhaustion returns `false` and the caller decides
/// whether that is fatal. A `max_attempts` of zero is treated as one.
pub async fn poll_until<F, Fut>(mut condition: F, max_attempts: u32, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match condition().await {
            Ok(true) => {
                log::debug!("Condition satisfied on attempt {}/{}", attempt, max_attempts);
                return true;
            }
            Ok(false) => {
                log::debug!("Condition not satisfied ({}/{})", attempt, max_attempts);
            }
            Err(e) => {
                log::warn!(
                    "Condition check failed on attempt {}/{}: {}",
                    attempt,
                    max_attempts,
                    e
                );
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    false
}

/// Poll a [`Condition`] against a live session
pub async fn poll_condition(browser: &dyn Browser, condition: &Condition, bound: PollBound) -> bool {
    poll_until(
        move || condition.evaluate(browser),
        bound.max_attempts,
        bound.interval,
    )
    .await
}

/// Poll a [`Condition`] while watching for an application error banner.
///
/// The banner is checked before the condition on every tick; a detected
/// banner ends the wait at once with [`E2eError::ApplicationError`].
pub async fn poll_guarded(
    browser: &dyn Browser,
    condition: &Condition,
    bound: PollBound,
    guard: Option<&ErrorBanner>,
) -> Result<bool> {
    let detected = OnceLock::new();
    let slot = &detected;

    let satisfied = poll_until(
        move || async move {
            if let Some(banner) = guard {
                if let Some(text) = banner.detect(browser).await {
                    let _ = slot.set(text);
                    return Ok(true);
                }
            }
            condition.evaluate(browser).await
        },
        bound.max_attempts,
        bound.interval,
    )
    .await;

    match detected.into_inner() {
        Some(text) => Err(E2eError::ApplicationError(text)),
        None => Ok(satisfied),
    }
}
