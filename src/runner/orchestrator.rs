//! Attempt-level retry loop
//!
//! Per workflow: `CREATE_SESSION -> RUN_WORKFLOW -> PASSED | FAILED ->
//! DECIDE_RETRY`. Every session created here is closed here, whatever the
//! outcome.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{Browser, BrowserFactory};
use crate::error::{E2eError, Result};
use crate::runner::classifier::FailureClassifier;
use crate::runner::diagnostics::ScreenshotCapture;
use crate::runner::events::{EventEmitter, TestEvent};
use crate::runner::state::{AttemptResult, RunOutcome};
use crate::runner::step::{StepContext, StepExecutor, WorkflowDefinition};
use crate::utils::config::RunConfig;

/// How many times a workflow may be attempted, and the pause in between
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_seconds: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay_seconds: f64) -> Self {
        Self {
            max_attempts,
            retry_delay_seconds,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(E2eError::Config("maxAttempts must be at least 1".to_string()));
        }
        if !self.retry_delay_seconds.is_finite() || self.retry_delay_seconds < 0.0 {
            return Err(E2eError::Config(format!(
                "retryDelaySeconds must be a non-negative number, got {}",
                self.retry_delay_seconds
            )));
        }
        if Duration::try_from_secs_f64(self.retry_delay_seconds).is_err() {
            return Err(E2eError::Config(format!(
                "retryDelaySeconds is too large, got {}",
                self.retry_delay_seconds
            )));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay_seconds).unwrap_or(Duration::ZERO)
    }
}

/// One finished attempt and what the retry decision needs to know about it
struct AttemptOutcome {
    result: AttemptResult,
    retryable: bool,
}

pub struct AttemptOrchestrator<F: BrowserFactory> {
    factory: F,
    config: RunConfig,
    policy: RetryPolicy,
    classifier: FailureClassifier,
    executor: StepExecutor,
    screenshots: ScreenshotCapture,
    emitter: EventEmitter,
}

impl<F: BrowserFactory> AttemptOrchestrator<F> {
    pub fn new(factory: F, config: RunConfig) -> Self {
        let screenshots = ScreenshotCapture::new(config.screenshot_dir());
        Self {
            factory,
            policy: config.retry,
            config,
            classifier: FailureClassifier,
            executor: StepExecutor,
            screenshots,
            emitter: EventEmitter::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Run a workflow and return the authoritative (last) attempt
    pub async fn run(&self, workflow: &WorkflowDefinition) -> AttemptResult {
        self.run_attempts(workflow).await.1
    }

    /// Run a workflow and keep every attempt
    pub async fn run_with_history(&self, workflow: &WorkflowDefinition) -> RunOutcome {
        let (mut attempts, last) = self.run_attempts(workflow).await;
        attempts.push(last);
        RunOutcome {
            test_id: workflow.id().to_string(),
            test_name: workflow.name().to_string(),
            attempts,
        }
    }

    /// Earlier attempts plus the final one
    async fn run_attempts(&self, workflow: &WorkflowDefinition) -> (Vec<AttemptResult>, AttemptResult) {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut history = Vec::new();
        let mut attempt_number = 1;

        loop {
            let outcome = self.run_attempt(workflow, attempt_number, max_attempts).await;

            if outcome.result.is_passed() {
                return (history, outcome.result);
            }
            if !outcome.retryable {
                let message = format!(
                    "{}: attempt {} failed with a non-retryable error, not retrying",
                    workflow.id(),
                    attempt_number
                );
                log::info!("{}", message);
                self.emitter.log(message);
                return (history, outcome.result);
            }
            if attempt_number >= max_attempts {
                let message = format!(
                    "{}: giving up after {} attempts",
                    workflow.id(),
                    attempt_number
                );
                log::info!("{}", message);
                self.emitter.log(message);
                return (history, outcome.result);
            }

            history.push(outcome.result);
            attempt_number += 1;

            self.emitter.emit(TestEvent::RetryScheduled {
                test_name: workflow.name().to_string(),
                next_attempt: attempt_number,
                delay_seconds: self.policy.retry_delay_seconds,
            });
            tokio::time::sleep(self.policy.retry_delay()).await;
        }
    }

    async fn run_attempt(
        &self,
        workflow: &WorkflowDefinition,
        attempt_number: u32,
        max_attempts: u32,
    ) -> AttemptOutcome {
        log::info!(
            "{}: attempt {}/{}",
            workflow.id(),
            attempt_number,
            max_attempts
        );
        self.emitter.emit(TestEvent::AttemptStarted {
            test_name: workflow.name().to_string(),
            attempt: attempt_number,
            max_attempts,
        });

        let mut result = AttemptResult::new(attempt_number);
        let session_config = self.config.session_config();

        // CREATE_SESSION
        let browser = match self.factory.create(&session_config).await {
            Ok(browser) => browser,
            Err(e) => {
                let err = into_session_error(e);
                log::warn!("Could not create browser session: {}", err);
                result.fail(err.to_string());
                return self.finish_attempt(workflow, result, self.classifier.is_retryable(&err));
            }
        };

        let outcome = match browser.configure(&session_config).await {
            Ok(()) => self.run_contained(browser.as_ref(), workflow, &mut result).await,
            Err(e) => Err(Failure::Error(into_session_error(e))),
        };

        let retryable = match outcome {
            Ok(()) => {
                close_quietly(browser.as_ref()).await;
                result.pass();
                false
            }
            Err(failure) => {
                let context = format!("{}_failure_attempt_{}", workflow.id(), attempt_number);
                if let Some(path) = self.screenshots.capture(browser.as_ref(), &context).await {
                    result.add_screenshot(path);
                }
                close_quietly(browser.as_ref()).await;

                let retryable = match failure {
                    Failure::Error(ref err) => self.classifier.is_retryable(err),
                    Failure::Panic(_) => false,
                };
                let message = failure.to_string();
                log::warn!("{}: attempt {} failed: {}", workflow.id(), attempt_number, message);
                result.fail(message);
                retryable
            }
        };

        self.finish_attempt(workflow, result, retryable)
    }

    fn finish_attempt(
        &self,
        workflow: &WorkflowDefinition,
        result: AttemptResult,
        retryable: bool,
    ) -> AttemptOutcome {
        self.emitter.emit(TestEvent::AttemptFinished {
            test_name: workflow.name().to_string(),
            attempt: result.attempt_number(),
            status: result.status(),
            duration_seconds: result.execution_time_seconds(),
            error: result.error_message().map(str::to_string),
        });
        AttemptOutcome { result, retryable }
    }

    /// RUN_WORKFLOW with panics turned into failures
    async fn run_contained(
        &self,
        browser: &dyn Browser,
        workflow: &WorkflowDefinition,
        result: &mut AttemptResult,
    ) -> std::result::Result<(), Failure> {
        match AssertUnwindSafe(self.run_workflow(browser, workflow, result))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(Failure::Error(err)),
            Err(payload) => Err(Failure::Panic(panic_message(payload.as_ref()))),
        }
    }

    async fn run_workflow(
        &self,
        browser: &dyn Browser,
        workflow: &WorkflowDefinition,
        result: &mut AttemptResult,
    ) -> Result<()> {
        let ctx = StepContext {
            browser,
            config: &self.config,
            error_banner: workflow.error_banner(),
        };

        for (index, step) in workflow.steps().iter().enumerate() {
            self.emitter.emit(TestEvent::StepStarted {
                index,
                step: step.name.clone(),
            });
            let started = Instant::now();

            match self.executor.execute(step, result, &ctx).await {
                Ok(()) => self.emitter.emit(TestEvent::StepPassed {
                    index,
                    duration_ms: started.elapsed().as_millis() as u64,
                }),
                Err(err) => {
                    self.emitter.emit(TestEvent::StepFailed {
                        index,
                        error: err.to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

/// Why RUN_WORKFLOW ended early
enum Failure {
    Error(E2eError),
    Panic(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Error(err) => write!(f, "{}", err),
            Failure::Panic(message) => write!(f, "browser driver error: workflow panicked: {}", message),
        }
    }
}

fn into_session_error(err: E2eError) -> E2eError {
    match err {
        E2eError::Session(_) => err,
        other => E2eError::Session(other.to_string()),
    }
}

async fn close_quietly(browser: &dyn Browser) {
    if let Err(e) = browser.close().await {
        log::warn!("Ignoring error while closing browser session: {}", e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
