//! Workflow steps and the step executor

use std::path::PathBuf;
use std::time::Duration;

use crate::driver::Browser;
use crate::error::{E2eError, Result};
use crate::runner::condition::{Condition, ErrorBanner};
use crate::runner::locator::{self, Locator};
use crate::runner::poller::{self, PollBound};
use crate::runner::state::{AttemptResult, StepStatus};
use crate::utils::config::RunConfig;

/// What a step does to the page
#[derive(Debug, Clone)]
pub enum Action {
    /// Load a page; relative URLs are joined to the configured base URL
    Navigate { url: String },
    /// Fill the configured credentials and submit
    Authenticate {
        username: Locator,
        password: Locator,
        submit: Locator,
    },
    Click { target: Locator },
    /// Replace an input's value; supports `${username}`, `${password}` and
    /// `${baseUrl}` placeholders
    Input { target: Locator, text: String },
    /// Select a local file in an `<input type=file>`; relative paths are
    /// taken from the working directory
    Upload { target: Locator, path: PathBuf },
    /// Wait for a condition, aborting early if the error banner shows up
    PollFor { condition: Condition, bound: PollBound },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Authenticate { .. } => "authenticate",
            Action::Click { .. } => "click",
            Action::Input { .. } => "input",
            Action::Upload { .. } => "upload",
            Action::PollFor { .. } => "pollFor",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub action: Action,
    pub postcondition: Option<Condition>,
    pub postcondition_bound: PollBound,
    /// Fixed pause between the action and the postcondition
    pub settle: Option<Duration>,
}

impl Step {
    pub fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            action,
            postcondition: None,
            postcondition_bound: PollBound::default(),
            settle: None,
        }
    }

    pub fn with_postcondition(mut self, condition: Condition) -> Self {
        self.postcondition = Some(condition);
        self
    }

    pub fn with_postcondition_bound(mut self, bound: PollBound) -> Self {
        self.postcondition_bound = bound;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = Some(settle);
        self
    }
}

/// An ordered, immutable test case
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    id: String,
    name: String,
    steps: Vec<Step>,
    error_banner: Option<ErrorBanner>,
}

impl WorkflowDefinition {
    pub fn new(id: &str, name: &str, steps: Vec<Step>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            steps,
            error_banner: None,
        }
    }

    pub fn with_error_banner(mut self, banner: ErrorBanner) -> Self {
        self.error_banner = Some(banner);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn error_banner(&self) -> Option<&ErrorBanner> {
        self.error_banner.as_ref()
    }
}

/// Everything a step may touch during one attempt
pub struct StepContext<'a> {
    pub browser: &'a dyn Browser,
    pub config: &'a RunConfig,
    pub error_banner: Option<&'a ErrorBanner>,
}

/// Runs one step and records its RUNNING and terminal records
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor;

impl StepExecutor {
    /// Errors come back wrapped with the step name; the record is
    /// `RUNNING` followed by `SUCCESS` or `FAILED`.
    pub async fn execute(
        &self,
        step: &Step,
        result: &mut AttemptResult,
        ctx: &StepContext<'_>,
    ) -> Result<()> {
        result.record_step(&step.name, StepStatus::Running);
        log::info!("Step '{}' ({})", step.name, step.action.name());

        match self.run(step, ctx).await {
            Ok(()) => {
                result.record_step(&step.name, StepStatus::Success);
                Ok(())
            }
            Err(err) => {
                result.record_step(&step.name, StepStatus::Failed);
                Err(E2eError::in_step(&step.name, err))
            }
        }
    }

    async fn run(&self, step: &Step, ctx: &StepContext<'_>) -> Result<()> {
        let outcome = self.perform_and_verify(step, ctx).await;

        match (outcome, &step.action) {
            (Err(err), Action::Authenticate { .. }) => match ctx.error_banner {
                Some(banner) => match banner.detect(ctx.browser).await {
                    Some(text) => Err(E2eError::ApplicationError(text)),
                    None => Err(err),
                },
                None => Err(err),
            },
            (outcome, _) => outcome,
        }
    }

    async fn perform_and_verify(&self, step: &Step, ctx: &StepContext<'_>) -> Result<()> {
        self.perform(&step.action, ctx).await?;

        if let Some(settle) = step.settle {
            tokio::time::sleep(settle).await;
        }

        if let Some(ref condition) = step.postcondition {
            let bound = step.postcondition_bound;
            if !poller::poll_condition(ctx.browser, condition, bound).await {
                return Err(E2eError::ConditionTimeout {
                    description: condition.describe(),
                    attempts: bound.max_attempts.max(1),
                });
            }
        }
        Ok(())
    }

    async fn perform(&self, action: &Action, ctx: &StepContext<'_>) -> Result<()> {
        let browser = ctx.browser;
        match action {
            Action::Navigate { url } => {
                let url = join_url(&ctx.config.base_url, url);
                browser.navigate(&url).await.map_err(|e| match e {
                    E2eError::Navigation(_) => e,
                    other => E2eError::Navigation(format!("{}: {}", url, other)),
                })
            }
            Action::Authenticate {
                username,
                password,
                submit,
            } => {
                let field = locator::resolve(browser, username).await?;
                browser.set_value(&field, &ctx.config.test_username).await?;
                let field = locator::resolve(browser, password).await?;
                browser.set_value(&field, &ctx.config.test_password).await?;
                let button = locator::resolve(browser, submit).await?;
                browser.click(&button).await
            }
            Action::Click { target } => {
                let element = locator::resolve(browser, target).await?;
                browser.click(&element).await
            }
            Action::Input { target, text } => {
                let element = locator::resolve(browser, target).await?;
                browser
                    .set_value(&element, &substitute(text, ctx.config))
                    .await
            }
            Action::Upload { target, path } => {
                if !path.is_file() {
                    return Err(E2eError::Driver(format!(
                        "upload file not found: {}",
                        path.display()
                    )));
                }
                let element = locator::resolve(browser, target).await?;
                browser.set_input_files(&element, path).await
            }
            Action::PollFor { condition, bound } => {
                log::debug!(
                    "Waiting up to {:?} for {}",
                    bound.max_wait(),
                    condition.describe()
                );
                let satisfied =
                    poller::poll_guarded(browser, condition, *bound, ctx.error_banner).await?;
                if satisfied {
                    Ok(())
                } else {
                    Err(E2eError::ConditionTimeout {
                        description: condition.describe(),
                        attempts: bound.max_attempts.max(1),
                    })
                }
            }
        }
    }
}

/// Absolute URLs pass through; anything else is appended to `base`
pub fn join_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = url.trim_start_matches('/');
    if path.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, path)
    }
}

fn substitute(text: &str, config: &RunConfig) -> String {
    text.replace("${username}", &config.test_username)
        .replace("${password}", &config.test_password)
        .replace("${baseUrl}", &config.base_url)
}
