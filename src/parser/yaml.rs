use super::types::{StepSpec, WorkflowFile};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::runner::condition::Condition;
use crate::runner::poller::PollBound;
use crate::runner::step::{Action, Step, WorkflowDefinition};

/// Parse a YAML workflow file
pub fn parse_workflow_file(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_workflow_content(&content)
        .with_context(|| format!("Invalid workflow file: {}", path.display()))
}

/// Parse YAML content into a WorkflowDefinition
pub fn parse_workflow_content(content: &str) -> Result<WorkflowDefinition> {
    let file: WorkflowFile =
        serde_yaml::from_str(content).context("Failed to parse YAML content")?;

    if file.id.trim().is_empty() {
        anyhow::bail!("Workflow id must not be empty");
    }
    if file.steps.is_empty() {
        anyhow::bail!("Workflow '{}' has no steps", file.id);
    }

    let mut steps = Vec::with_capacity(file.steps.len());
    for (index, spec) in file.steps.into_iter().enumerate() {
        let name = spec.name.clone();
        let step = build_step(spec)
            .with_context(|| format!("Step {} ('{}')", index + 1, name))?;
        steps.push(step);
    }

    let name = file.name.unwrap_or_else(|| file.id.clone());
    let mut workflow = WorkflowDefinition::new(&file.id, &name, steps);
    if let Some(banner) = file.error_banner {
        workflow = workflow.with_error_banner(banner);
    }
    Ok(workflow)
}

fn build_step(spec: StepSpec) -> Result<Step> {
    let mut actions = Vec::new();

    if let Some(url) = spec.navigate {
        actions.push(Action::Navigate { url });
    }
    if let Some(auth) = spec.authenticate {
        auth.username.validate().context("authenticate.username")?;
        auth.password.validate().context("authenticate.password")?;
        auth.submit.validate().context("authenticate.submit")?;
        actions.push(Action::Authenticate {
            username: auth.username,
            password: auth.password,
            submit: auth.submit,
        });
    }
    if let Some(target) = spec.click {
        target.validate().context("click")?;
        actions.push(Action::Click { target });
    }
    if let Some(input) = spec.input {
        input.target.validate().context("input.target")?;
        actions.push(Action::Input {
            target: input.target,
            text: input.text,
        });
    }
    if let Some(upload) = spec.upload {
        upload.target.validate().context("upload.target")?;
        if upload.path.as_os_str().is_empty() {
            anyhow::bail!("upload.path must not be empty");
        }
        actions.push(Action::Upload {
            target: upload.target,
            path: upload.path,
        });
    }
    if let Some(poll) = spec.poll_for {
        validate_condition(&poll.condition)?;
        actions.push(Action::PollFor {
            condition: poll.condition,
            bound: bound_from(poll.attempts, poll.interval_ms),
        });
    }

    if actions.len() != 1 {
        anyhow::bail!(
            "expected exactly one action (navigate, authenticate, click, input, upload, pollFor), found {}",
            actions.len()
        );
    }
    let action = actions.remove(0);

    let mut step = Step::new(&spec.name, action)
        .with_postcondition_bound(bound_from(spec.postcondition_attempts, spec.postcondition_interval_ms));
    if let Some(condition) = spec.postcondition {
        validate_condition(&condition)?;
        step = step.with_postcondition(condition);
    }
    if let Some(ms) = spec.settle_ms {
        step = step.with_settle(Duration::from_millis(ms));
    }
    Ok(step)
}

fn bound_from(attempts: Option<u32>, interval_ms: Option<u64>) -> PollBound {
    let default = PollBound::default();
    PollBound::new(
        attempts.unwrap_or(default.max_attempts),
        interval_ms.map(Duration::from_millis).unwrap_or(default.interval),
    )
}

/// Locators nested anywhere in a condition must be usable
fn validate_condition(condition: &Condition) -> Result<()> {
    match condition {
        Condition::Visible(locator) => locator.validate().context("visible")?,
        Condition::All(items) | Condition::Any(items) => {
            for item in items {
                validate_condition(item)?;
            }
        }
        Condition::Not(inner) => validate_condition(inner)?,
        Condition::Overlay { selector, .. } if selector.trim().is_empty() => {
            anyhow::bail!("overlay selector must not be empty")
        }
        _ => {}
    }
    Ok(())
}
