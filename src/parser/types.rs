use serde::Deserialize;
use std::path::PathBuf;

use crate::runner::condition::{Condition, ErrorBanner};
use crate::runner::locator::Locator;

/// Workflow file as written on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowFile {
    pub id: String,
    /// Display name, defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error_banner: Option<ErrorBanner>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// One step; exactly one of the action keys must be present
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepSpec {
    pub name: String,

    // Actions
    #[serde(default)]
    pub navigate: Option<String>,
    #[serde(default)]
    pub authenticate: Option<AuthenticateParams>,
    #[serde(default)]
    pub click: Option<Locator>,
    #[serde(default)]
    pub input: Option<InputParams>,
    #[serde(default)]
    pub upload: Option<UploadParams>,
    #[serde(default)]
    pub poll_for: Option<PollForParams>,

    #[serde(default)]
    pub postcondition: Option<Condition>,
    #[serde(default)]
    pub postcondition_attempts: Option<u32>,
    #[serde(default)]
    pub postcondition_interval_ms: Option<u64>,
    /// Pause after the action, before the postcondition (ms)
    #[serde(default)]
    pub settle_ms: Option<u64>,
}

/// Parameters for authenticate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateParams {
    pub username: Locator,
    pub password: Locator,
    pub submit: Locator,
}

/// Parameters for input
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParams {
    pub target: Locator,
    pub text: String,
}

/// Parameters for upload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    pub target: Locator,
    pub path: PathBuf,
}

/// Parameters for pollFor
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollForParams {
    pub condition: Condition,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}
