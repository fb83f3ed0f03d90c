use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::time::Instant;

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Running,
    Passed,
    Failed,
}

/// Status carried by one step record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step_name: String,
    pub status: StepStatus,
    pub timestamp: DateTime<Local>,
}

/// Append-only record of one attempt
///
/// Step records are only ever pushed; a step that runs twice (or two steps
/// sharing a name) shows up as separate records in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    attempt_number: u32,
    start_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    status: AttemptStatus,
    steps: Vec<StepRecord>,
    screenshots: Vec<PathBuf>,
    error_message: Option<String>,
    execution_time_seconds: f64,
    #[serde(skip)]
    started: Option<Instant>,
}

impl AttemptResult {
    pub fn new(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            start_time: Local::now(),
            end_time: None,
            status: AttemptStatus::Running,
            steps: Vec::new(),
            screenshots: Vec::new(),
            error_message: None,
            execution_time_seconds: 0.0,
            started: Some(Instant::now()),
        }
    }

    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn is_passed(&self) -> bool {
        self.status == AttemptStatus::Passed
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn screenshots(&self) -> &[PathBuf] {
        &self.screenshots
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn execution_time_seconds(&self) -> f64 {
        self.execution_time_seconds
    }

    pub(crate) fn record_step(&mut self, step_name: &str, status: StepStatus) {
        self.steps.push(StepRecord {
            step_name: step_name.to_string(),
            status,
            timestamp: Local::now(),
        });
    }

    pub(crate) fn add_screenshot(&mut self, path: PathBuf) {
        self.screenshots.push(path);
    }

    pub(crate) fn pass(&mut self) {
        self.finish(AttemptStatus::Passed);
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.error_message = Some(message);
        self.finish(AttemptStatus::Failed);
    }

    fn finish(&mut self, status: AttemptStatus) {
        self.status = status;
        self.end_time = Some(Local::now());
        if let Some(start) = self.started {
            let secs = start.elapsed().as_secs_f64();
            self.execution_time_seconds = (secs * 100.0).round() / 100.0;
        }
    }
}

/// Every attempt made for one workflow; the last one is authoritative
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub test_id: String,
    pub test_name: String,
    pub attempts: Vec<AttemptResult>,
}

impl RunOutcome {
    pub fn final_result(&self) -> Option<&AttemptResult> {
        self.attempts.last()
    }

    pub fn passed(&self) -> bool {
        self.final_result().map_or(false, AttemptResult::is_passed)
    }

    pub fn final_error(&self) -> Option<&str> {
        self.final_result().and_then(AttemptResult::error_message)
    }

    /// Wall time across attempts, excluding retry delays
    pub fn execution_time_seconds(&self) -> f64 {
        self.attempts
            .iter()
            .map(AttemptResult::execution_time_seconds)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub total_attempts: u32,
    pub duration_seconds: f64,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[RunOutcome]) -> Self {
        let passed = outcomes.iter().filter(|o| o.passed()).count() as u32;
        let duration: f64 = outcomes.iter().map(RunOutcome::execution_time_seconds).sum();
        Self {
            total: outcomes.len() as u32,
            passed,
            failed: outcomes.len() as u32 - passed,
            total_attempts: outcomes.iter().map(|o| o.attempts.len() as u32).sum(),
            duration_seconds: (duration * 100.0).round() / 100.0,
        }
    }
}
