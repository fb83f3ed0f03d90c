use crate::runner::state::{RunOutcome, RunSummary};
use serde::{Deserialize, Serialize};

/// Results of one run, as saved to `test-results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub run_id: String,
    pub workflows: Vec<RunOutcome>,
    pub summary: RunSummary,
    pub generated_at: String,
}

impl TestResults {
    pub fn new(run_id: &str, workflows: Vec<RunOutcome>) -> Self {
        let summary = RunSummary::from_outcomes(&workflows);
        Self {
            run_id: run_id.to_string(),
            workflows,
            summary,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }
}
