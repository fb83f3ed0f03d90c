pub mod classifier;
pub mod condition;
pub mod diagnostics;
pub mod events;
pub mod locator;
pub mod orchestrator;
pub mod poller;
pub mod state;
pub mod step;

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::driver::BrowserFactory;
use crate::report::types::TestResults;
use crate::utils::config::RunConfig;

pub use events::*;
pub use orchestrator::{AttemptOrchestrator, RetryPolicy};
pub use state::*;

/// Collect workflow files from files and directories, in a stable order
pub fn collect_workflow_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_type().is_file()
                        && e.path()
                            .extension()
                            .map_or(false, |ext| ext == "yaml" || ext == "yml")
                })
                .map(|e| e.path().to_path_buf())
                .collect();
            found.sort();
            all_files.extend(found);
        } else if path.is_file() {
            all_files.push(path.clone());
        } else {
            anyhow::bail!("Workflow path does not exist: {}", path.display());
        }
    }

    Ok(all_files)
}

/// Run every workflow under `paths` and write the reports.
///
/// Returns the collected results; a workflow file that fails to parse is
/// an error for the whole run, before any browser is started.
pub async fn run_workflows<F: BrowserFactory>(
    paths: &[PathBuf],
    factory: F,
    config: RunConfig,
    emitter: EventEmitter,
) -> Result<TestResults> {
    let files = collect_workflow_files(paths)?;
    if files.is_empty() {
        println!("{} No workflow files found.", "ℹ".blue());
    }

    let workflows = files
        .iter()
        .map(|file| crate::parser::parse_workflow_file(file))
        .collect::<Result<Vec<_>>>()?;

    let run_id = uuid::Uuid::new_v4().to_string();
    emitter.emit(TestEvent::RunStarted {
        run_id: run_id.clone(),
        workflow_count: workflows.len(),
    });

    let output_dir = config.output_dir.clone();
    let orchestrator = AttemptOrchestrator::new(factory, config).with_emitter(emitter.clone());

    let mut outcomes = Vec::with_capacity(workflows.len());
    for workflow in &workflows {
        outcomes.push(orchestrator.run_with_history(workflow).await);
    }

    let results = TestResults::new(&run_id, outcomes);
    emitter.emit(TestEvent::RunFinished {
        summary: results.summary.clone(),
    });

    crate::report::write_all(&results, &output_dir)?;
    Ok(results)
}
