use super::types::TestResults;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate JSON report
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
        println!("    Generated JSON report: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `test-results.json` into the output directory
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<()> {
    generate(results, Some(&output_dir.join("test-results.json")))
}
