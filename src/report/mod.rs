pub mod json;
pub mod junit;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;

/// Re-render a saved `test-results.json` file
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let results = std::fs::read_to_string(results_path)
        .with_context(|| format!("Failed to read results: {}", results_path.display()))?;
    let test_results: types::TestResults = serde_json::from_str(&results)
        .with_context(|| format!("Invalid results file: {}", results_path.display()))?;

    match format {
        "json" => json::generate(&test_results, output),
        "junit" => junit::generate(&test_results, output),
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Write every report format into the output directory
pub fn write_all(results: &types::TestResults, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;
    json::write_report(results, output_dir)?;
    junit::write_report(results, output_dir)
}
