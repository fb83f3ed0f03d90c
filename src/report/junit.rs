use super::types::TestResults;
use crate::runner::state::RunOutcome;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

/// Generate JUnit XML report string from TestResults
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total_tests = results.workflows.len();
    let failures = results.workflows.iter().filter(|w| !w.passed()).count();
    let total_time = results.summary.duration_seconds.to_string();

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-e2e-run"));
    suites_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("time", total_time.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", "workflows"));
    suite_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suite_start.push_attribute(("failures", failures.to_string().as_str()));
    suite_start.push_attribute(("skipped", "0"));
    suite_start.push_attribute(("id", results.run_id.as_str()));
    suite_start.push_attribute(("time", total_time.as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for workflow in &results.workflows {
        write_test_case(&mut writer, workflow)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, workflow: &RunOutcome) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", workflow.test_name.as_str()));
    case_start.push_attribute(("classname", workflow.test_id.as_str()));
    case_start.push_attribute((
        "time",
        workflow.execution_time_seconds().to_string().as_str(),
    ));
    writer.write_event(Event::Start(case_start))?;

    if !workflow.passed() {
        let message = workflow.final_error().unwrap_or("Unknown error");
        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message));
        fail_start.push_attribute(("type", "WorkflowFailure"));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(message)))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    // One line per attempt, then the screenshots it left behind
    let mut log = String::new();
    for attempt in &workflow.attempts {
        log.push_str(&format!(
            "attempt {}: {:?} in {}s",
            attempt.attempt_number(),
            attempt.status(),
            attempt.execution_time_seconds()
        ));
        if let Some(err) = attempt.error_message() {
            log.push_str(&format!(" ({})", err));
        }
        log.push('\n');
        for shot in attempt.screenshots() {
            log.push_str(&format!("  screenshot: {}\n", shot.display()));
        }
    }
    writer.write_event(Event::Start(BytesStart::new("system-out")))?;
    writer.write_event(Event::Text(BytesText::new(&log)))?;
    writer.write_event(Event::End(BytesEnd::new("system-out")))?;

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Generate JUnit report to a file or stdout
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let xml = generate_junit_xml(results)?;
    match output {
        Some(path) => {
            std::fs::write(path, xml)?;
            println!("    Generated JUnit report: {}", path.display());
        }
        None => println!("{}", xml),
    }
    Ok(())
}

/// Write report to file
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<()> {
    generate(results, Some(&output_dir.join("junit.xml")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{AttemptResult, RunOutcome};

    #[test]
    fn test_generate_junit_xml() {
        let mut passed = AttemptResult::new(1);
        passed.pass();
        let mut first = AttemptResult::new(1);
        first.fail("browser session error: chrome not reachable".to_string());
        let mut second = AttemptResult::new(2);
        second.add_screenshot("out/screenshots/checkout_failure_attempt_2_1700000000.png".into());
        second.fail("step 'Pay' failed: element not found: #pay <button>".to_string());

        let results = TestResults::new(
            "run-42",
            vec![
                RunOutcome {
                    test_id: "login".into(),
                    test_name: "Login Flow".into(),
                    attempts: vec![passed],
                },
                RunOutcome {
                    test_id: "checkout".into(),
                    test_name: "Checkout Flow".into(),
                    attempts: vec![first, second],
                },
            ],
        );

        let xml = generate_junit_xml(&results).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="lumi-e2e-run""#));
        assert!(xml.contains(r#"tests="2""#));
        assert!(xml.contains(r#"failures="1""#));
        assert!(xml.contains(r#"<testcase name="Login Flow" classname="login""#));
        assert!(xml.contains("element not found: #pay &lt;button&gt;"));
        assert!(xml.contains("attempt 1: Failed"));
        assert!(xml.contains("checkout_failure_attempt_2_1700000000.png"));
        assert!(!results.all_passed());
    }
}
