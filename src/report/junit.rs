use super::types::TestResults;
use crate::parser::types::Workflow;
use crate::runner::state::{CaseStateReport, CaseStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const JUNIT_FILE: &str = "junit.xml";

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

fn count(cases: &[&CaseStateReport]) -> (usize, usize) {
    let failures = cases
        .iter()
        .filter(|c| matches!(c.status, CaseStatus::Failed))
        .count();
    let skipped = cases
        .iter()
        .filter(|c| matches!(c.status, CaseStatus::Skipped { .. }))
        .count();
    (failures, skipped)
}

/// Generate JUnit XML report string from TestResults.
///
/// One `<testsuite>` per workflow, one `<testcase>` per test case.
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let all: Vec<&CaseStateReport> = results.cases.iter().collect();
    let (failures, skipped) = count(&all);
    let total_duration: u64 = all.iter().map(|c| c.total_duration_ms.unwrap_or(0)).sum();

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-ddt-run"));
    suites_start.push_attribute(("tests", all.len().to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("skipped", skipped.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(total_duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    for workflow in [Workflow::Registration, Workflow::Checkout] {
        let cases: Vec<&CaseStateReport> = results
            .cases
            .iter()
            .filter(|c| c.workflow == workflow)
            .collect();
        if cases.is_empty() {
            continue;
        }

        let (failures, skipped) = count(&cases);
        let duration: u64 = cases.iter().map(|c| c.total_duration_ms.unwrap_or(0)).sum();

        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", workflow.name()));
        suite_start.push_attribute(("tests", cases.len().to_string().as_str()));
        suite_start.push_attribute(("failures", failures.to_string().as_str()));
        suite_start.push_attribute(("skipped", skipped.to_string().as_str()));
        suite_start.push_attribute(("id", results.session_id.as_str()));
        suite_start.push_attribute(("time", seconds(duration).as_str()));
        suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
        writer.write_event(Event::Start(suite_start))?;

        for case in cases {
            write_test_case(&mut writer, case)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    case: &CaseStateReport,
) -> Result<()> {
    let name = if case.test_name.is_empty() {
        case.test_id.clone()
    } else {
        format!("{}: {}", case.test_id, case.test_name)
    };
    let classname = format!("{}.{}", case.workflow.name(), case.source_path.replace('/', "."));

    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", name.as_str()));
    case_start.push_attribute(("classname", classname.as_str()));
    case_start.push_attribute(("time", seconds(case.total_duration_ms.unwrap_or(0)).as_str()));
    writer.write_event(Event::Start(case_start))?;

    match &case.status {
        CaseStatus::Failed => {
            let mut fail_start = BytesStart::new("failure");
            fail_start
                .push_attribute(("message", case.error.as_deref().unwrap_or("Unknown error")));
            fail_start.push_attribute((
                "type",
                case.error_category.as_deref().unwrap_or("AssertionFailure"),
            ));
            writer.write_event(Event::Start(fail_start))?;

            if let Some(err) = &case.error {
                writer.write_event(Event::Text(BytesText::new(err)))?;
            }

            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        CaseStatus::Skipped { reason } => {
            let mut skip = BytesStart::new("skipped");
            skip.push_attribute(("message", reason.as_str()));
            writer.write_event(Event::Empty(skip))?;
        }
        _ => {}
    }

    if let Some(path) = &case.screenshot_path {
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&format!(
            "[[ATTACHMENT|{}]]",
            path
        ))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Generate JUnit report to a file or stdout
pub async fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let xml = generate_junit_xml(results)?;

    if let Some(path) = output {
        std::fs::write(path, xml)?;
        println!("JUnit report saved to: {}", path.display());
    } else {
        println!("{}", xml);
    }

    Ok(())
}

/// Write `junit.xml` into the output directory
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let xml = generate_junit_xml(results)?;
    let path = output_dir.join(JUNIT_FILE);
    std::fs::write(&path, xml)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{StageStateReport, StageStatus, TestSummary};

    fn case(id: &str, workflow: Workflow, status: CaseStatus, error: Option<&str>) -> CaseStateReport {
        CaseStateReport {
            test_id: id.to_string(),
            test_name: "Scenario".to_string(),
            workflow,
            source_path: "data/cases.csv".to_string(),
            status,
            stages: vec![StageStateReport {
                index: 0,
                name: "authenticate".to_string(),
                status: StageStatus::Passed,
                duration_ms: Some(100),
            }],
            total_duration_ms: Some(1500),
            error: error.map(str::to_string),
            error_category: error.map(|_| "AssertionFailure".to_string()),
            screenshot_path: None,
        }
    }

    #[test]
    fn test_generate_junit_xml() {
        let results = TestResults {
            session_id: "test-session".to_string(),
            cases: vec![
                case("CR_01", Workflow::Registration, CaseStatus::Passed, None),
                case(
                    "CO_02",
                    Workflow::Checkout,
                    CaseStatus::Failed,
                    Some("Expected error message \"City is required\" was not displayed"),
                ),
                case(
                    "CO_03",
                    Workflow::Checkout,
                    CaseStatus::Skipped {
                        reason: "interrupted".to_string(),
                    },
                    None,
                ),
            ],
            summary: TestSummary {
                session_id: "test-session".to_string(),
                total_cases: 3,
                passed: 1,
                failed: 1,
                skipped: 1,
                total_duration_ms: Some(4500),
            },
            generated_at: "2024-01-01 12:00:00".to_string(),
        };

        let xml = generate_junit_xml(&results).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="lumi-ddt-run" tests="3" failures="1" skipped="1""#));
        assert!(xml.contains(r#"<testsuite name="registration" tests="1" failures="0""#));
        assert!(xml.contains(r#"<testsuite name="checkout" tests="2" failures="1" skipped="1""#));
        assert!(xml.contains(r#"<testcase name="CR_01: Scenario" classname="registration.data.cases.csv""#));
        assert!(xml.contains(r#"message="Expected error message &quot;City is required&quot; was not displayed""#));
        assert!(xml.contains(r#"<skipped message="interrupted"/>"#));
    }
}
