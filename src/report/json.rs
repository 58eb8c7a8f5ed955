use super::types::TestResults;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "test-results.json";

/// Generate JSON report
pub async fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `test-results.json` into the output directory
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::Workflow;
    use crate::runner::state::{CaseState, TestSessionState};

    #[test]
    fn test_written_report_reads_back() {
        let mut session = TestSessionState::new("session-1");
        let mut case = CaseState::new("CO_01", "Valid checkout", Workflow::Checkout, "co.csv");
        case.start();
        case.fail("Expected error message \"City is required\" was not displayed".to_string(), "AssertionFailure");
        session.add_cases([case]);

        let dir = tempfile::tempdir().unwrap();
        let path = write_report(&TestResults::from_session(&session), dir.path()).unwrap();
        assert_eq!(path, dir.path().join(RESULTS_FILE));

        let content = std::fs::read_to_string(&path).unwrap();
        let read: TestResults = serde_json::from_str(&content).unwrap();
        assert_eq!(read.session_id, "session-1");
        assert_eq!(read.cases[0].error_category.as_deref(), Some("AssertionFailure"));
        assert_eq!(read.summary.failed, 1);
    }
}
