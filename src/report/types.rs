use crate::runner::state::{CaseStateReport, TestSessionState, TestSummary};
use serde::{Deserialize, Serialize};

/// Test results for report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    pub cases: Vec<CaseStateReport>,
    pub summary: TestSummary,
    pub generated_at: String,
}

impl TestResults {
    pub fn from_session(session: &TestSessionState) -> Self {
        let report = session.to_report();
        Self {
            session_id: report.session_id,
            cases: report.cases,
            summary: report.summary,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
