use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::parser::types::Workflow;

/// Stage execution status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

impl StageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Passed | StageStatus::Failed { .. } | StageStatus::Skipped { .. }
        )
    }
}

/// State for one stage of a workflow (authenticate, billing, ...)
#[derive(Debug, Clone)]
pub struct StageState {
    pub index: usize,
    pub name: String,
    pub status: StageStatus,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
}

impl StageState {
    pub fn new(index: usize, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            status: StageStatus::Pending,
            started_at: None,
            duration_ms: None,
        }
    }

    pub fn start(&mut self) {
        self.status = StageStatus::Running;
        self.started_at = Some(Instant::now());
    }

    pub fn pass(&mut self) {
        self.finish(StageStatus::Passed);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(StageStatus::Failed { error });
    }

    fn finish(&mut self, status: StageStatus) {
        self.status = status;
        if let Some(start) = self.started_at {
            self.duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    pub fn to_report(&self) -> StageStateReport {
        StageStateReport {
            index: self.index,
            name: self.name.clone(),
            status: self.status.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStateReport {
    pub index: usize,
    pub name: String,
    pub status: StageStatus,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CaseStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped { reason: String },
}

/// State for a single test case
#[derive(Debug, Clone)]
pub struct CaseState {
    pub test_id: String,
    pub test_name: String,
    pub workflow: Workflow,
    pub source_path: String,
    pub status: CaseStatus,
    pub stages: Vec<StageState>,
    pub started_at: Option<Instant>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    pub error_category: Option<String>,
    pub screenshot_path: Option<String>,
}

impl CaseState {
    pub fn new(test_id: &str, test_name: &str, workflow: Workflow, source_path: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            test_name: test_name.to_string(),
            workflow,
            source_path: source_path.to_string(),
            status: CaseStatus::Pending,
            stages: Vec::new(),
            started_at: None,
            total_duration_ms: None,
            error: None,
            error_category: None,
            screenshot_path: None,
        }
    }

    pub fn start(&mut self) {
        self.status = CaseStatus::Running;
        self.started_at = Some(Instant::now());
    }

    /// Append and start a new stage, returning its index
    pub fn begin_stage(&mut self, name: &str) -> usize {
        let index = self.stages.len();
        let mut stage = StageState::new(index, name);
        stage.start();
        self.stages.push(stage);
        index
    }

    pub fn pass_stage(&mut self, index: usize) -> u64 {
        match self.stages.get_mut(index) {
            Some(stage) => {
                stage.pass();
                stage.duration_ms.unwrap_or(0)
            }
            None => 0,
        }
    }

    pub fn fail_stage(&mut self, index: usize, error: String) -> u64 {
        match self.stages.get_mut(index) {
            Some(stage) => {
                stage.fail(error);
                stage.duration_ms.unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Fail any stage still running, e.g. after the case was cancelled mid-stage
    pub fn fail_running_stages(&mut self, error: &str) {
        for stage in &mut self.stages {
            if stage.status == StageStatus::Running {
                stage.fail(error.to_string());
            }
        }
    }

    pub fn pass(&mut self) {
        self.status = CaseStatus::Passed;
        self.record_duration();
    }

    pub fn fail(&mut self, error: String, category: &str) {
        self.fail_running_stages(&error);
        self.status = CaseStatus::Failed;
        self.error = Some(error);
        self.error_category = Some(category.to_string());
        self.record_duration();
    }

    pub fn skip(&mut self, reason: &str) {
        self.status = CaseStatus::Skipped {
            reason: reason.to_string(),
        };
    }

    fn record_duration(&mut self) {
        if let Some(start) = self.started_at {
            self.total_duration_ms = Some(start.elapsed().as_millis() as u64);
        }
    }

    pub fn display_name(&self) -> String {
        if self.test_name.is_empty() {
            self.test_id.clone()
        } else {
            format!("{}: {}", self.test_id, self.test_name)
        }
    }

    /// Serialize state for reporting (without Instant which isn't serializable)
    pub fn to_report(&self) -> CaseStateReport {
        CaseStateReport {
            test_id: self.test_id.clone(),
            test_name: self.test_name.clone(),
            workflow: self.workflow,
            source_path: self.source_path.clone(),
            status: self.status.clone(),
            stages: self.stages.iter().map(|s| s.to_report()).collect(),
            total_duration_ms: self.total_duration_ms,
            error: self.error.clone(),
            error_category: self.error_category.clone(),
            screenshot_path: self.screenshot_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStateReport {
    pub test_id: String,
    pub test_name: String,
    pub workflow: Workflow,
    pub source_path: String,
    pub status: CaseStatus,
    pub stages: Vec<StageStateReport>,
    pub total_duration_ms: Option<u64>,
    pub error: Option<String>,
    pub error_category: Option<String>,
    pub screenshot_path: Option<String>,
}

/// Global test session state
#[derive(Debug, Clone)]
pub struct TestSessionState {
    pub session_id: String,
    pub cases: Vec<CaseState>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl TestSessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            cases: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn add_cases(&mut self, cases: impl IntoIterator<Item = CaseState>) {
        self.cases.extend(cases);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn has_failures(&self) -> bool {
        self.cases
            .iter()
            .any(|c| matches!(c.status, CaseStatus::Failed))
    }

    pub fn summary(&self) -> TestSummary {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for case in &self.cases {
            match case.status {
                CaseStatus::Passed => passed += 1,
                CaseStatus::Failed => failed += 1,
                CaseStatus::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        let total_duration_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });

        TestSummary {
            session_id: self.session_id.clone(),
            total_cases: self.cases.len() as u32,
            passed,
            failed,
            skipped,
            total_duration_ms,
        }
    }

    /// Serialize state for reporting
    pub fn to_report(&self) -> TestSessionReport {
        TestSessionReport {
            session_id: self.session_id.clone(),
            cases: self.cases.iter().map(|c| c.to_report()).collect(),
            summary: self.summary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub session_id: String,
    pub total_cases: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionReport {
    pub session_id: String,
    pub cases: Vec<CaseStateReport>,
    pub summary: TestSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_case_fails_running_stage() {
        let mut case = CaseState::new("CO_01", "Valid checkout", Workflow::Checkout, "co.csv");
        case.start();
        let first = case.begin_stage("authenticate");
        case.pass_stage(first);
        case.begin_stage("populate cart");

        case.fail("cancelled: timed out".to_string(), "Cancelled");

        assert_eq!(case.status, CaseStatus::Failed);
        assert_eq!(case.stages[0].status, StageStatus::Passed);
        assert!(matches!(case.stages[1].status, StageStatus::Failed { .. }));
        assert_eq!(case.error_category.as_deref(), Some("Cancelled"));
    }

    #[test]
    fn test_summary_counts() {
        let mut session = TestSessionState::new("session");
        let mut passed = CaseState::new("A", "", Workflow::Registration, "r.csv");
        passed.pass();
        let mut failed = CaseState::new("B", "", Workflow::Registration, "r.csv");
        failed.fail("boom".to_string(), "AssertionFailure");
        let mut skipped = CaseState::new("C", "", Workflow::Registration, "r.csv");
        skipped.skip("interrupted");
        session.add_cases([passed, failed, skipped]);

        let summary = session.summary();
        assert_eq!(summary.total_cases, 3);
        assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 1));
        assert!(session.has_failures());
    }

    #[test]
    fn test_report_is_camel_case() {
        let case = CaseState::new("CR_01", "Valid", Workflow::Registration, "r.csv");
        let json = serde_json::to_value(case.to_report()).unwrap();
        assert_eq!(json["testId"], "CR_01");
        assert_eq!(json["workflow"], "registration");
        assert_eq!(json["status"]["type"], "pending");
    }
}
