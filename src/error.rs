use thiserror::Error;

/// A spreadsheet row that could not be turned into a test case.
///
/// Raised per row: the remaining rows of the sheet are still converted.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("row {row}: malformed record: {source}")]
    Malformed {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("row {row}: missing column '{column}'")]
    MissingColumn { row: usize, column: &'static str },

    #[error("row {row}: test case ID is empty")]
    EmptyTestId { row: usize },

    #[error("row {row} ({test_id}): unknown input field '{key}' for {workflow} workflow")]
    UnknownField {
        row: usize,
        test_id: String,
        key: String,
        workflow: &'static str,
    },
}

/// Failure to load a test-case CSV back into typed records.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read test cases: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("column '{column}' is not a {workflow} field")]
    UnknownColumn {
        column: String,
        workflow: &'static str,
    },

    #[error("could not detect workflow from header: {0}")]
    UnknownWorkflow(String),

    #[error("line {line}: testId is empty")]
    EmptyTestId { line: u64 },

    #[error("line {line}: duplicate testId '{test_id}'")]
    DuplicateTestId { line: u64, test_id: String },
}

/// An expectation about the UI that did not hold.
#[derive(Debug, Error)]
pub enum AssertionFailure {
    #[error("Expected {kind} message \"{expected}\" was not displayed ({selector} not visible within {timeout_ms}ms)")]
    NotDisplayed {
        kind: &'static str,
        selector: String,
        expected: String,
        timeout_ms: u64,
    },

    #[error("Expected {kind} message to contain \"{expected}\" but got \"{actual}\"")]
    Mismatch {
        kind: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Expected page to navigate to \"{expected}\" within {timeout_ms}ms, but it stayed on \"{actual}\"")]
    NavigationTimeout {
        expected: String,
        actual: String,
        timeout_ms: u64,
    },

    #[error("Login as {email} failed: {reason}")]
    LoginFailed { email: String, reason: String },
}

/// Why a single test case failed.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error("driver error: {0:#}")]
    Driver(#[from] anyhow::Error),

    #[error("cancelled: {reason}")]
    Cancelled { reason: String },
}

impl CaseError {
    /// Category reported to the caller. Driver failures are indistinguishable
    /// from assertion failures at this level.
    pub fn category(&self) -> &'static str {
        match self {
            CaseError::Assertion(_) | CaseError::Driver(_) => "AssertionFailure",
            CaseError::Cancelled { .. } => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_and_assertion_share_category() {
        let assertion = CaseError::from(AssertionFailure::Mismatch {
            kind: "error",
            expected: "City is required".to_string(),
            actual: "Postcode is required".to_string(),
        });
        let driver = CaseError::from(anyhow::anyhow!("selector never attached"));
        let cancelled = CaseError::Cancelled {
            reason: "timed out".to_string(),
        };

        assert_eq!(assertion.category(), driver.category());
        assert_eq!(cancelled.category(), "Cancelled");
    }

    #[test]
    fn test_not_displayed_and_mismatch_messages_differ() {
        let missing = AssertionFailure::NotDisplayed {
            kind: "error",
            selector: ".alert.alert-danger".to_string(),
            expected: "City is required".to_string(),
            timeout_ms: 5000,
        };
        let mismatch = AssertionFailure::Mismatch {
            kind: "error",
            expected: "City is required".to_string(),
            actual: "State is required".to_string(),
        };

        assert!(missing.to_string().contains("was not displayed"));
        assert!(mismatch.to_string().contains("but got \"State is required\""));
    }
}
