//! Classification of the free-text `expectedResult` column.
//!
//! Matching is plain substring search: "error" anywhere selects the error path,
//! otherwise "successful"/"successfully" selects the success path.

/// Which banner the test case expects at the end of its flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Error,
}

impl OutcomeKind {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Error => "error",
        }
    }
}

/// Assertion intent derived from `expectedResult`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeIntent {
    pub kind: OutcomeKind,
    /// Fragment the banner text must contain. For errors this is the text after
    /// the colon; `None` when there is nothing after it.
    pub message: Option<String>,
}

impl OutcomeIntent {
    /// Fragment to search for, empty when any banner text is acceptable
    pub fn fragment(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// Classify an `expectedResult` string.
///
/// Returns `None` when neither "error" nor "successful" occurs; callers skip
/// the final assertion in that case.
pub fn classify(expected_result: &str) -> Option<OutcomeIntent> {
    let lower = expected_result.to_lowercase();

    if lower.contains("error") {
        return Some(OutcomeIntent {
            kind: OutcomeKind::Error,
            message: error_message(expected_result),
        });
    }

    // "successfully" contains "successful"
    if lower.contains("successful") {
        return Some(OutcomeIntent {
            kind: OutcomeKind::Success,
            message: Some(expected_result.to_string()),
        });
    }

    None
}

/// `"Error: City is required."` → `"City is required"`.
///
/// Only the text between the first and the second colon is used.
fn error_message(expected_result: &str) -> Option<String> {
    let part = expected_result.split(':').nth(1)?.trim();
    let part = part.strip_suffix('.').unwrap_or(part).trim_end();
    if part.is_empty() {
        None
    } else {
        Some(part.to_string())
    }
}

/// Whether a checkout case should stop after the billing step.
///
/// Billing validation errors surface before payment; account-related errors
/// only show up once payment is submitted. An error without a message never
/// stops early.
pub fn stops_after_billing(intent: Option<&OutcomeIntent>, expected_result: &str) -> bool {
    matches!(intent, Some(i) if i.kind == OutcomeKind::Error && i.message.is_some())
        && !expected_result.to_lowercase().contains("account")
}
