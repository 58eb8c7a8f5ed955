use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::types::{
    TestCaseRecord, Workflow, COL_EXPECTED_RESULT, COL_PRECONDITION, COL_TEST_ID, COL_TEST_NAME,
};
use crate::error::LoadError;

/// Test cases read from one CSV file
#[derive(Debug, Clone)]
pub struct LoadedCases {
    pub workflow: Workflow,
    pub records: Vec<TestCaseRecord>,
}

enum Column {
    TestId,
    TestName,
    Precondition,
    ExpectedResult,
    Field(&'static str),
}

/// Read test cases from a CSV file.
///
/// When `workflow` is `None` it is detected from the header.
pub fn load_test_cases(path: &Path, workflow: Option<Workflow>) -> Result<LoadedCases> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open test cases: {}", path.display()))?;
    let loaded = read_test_cases(file, workflow)
        .with_context(|| format!("Failed to load test cases from {}", path.display()))?;
    log::info!(
        "Loaded {} {} test cases from {}",
        loaded.records.len(),
        loaded.workflow,
        path.display()
    );
    Ok(loaded)
}

/// Read test cases from any CSV source.
///
/// Empty cells are treated as absent fields. Blank lines are skipped.
pub fn read_test_cases<R: Read>(
    reader: R,
    workflow: Option<Workflow>,
) -> Result<LoadedCases, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let workflow = match workflow {
        Some(w) => w,
        None => Workflow::detect(headers.iter())
            .ok_or_else(|| LoadError::UnknownWorkflow(headers.iter().collect::<Vec<_>>().join(",")))?,
    };

    let columns = map_columns(&headers, workflow)?;

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let mut record = TestCaseRecord::new("", "", "", workflow.empty_fields(), "");
        for (column, value) in columns.iter().zip(row.iter()) {
            match column {
                Column::TestId => record.test_id = value.trim().to_string(),
                Column::TestName => record.test_name = value.to_string(),
                Column::Precondition => record.precondition = value.to_string(),
                Column::ExpectedResult => record.expected_result = value.to_string(),
                Column::Field(name) => {
                    if !value.is_empty() {
                        record.fields.set(name, value);
                    }
                }
            }
        }

        if record.test_id.is_empty() {
            return Err(LoadError::EmptyTestId { line });
        }
        if !seen.insert(record.test_id.clone()) {
            return Err(LoadError::DuplicateTestId {
                line,
                test_id: record.test_id,
            });
        }
        records.push(record);
    }

    Ok(LoadedCases { workflow, records })
}

fn map_columns(headers: &csv::StringRecord, workflow: Workflow) -> Result<Vec<Column>, LoadError> {
    let mut columns = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let column = match header {
            COL_TEST_ID => Column::TestId,
            COL_TEST_NAME => Column::TestName,
            COL_PRECONDITION => Column::Precondition,
            COL_EXPECTED_RESULT => Column::ExpectedResult,
            _ => match workflow.field_names().iter().find(|f| **f == header) {
                Some(name) => Column::Field(name),
                None => {
                    return Err(LoadError::UnknownColumn {
                        column: header.to_string(),
                        workflow: workflow.name(),
                    })
                }
            },
        };
        columns.push(column);
    }

    for required in [COL_TEST_ID, COL_TEST_NAME, COL_PRECONDITION, COL_EXPECTED_RESULT] {
        if !headers.iter().any(|h| h == required) {
            return Err(LoadError::MissingColumn(required));
        }
    }

    Ok(columns)
}
