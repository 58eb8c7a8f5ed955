//! Sheet → test-case CSV conversion.
//!
//! A feature worksheet (exported as CSV) has the columns `ID`, `Test case name`,
//! `Precondition`, `Input` and `Expected Result`. Each row becomes one
//! [`TestCaseRecord`], projected onto the workflow's CSV layout.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::tokenizer::tokenize;
use super::types::{TestCaseRecord, Workflow};
use crate::error::IngestionError;

pub const SHEET_ID: &str = "ID";
pub const SHEET_TEST_NAME: &str = "Test case name";
pub const SHEET_PRECONDITION: &str = "Precondition";
pub const SHEET_INPUT: &str = "Input";
pub const SHEET_EXPECTED_RESULT: &str = "Expected Result";

const SHEET_COLUMNS: &[&str] = &[
    SHEET_ID,
    SHEET_TEST_NAME,
    SHEET_PRECONDITION,
    SHEET_INPUT,
    SHEET_EXPECTED_RESULT,
];

/// One worksheet row as authored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "Test case name", default)]
    pub test_case_name: Option<String>,
    #[serde(rename = "Precondition", default)]
    pub precondition: Option<String>,
    #[serde(rename = "Input", default)]
    pub input: Option<String>,
    #[serde(rename = "Expected Result", default)]
    pub expected_result: Option<String>,
}

/// Outcome of converting a whole sheet
#[derive(Debug, Default)]
pub struct IngestReport {
    pub written: usize,
    pub errors: Vec<IngestionError>,
}

/// Maps worksheet rows onto typed test cases of one workflow
#[derive(Debug, Clone, Copy)]
pub struct RecordIngestor {
    workflow: Workflow,
}

impl RecordIngestor {
    pub fn new(workflow: Workflow) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    /// Turn one worksheet row into a test case.
    ///
    /// `row` is the sheet line number used in error messages.
    pub fn ingest_row(&self, sheet_row: &SheetRow, row: usize) -> Result<TestCaseRecord, IngestionError> {
        let test_id = sheet_row
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(IngestionError::EmptyTestId { row })?;

        let mut fields = self.workflow.empty_fields();
        if let Some(input) = sheet_row.input.as_deref() {
            let tokenized = tokenize(input);

            for segment in &tokenized.dropped {
                log::warn!(
                    "row {} ({}): ignoring input segment without '=': {:?}",
                    row,
                    test_id,
                    segment
                );
            }
            if tokenized.unterminated_quote {
                log::warn!(
                    "row {} ({}): unterminated quote in input, later commas were kept as text",
                    row,
                    test_id
                );
            }

            // Later duplicates overwrite earlier ones.
            for field in tokenized.fields {
                if !fields.set(&field.key, field.value) {
                    return Err(IngestionError::UnknownField {
                        row,
                        test_id: test_id.to_string(),
                        key: field.key,
                        workflow: self.workflow.name(),
                    });
                }
            }
        }

        Ok(TestCaseRecord::new(
            test_id,
            sheet_row.test_case_name.clone().unwrap_or_default(),
            sheet_row.precondition.clone().unwrap_or_default(),
            fields,
            sheet_row.expected_result.clone().unwrap_or_default(),
        ))
    }

    /// Convert a worksheet export into the workflow's test-case CSV.
    ///
    /// Rows that fail are collected in the report and skipped; every other row
    /// is written.
    pub fn convert<R: Read, W: Write>(&self, reader: R, writer: W) -> Result<IngestReport> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let headers = rdr.headers().context("Failed to read sheet header")?.clone();
        let missing: Option<&'static str> = SHEET_COLUMNS
            .iter()
            .copied()
            .find(|column| !headers.iter().any(|h| h == *column));

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.workflow.csv_header())?;

        let mut report = IngestReport::default();
        for (idx, result) in rdr.records().enumerate() {
            let fallback_row = idx + 2;
            let record = match result {
                Ok(record) => record,
                Err(source) => {
                    let row = source
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(fallback_row);
                    report.errors.push(IngestionError::Malformed { row, source });
                    continue;
                }
            };
            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(fallback_row);

            if let Some(column) = missing {
                report.errors.push(IngestionError::MissingColumn { row, column });
                continue;
            }

            let sheet_row: SheetRow = match record.deserialize(Some(&headers)) {
                Ok(sheet_row) => sheet_row,
                Err(source) => {
                    report.errors.push(IngestionError::Malformed { row, source });
                    continue;
                }
            };

            match self.ingest_row(&sheet_row, row) {
                Ok(test_case) => {
                    write_row(&mut wtr, &test_case)?;
                    report.written += 1;
                }
                Err(e) => report.errors.push(e),
            }
        }

        wtr.flush()?;
        Ok(report)
    }
}

/// Append one test case to a CSV writer using the workflow layout.
pub fn write_row<W: Write>(writer: &mut csv::Writer<W>, record: &TestCaseRecord) -> Result<()> {
    writer
        .write_record(record.to_csv_row())
        .with_context(|| format!("Failed to write test case {}", record.test_id))
}

/// Convert a worksheet export file into a test-case CSV file
pub fn convert_sheet(sheet: &Path, workflow: Workflow, output: &Path) -> Result<IngestReport> {
    let input = File::open(sheet)
        .with_context(|| format!("Failed to open sheet: {}", sheet.display()))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let out = File::create(output)
        .with_context(|| format!("Failed to create output: {}", output.display()))?;

    log::info!(
        "Converting {} as {} test cases into {}",
        sheet.display(),
        workflow,
        output.display()
    );
    RecordIngestor::new(workflow).convert(input, out)
}
