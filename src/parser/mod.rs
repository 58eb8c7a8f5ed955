pub mod ingest;
pub mod loader;
pub mod tokenizer;
pub mod types;

pub use ingest::{convert_sheet, IngestReport, RecordIngestor, SheetRow};
pub use loader::{load_test_cases, read_test_cases, LoadedCases};
pub use tokenizer::{tokenize, TokenizedField};
pub use types::{CheckoutFields, RegistrationFields, TestCaseRecord, Workflow, WorkflowFields};
