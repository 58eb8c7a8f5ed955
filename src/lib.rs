pub mod driver;
pub mod error;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use parser::convert_sheet;
pub use report::generate_report;
pub use runner::run_tests;
pub use utils::HarnessConfig;
