use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::parser::types::Workflow;

/// Where a run writes its artifacts
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Output directory for reports
    pub output_dir: PathBuf,
    /// Root of the per-workflow screenshot folders
    pub screenshot_dir: PathBuf,
}

impl TestContext {
    /// A relative `screenshot_dir` is placed inside `output_dir`.
    pub fn new(output_dir: &Path, screenshot_dir: &Path) -> Result<Self> {
        let screenshot_dir = if screenshot_dir.is_absolute() {
            screenshot_dir.to_path_buf()
        } else {
            output_dir.join(screenshot_dir)
        };

        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            screenshot_dir,
        })
    }

    pub fn screenshot_path(&self, workflow: Workflow, test_id: &str) -> PathBuf {
        screenshot_path(&self.screenshot_dir, workflow, test_id)
    }
}

/// Screenshot location for a test case.
///
/// Depends only on the workflow and the id, so parallel cases never collide.
pub fn screenshot_path(root: &Path, workflow: Workflow, test_id: &str) -> PathBuf {
    let id = sanitize_id(test_id);
    match workflow {
        Workflow::Checkout => root.join("checkout").join(format!("checkout-{}.png", id)),
        Workflow::Registration => root.join("registration").join(format!("{}.png", id)),
    }
}

fn sanitize_id(test_id: &str) -> String {
    test_id.replace(['/', '\\'], "_")
}
