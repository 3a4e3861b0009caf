//! Run summary

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::types::{CaseReport, CaseStatus};

/// Result of a whole run, cases in plan order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub build: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub cases: Vec<CaseReport>,
}

impl RunSummary {
    pub fn from_reports(build: impl Into<String>, cases: Vec<CaseReport>, duration_ms: u64) -> Self {
        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
        Self {
            build: build.into(),
            total: cases.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            duration_ms,
            cases,
        }
    }

    /// No case failed
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    /// Write the summary as `kobold-results.json` into `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("kobold-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
