//! Core types shared by the reconciliation, comparison, and archiving stages

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{KoboldError, Result};

/// Identifier of one screenshot across the build and approved sets.
///
/// Compared by exact string equality.
pub type ScreenName = String;

/// Decoded screenshot pixels
pub type Image = image::RgbaImage;

/// Comparator options keyed by option name
pub type ComparisonOptions = serde_json::Map<String, serde_json::Value>;

/// Per-screen comparator options, merged over the global [`ComparisonOptions`]
pub type ScreenConfigOverride = serde_json::Map<String, serde_json::Value>;

/// Which side of the reconciliation a screen landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Approved screen with no build screen
    Orphan,
    /// Build screen with no approved screen
    Addition,
    /// Present in both sets
    Comparison,
}

impl Category {
    /// Title of the case registered for this category
    pub fn case_title(&self) -> &'static str {
        match self {
            Category::Orphan => "is orphaned",
            Category::Addition => "is an addition",
            Category::Comparison => "should be similar",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Orphan => write!(f, "orphan"),
            Category::Addition => write!(f, "addition"),
            Category::Comparison => write!(f, "comparison"),
        }
    }
}

/// One planned test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: ScreenName,
    pub category: Category,
    /// Fixed when the plan is built. `None` for comparisons, whose verdict
    /// comes from the pipeline.
    pub should_fail: Option<bool>,
}

/// Lifecycle of a single case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Passed | CaseStatus::Failed | CaseStatus::Skipped)
    }

    /// Move to `to`, rejecting anything outside
    /// `Pending -> Running -> {Passed, Failed}` and `Pending -> Skipped`.
    pub fn transition(self, to: CaseStatus) -> Result<CaseStatus> {
        use CaseStatus::*;
        match (self, to) {
            (Pending, Running) | (Pending, Skipped) | (Running, Passed) | (Running, Failed) => Ok(to),
            _ => Err(KoboldError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Running => "running",
            CaseStatus::Passed => "passed",
            CaseStatus::Failed => "failed",
            CaseStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why a case failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    ListingFailed,
    ApprovedLoadFailed,
    BuildLoadFailed,
    ComparisonFailed,
    ArchiveFailed,
    ScreensDifferent,
    Orphaned,
    Added,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ListingFailed => "listing-failed",
            FailureKind::ApprovedLoadFailed => "approved-load-failed",
            FailureKind::BuildLoadFailed => "build-load-failed",
            FailureKind::ComparisonFailed => "comparison-failed",
            FailureKind::ArchiveFailed => "archive-failed",
            FailureKind::ScreensDifferent => "screens-different",
            FailureKind::Orphaned => "orphaned",
            FailureKind::Added => "added",
        };
        f.write_str(s)
    }
}

/// Failure attached to a finished case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CaseFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Verdict returned by a [`Comparator`](crate::comparator::Comparator)
#[derive(Debug, Clone)]
pub struct Comparison {
    pub verdict_code: i32,
    /// Visualization of the differing pixels, if the comparator produced one
    pub highlight: Option<Image>,
}

/// Result of a finished comparison, ready for archiving
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub passed: bool,
    pub verdict_code: i32,
    pub approved_image: Option<Image>,
    pub build_image: Option<Image>,
    pub highlight_image: Option<Image>,
}

/// What a case body hands back when it completes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseOutcome {
    pub verdict_code: Option<i32>,
    pub archived: Option<ArchiveReceipt>,
    /// `None` means the case passed
    pub failure: Option<CaseFailure>,
}

impl CaseOutcome {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn failed(failure: CaseFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }
}

/// Archivable artifact of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Approved,
    Build,
    Highlight,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Approved => write!(f, "approved"),
            ArtifactKind::Build => write!(f, "build"),
            ArtifactKind::Highlight => write!(f, "highlight"),
        }
    }
}

/// Which artifacts of an outcome get persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveDecision {
    pub approved: bool,
    pub build: bool,
    pub highlight: bool,
}

impl ArchiveDecision {
    pub fn is_empty(&self) -> bool {
        !(self.approved || self.build || self.highlight)
    }
}

/// Artifacts archived for one screen, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReceipt {
    pub archived: Vec<ArtifactKind>,
}

impl ArchiveReceipt {
    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.archived.contains(&kind)
    }
}

/// Terminal record of one case as handed to the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: ScreenName,
    /// Human-facing label of the screen
    pub display_name: String,
    pub category: Category,
    pub title: String,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<ArchiveReceipt>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_status_transitions() {
        assert_eq!(
            CaseStatus::Pending.transition(CaseStatus::Running).unwrap(),
            CaseStatus::Running
        );
        assert_eq!(
            CaseStatus::Pending.transition(CaseStatus::Skipped).unwrap(),
            CaseStatus::Skipped
        );
        assert!(CaseStatus::Running.transition(CaseStatus::Failed).is_ok());
        assert!(CaseStatus::Pending.transition(CaseStatus::Passed).is_err());
        assert!(CaseStatus::Passed.transition(CaseStatus::Failed).is_err());
        assert!(CaseStatus::Running.transition(CaseStatus::Skipped).is_err());
    }

    #[test]
    fn test_only_finished_statuses_are_terminal() {
        assert!(!CaseStatus::Pending.is_terminal());
        assert!(!CaseStatus::Running.is_terminal());
        assert!(CaseStatus::Passed.is_terminal());
        assert!(CaseStatus::Failed.is_terminal());
        assert!(CaseStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_failure_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureKind::ApprovedLoadFailed).unwrap();
        assert_eq!(json, "\"approved-load-failed\"");
        assert_eq!(FailureKind::ApprovedLoadFailed.to_string(), "approved-load-failed");
    }
}
