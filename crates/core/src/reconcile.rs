//! Screen reconciliation
//!
//! Splits the build and approved screen listings into orphans, additions,
//! and comparisons.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::types::ScreenName;

/// Classification of every listed screen name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Approved only, in approved-listing order
    pub orphans: Vec<ScreenName>,
    /// Build only, in build-listing order
    pub additions: Vec<ScreenName>,
    /// Present in both, in approved-listing order
    pub comparisons: Vec<ScreenName>,
}

impl ReconciliationResult {
    pub fn total(&self) -> usize {
        self.orphans.len() + self.additions.len() + self.comparisons.len()
    }
}

/// Classify screen names by set membership.
///
/// A name listed more than once is emitted once, at its first position.
pub fn classify(build_names: &[ScreenName], approved_names: &[ScreenName]) -> ReconciliationResult {
    let build: HashSet<&str> = build_names.iter().map(String::as_str).collect();
    let approved: HashSet<&str> = approved_names.iter().map(String::as_str).collect();

    let mut result = ReconciliationResult::default();

    let mut seen = HashSet::with_capacity(approved_names.len());
    for name in approved_names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if build.contains(name.as_str()) {
            result.comparisons.push(name.clone());
        } else {
            result.orphans.push(name.clone());
        }
    }

    let mut seen = HashSet::with_capacity(build_names.len());
    for name in build_names {
        if seen.insert(name.as_str()) && !approved.contains(name.as_str()) {
            result.additions.push(name.clone());
        }
    }

    debug!(
        orphans = result.orphans.len(),
        additions = result.additions.len(),
        comparisons = result.comparisons.len(),
        "Reconciled screens"
    );
    result
}
