//! Test plan construction

use crate::reconcile::ReconciliationResult;
use crate::types::{Category, TestCase};

/// Build one case per reconciled screen: orphans, then additions, then
/// comparisons, each in reconciliation order.
pub fn build_plan(
    result: &ReconciliationResult,
    fail_for_orphans: bool,
    fail_on_additions: bool,
) -> Vec<TestCase> {
    let mut plan = Vec::with_capacity(result.total());

    plan.extend(result.orphans.iter().map(|name| TestCase {
        name: name.clone(),
        category: Category::Orphan,
        should_fail: Some(fail_for_orphans),
    }));
    plan.extend(result.additions.iter().map(|name| TestCase {
        name: name.clone(),
        category: Category::Addition,
        should_fail: Some(fail_on_additions),
    }));
    plan.extend(result.comparisons.iter().map(|name| TestCase {
        name: name.clone(),
        category: Category::Comparison,
        should_fail: None,
    }));

    plan
}
