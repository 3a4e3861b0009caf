//! Run orchestration
//!
//! Lists both screen sets, reconciles them into a plan, executes every case,
//! and reports the results to the harness in plan order.

use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::comparator::Comparator;
use crate::config::KoboldConfig;
use crate::error::{KoboldError, Result};
use crate::harness::{execute_case, CaseBody, TestHarness};
use crate::pipeline::ComparisonPipeline;
use crate::plan::build_plan;
use crate::reconcile::classify;
use crate::report::RunSummary;
use crate::storage::{FileStorage, StorageAdapter};
use crate::types::{CaseFailure, CaseOutcome, CaseReport, Category, FailureKind, TestCase};
use crate::visual::PixelComparator;

/// Title of the group enclosing every screen
pub const SUITE_TITLE: &str = "Kobold";

/// Composition root of a run
pub struct Orchestrator {
    config: KoboldConfig,
    source: Arc<dyn StorageAdapter>,
    destination: Arc<dyn StorageAdapter>,
    comparator: Arc<dyn Comparator>,
    harness: Arc<dyn TestHarness>,
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    config: KoboldConfig,
    source: Option<Arc<dyn StorageAdapter>>,
    destination: Option<Arc<dyn StorageAdapter>>,
    comparator: Option<Arc<dyn Comparator>>,
    harness: Option<Arc<dyn TestHarness>>,
}

impl OrchestratorBuilder {
    /// Use one adapter for both the source and destination roles
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.source = Some(storage.clone());
        self.destination = Some(storage);
        self
    }

    pub fn source(mut self, source: Arc<dyn StorageAdapter>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: Arc<dyn StorageAdapter>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn harness(mut self, harness: Arc<dyn TestHarness>) -> Self {
        self.harness = Some(harness);
        self
    }

    /// A missing source or destination falls back to the other one
    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;

        let (source, destination) = match (self.source, self.destination) {
            (Some(source), Some(destination)) => (source, destination),
            (Some(one), None) | (None, Some(one)) => (one.clone(), one),
            (None, None) => {
                return Err(KoboldError::InvalidConfig("no storage adapter configured".to_string()))
            }
        };
        let comparator = self
            .comparator
            .ok_or_else(|| KoboldError::InvalidConfig("no comparator configured".to_string()))?;
        let harness = self
            .harness
            .ok_or_else(|| KoboldError::InvalidConfig("no test harness configured".to_string()))?;

        Ok(Orchestrator {
            config: self.config,
            source,
            destination,
            comparator,
            harness,
        })
    }
}

impl Orchestrator {
    pub fn builder(config: KoboldConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            source: None,
            destination: None,
            comparator: None,
            harness: None,
        }
    }

    /// File storage for both roles and the pixel comparator, as configured
    pub fn from_config(config: KoboldConfig, harness: Arc<dyn TestHarness>) -> Result<Self> {
        let source = FileStorage::new(config.build.clone(), config.source_storage().clone());
        let destination = FileStorage::new(config.build.clone(), config.destination_storage().clone());

        Self::builder(config)
            .source(Arc::new(source))
            .destination(Arc::new(destination))
            .comparator(Arc::new(PixelComparator::new()))
            .harness(harness)
            .build()
    }

    /// List both screen sets and turn them into the ordered plan. Either
    /// listing failing fails the whole plan.
    pub async fn plan(&self) -> Result<Vec<TestCase>> {
        debug!("Determine tests");

        let (build, approved) = tokio::join!(
            self.source.list_build_screen_names(),
            self.destination.list_approved_screen_names()
        );
        let build = build.map_err(|e| KoboldError::Listing {
            source_kind: "build".to_string(),
            reason: e.to_string(),
        })?;
        let approved = approved.map_err(|e| KoboldError::Listing {
            source_kind: "approved".to_string(),
            reason: e.to_string(),
        })?;
        debug!(build = build.len(), approved = approved.len(), "Found screens");

        let result = classify(&build, &approved);
        Ok(build_plan(
            &result,
            self.config.fail_for_orphans,
            self.config.fail_on_additions,
        ))
    }

    /// Run every case of the plan. Only a listing failure returns `Err`;
    /// screen failures end up in the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        info!("Running Kobold for build {}", self.config.build);

        let plan = match self.plan().await {
            Ok(plan) => plan,
            Err(e) => {
                debug!("Error determining tests: {}", e);
                self.harness
                    .abort(&CaseFailure::new(FailureKind::ListingFailed, e.to_string()));
                return Err(e);
            }
        };
        self.harness.planned(&plan);

        let pipeline = ComparisonPipeline::new(
            self.source.clone(),
            self.destination.clone(),
            self.comparator.clone(),
            self.config.comparison.clone(),
            self.config.highlight_on_success,
        );

        self.harness.enter_group(SUITE_TITLE);

        // Cases finish in any order; finished ones wait in `pending` until
        // every earlier case of the plan has been reported.
        let pipeline = &pipeline;
        let mut cases = stream::iter(plan.iter().enumerate())
            .map(move |(index, case)| async move {
                (index, execute_case(case, Self::body(case, pipeline)).await)
            })
            .buffer_unordered(self.config.concurrency);

        let mut pending: BTreeMap<usize, CaseReport> = BTreeMap::new();
        let mut reports: Vec<CaseReport> = Vec::with_capacity(plan.len());
        while let Some((index, report)) = cases.next().await {
            pending.insert(index, report?);
            while let Some(report) = pending.remove(&reports.len()) {
                self.harness.enter_group(&report.display_name);
                self.harness.report(&report);
                self.harness.leave_group(&report.display_name);
                reports.push(report);
            }
        }

        self.harness.leave_group(SUITE_TITLE);

        let summary = RunSummary::from_reports(
            self.config.build.clone(),
            reports,
            start.elapsed().as_millis() as u64,
        );
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, summary.duration_ms
        );
        Ok(summary)
    }

    /// Body of one case. Orphans and additions whose policy is off have no
    /// body and end up skipped.
    fn body<'a>(case: &'a TestCase, pipeline: &'a ComparisonPipeline) -> Option<CaseBody<'a>> {
        match case.category {
            Category::Orphan | Category::Addition if case.should_fail != Some(true) => None,
            Category::Orphan => {
                let failure = CaseFailure::new(
                    FailureKind::Orphaned,
                    format!("Approved screen is orphaned: {}", case.name),
                );
                Some(async move { CaseOutcome::failed(failure) }.boxed())
            }
            Category::Addition => {
                let failure = CaseFailure::new(
                    FailureKind::Added,
                    format!("Screen is new: {}", case.name),
                );
                Some(async move { CaseOutcome::failed(failure) }.boxed())
            }
            Category::Comparison => Some(pipeline.run(&case.name).boxed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryStorage, Script, ScriptedComparator};
    use crate::harness::RecordingHarness;
    use crate::types::{CaseStatus, Image};

    fn orchestrator(
        config: KoboldConfig,
        storage: Arc<MemoryStorage>,
        harness: Arc<RecordingHarness>,
    ) -> Orchestrator {
        Orchestrator::builder(config)
            .storage(storage)
            .comparator(Arc::new(ScriptedComparator::new(Script::Pass)))
            .harness(harness)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_capabilities() {
        let result = Orchestrator::builder(KoboldConfig::default())
            .comparator(Arc::new(PixelComparator::new()))
            .harness(Arc::new(RecordingHarness::new()))
            .build();
        assert!(matches!(result, Err(KoboldError::InvalidConfig(_))));

        let result = Orchestrator::builder(KoboldConfig::default())
            .destination(Arc::new(MemoryStorage::new()))
            .harness(Arc::new(RecordingHarness::new()))
            .build();
        assert!(matches!(result, Err(KoboldError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_plan_from_listings() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_build_screen("a", Image::new(1, 1));
        storage.add_build_screen("b", Image::new(1, 1));
        storage.add_approved_screen("b", Image::new(1, 1));
        storage.add_approved_screen("c", Image::new(1, 1));

        let plan = orchestrator(KoboldConfig::default(), storage, Arc::new(RecordingHarness::new()))
            .plan()
            .await
            .unwrap();
        let names: Vec<(&str, Category)> = plan.iter().map(|c| (c.name.as_str(), c.category)).collect();
        assert_eq!(
            names,
            vec![("c", Category::Orphan), ("a", Category::Addition), ("b", Category::Comparison)]
        );
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_once() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_build_screen("a", Image::new(1, 1));
        storage.fail_approved_listing();
        let harness = Arc::new(RecordingHarness::new());

        let err = orchestrator(KoboldConfig::default(), storage.clone(), harness.clone())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, KoboldError::Listing { ref source_kind, .. } if source_kind == "approved"));
        assert_eq!(harness.aborts().len(), 1);
        assert!(harness.reports().is_empty());
        assert_eq!(storage.archive_count(), 0);
    }

    #[tokio::test]
    async fn test_policies_decide_orphan_and_addition_status() {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_build_screen("new-screen", Image::new(1, 1));
        storage.add_approved_screen("old-screen", Image::new(1, 1));

        let harness = Arc::new(RecordingHarness::new());
        let config = KoboldConfig {
            fail_for_orphans: true,
            ..Default::default()
        };
        let summary = orchestrator(config, storage, harness.clone()).run().await.unwrap();

        let orphan = harness.report_for("old-screen").unwrap();
        assert_eq!(orphan.status, CaseStatus::Failed);
        assert_eq!(
            orphan.failure.unwrap().message,
            "Approved screen is orphaned: old-screen"
        );
        assert_eq!(orphan.display_name, "old screen");

        let addition = harness.report_for("new-screen").unwrap();
        assert_eq!(addition.status, CaseStatus::Skipped);
        assert_eq!(addition.title, "is an addition");

        assert_eq!((summary.failed, summary.skipped), (1, 1));
    }
}
