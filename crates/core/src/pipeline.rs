//! Per-screen comparison pipeline
//!
//! Stages, strictly in order for one screen:
//!
//! 1. load the approved screen (fatal to the screen)
//! 2. load the build screen (fatal to the screen)
//! 3. load the screen's config override (failure means no override); runs
//!    alongside stages 1 and 2
//! 4. compare with the merged options, then archive the artifacts
//!
//! Every stage outcome is a value handed to the next stage; a screen's
//! failure never reaches another screen.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::archive::ResultArchiver;
use crate::comparator::Comparator;
use crate::config::merge_options;
use crate::storage::StorageAdapter;
use crate::types::{
    CaseFailure, CaseOutcome, ComparisonOptions, ComparisonOutcome, FailureKind, Image,
    ScreenConfigOverride,
};

/// Human-facing label of a screen name: `-` becomes a space, `_` becomes
/// `" - "`, and whitespace runs collapse to one space.
pub fn display_name(name: &str) -> String {
    let expanded = name.replace('-', " ").replace('_', " - ");

    let mut label = String::with_capacity(expanded.len());
    let mut in_whitespace = false;
    for c in expanded.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                label.push(' ');
            }
            in_whitespace = true;
        } else {
            label.push(c);
            in_whitespace = false;
        }
    }
    label
}

/// Output of stages 1 and 2
struct LoadedScreens {
    approved: Image,
    build: Image,
}

/// Runs the comparison stages for one screen at a time
#[derive(Clone)]
pub struct ComparisonPipeline {
    source: Arc<dyn StorageAdapter>,
    destination: Arc<dyn StorageAdapter>,
    comparator: Arc<dyn Comparator>,
    options: ComparisonOptions,
    archiver: ResultArchiver,
}

impl ComparisonPipeline {
    /// Approved screens and screen configs are read from `source`, build
    /// screens from `destination`, and archives go to `destination`.
    pub fn new(
        source: Arc<dyn StorageAdapter>,
        destination: Arc<dyn StorageAdapter>,
        comparator: Arc<dyn Comparator>,
        options: ComparisonOptions,
        highlight_on_success: bool,
    ) -> Self {
        let archiver = ResultArchiver::new(destination.clone(), highlight_on_success);
        Self {
            source,
            destination,
            comparator,
            options,
            archiver,
        }
    }

    /// Run all stages for `name`
    #[instrument(skip_all, fields(screen = %name))]
    pub async fn run(&self, name: &str) -> CaseOutcome {
        let (screens, overrides) = tokio::join!(self.load_screens(name), self.load_config(name));

        let LoadedScreens { approved, build } = match screens {
            Ok(screens) => screens,
            Err(failure) => {
                debug!(kind = %failure.kind, "Pipeline aborted");
                return CaseOutcome::failed(failure);
            }
        };

        let outcome = match self.compare(name, approved, build, &overrides).await {
            Ok(outcome) => outcome,
            Err(failure) => return CaseOutcome::failed(failure),
        };

        self.finish(name, outcome).await
    }

    async fn load_screens(&self, name: &str) -> Result<LoadedScreens, CaseFailure> {
        let approved = self.source.load_approved_screen(name).await.map_err(|e| {
            CaseFailure::new(
                FailureKind::ApprovedLoadFailed,
                format!("Approved screen is not loaded for {}: {}", name, e),
            )
        })?;
        debug!("Loaded approved screen");

        let build = self.destination.load_build_screen(name).await.map_err(|e| {
            CaseFailure::new(
                FailureKind::BuildLoadFailed,
                format!("Build screen is not loaded for {}: {}", name, e),
            )
        })?;
        debug!("Loaded build screen");

        Ok(LoadedScreens { approved, build })
    }

    async fn load_config(&self, name: &str) -> ScreenConfigOverride {
        match self.source.load_screen_config(name).await {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config of screen '{}': {}", name, e);
                ScreenConfigOverride::new()
            }
        }
    }

    async fn compare(
        &self,
        name: &str,
        approved: Image,
        build: Image,
        overrides: &ScreenConfigOverride,
    ) -> Result<ComparisonOutcome, CaseFailure> {
        let options = merge_options(&self.options, overrides);

        let comparison = self
            .comparator
            .compare(&approved, &build, &options)
            .await
            .map_err(|e| {
                CaseFailure::new(
                    FailureKind::ComparisonFailed,
                    format!("Comparison of {} failed: {}", name, e),
                )
            })?;

        let passed = self.comparator.passed(comparison.verdict_code);
        debug!(verdict_code = comparison.verdict_code, passed, "Compared screens");

        Ok(ComparisonOutcome {
            passed,
            verdict_code: comparison.verdict_code,
            approved_image: Some(approved),
            build_image: Some(build),
            highlight_image: comparison.highlight,
        })
    }

    /// Archive the outcome, then turn it into the case verdict. An archive
    /// failure fails the case even when the screens matched.
    async fn finish(&self, name: &str, outcome: ComparisonOutcome) -> CaseOutcome {
        let verdict_code = Some(outcome.verdict_code);

        let receipt = match self.archiver.archive(name, &outcome).await {
            Ok(receipt) => receipt,
            Err(e) => {
                return CaseOutcome {
                    verdict_code,
                    archived: None,
                    failure: Some(CaseFailure::new(
                        FailureKind::ArchiveFailed,
                        format!("Archiving of {} failed: {}", name, e),
                    )),
                };
            }
        };

        let failure = (!outcome.passed).then(|| {
            CaseFailure::new(
                FailureKind::ScreensDifferent,
                format!("Screens are different for {}", name),
            )
        });

        CaseOutcome {
            verdict_code,
            archived: Some(receipt),
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryStorage, Script, ScriptedComparator, StorageCall, SCRIPTED_DIFFERENT};
    use crate::types::ArtifactKind;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("foo-bar_baz", "foo bar - baz" ; "hyphen and underscore")]
    #[test_case("login", "login" ; "plain name")]
    #[test_case("a--b", "a b" ; "hyphen run collapses")]
    #[test_case("tab\tand  spaces", "tab and spaces" ; "whitespace collapses")]
    #[test_case("checkout_step-2", "checkout - step 2" ; "mixed")]
    fn test_display_name(input: &str, expected: &str) {
        assert_eq!(display_name(input), expected);
    }

    #[test]
    fn test_display_name_idempotent_without_separators() {
        for name in ["home page", "dashboard", "  spaced   out "] {
            let once = display_name(name);
            assert_eq!(display_name(&once), once);
        }
    }

    fn storage_with(name: &str) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.add_approved_screen(name, Image::new(3, 3));
        storage.add_build_screen(name, Image::new(3, 3));
        storage
    }

    fn pipeline(
        storage: Arc<MemoryStorage>,
        comparator: Arc<ScriptedComparator>,
        highlight_on_success: bool,
    ) -> ComparisonPipeline {
        let mut options = ComparisonOptions::new();
        options.insert("threshold".into(), json!(0.5));
        options.insert("tolerance".into(), json!(5));
        ComparisonPipeline::new(storage.clone(), storage, comparator, options, highlight_on_success)
    }

    #[tokio::test]
    async fn test_passing_comparison_archives_without_highlight() {
        let storage = storage_with("home");
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        let outcome = pipeline(storage.clone(), comparator, false).run("home").await;

        assert!(outcome.failure.is_none());
        assert_eq!(storage.archived("home"), vec![ArtifactKind::Approved, ArtifactKind::Build]);
        assert!(!outcome.archived.unwrap().contains(ArtifactKind::Highlight));
    }

    #[tokio::test]
    async fn test_different_screens_fail_and_archive_highlight() {
        let storage = storage_with("home");
        let comparator = Arc::new(ScriptedComparator::new(Script::Differ));
        let outcome = pipeline(storage.clone(), comparator, false).run("home").await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::ScreensDifferent);
        assert_eq!(failure.message, "Screens are different for home");
        assert_eq!(outcome.verdict_code, Some(SCRIPTED_DIFFERENT));
        assert_eq!(storage.archived("home").len(), 3);
    }

    #[tokio::test]
    async fn test_approved_load_failure_aborts_before_build_load() {
        let storage = storage_with("login");
        storage.fail_approved_load("login");
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        let outcome = pipeline(storage.clone(), comparator.clone(), false).run("login").await;

        assert_eq!(outcome.failure.unwrap().kind, FailureKind::ApprovedLoadFailed);
        assert!(!storage.calls().contains(&StorageCall::LoadBuild("login".into())));
        assert!(comparator.seen_options().is_empty());
        assert_eq!(storage.archive_count(), 0);
    }

    #[tokio::test]
    async fn test_build_load_failure() {
        let storage = storage_with("login");
        storage.fail_build_load("login");
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        let outcome = pipeline(storage.clone(), comparator, false).run("login").await;

        assert_eq!(outcome.failure.unwrap().kind, FailureKind::BuildLoadFailed);
        assert_eq!(storage.archive_count(), 0);
    }

    #[tokio::test]
    async fn test_config_override_is_merged() {
        let storage = storage_with("home");
        storage.add_screen_config("home", json!({ "threshold": 4.0 }).as_object().cloned().unwrap());
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        pipeline(storage, comparator.clone(), false).run("home").await;

        let seen = comparator.seen_options();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get("threshold"), Some(&json!(4.0)));
        assert_eq!(seen[0].get("tolerance"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_config_load_failure_is_tolerated() {
        let storage = storage_with("home");
        storage.fail_config_load("home");
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        let outcome = pipeline(storage, comparator.clone(), false).run("home").await;

        assert!(outcome.failure.is_none());
        assert_eq!(comparator.seen_options()[0].get("threshold"), Some(&json!(0.5)));
    }

    #[tokio::test]
    async fn test_comparator_error_fails_screen_without_archiving() {
        let storage = storage_with("home");
        let comparator = Arc::new(ScriptedComparator::new(Script::Error("decoder crashed".into())));
        let outcome = pipeline(storage.clone(), comparator, false).run("home").await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::ComparisonFailed);
        assert!(failure.message.contains("decoder crashed"));
        assert_eq!(storage.archive_count(), 0);
    }

    #[tokio::test]
    async fn test_archive_failure_fails_passing_comparison() {
        let storage = storage_with("home");
        storage.fail_archive(ArtifactKind::Approved);
        let comparator = Arc::new(ScriptedComparator::new(Script::Pass));
        let outcome = pipeline(storage, comparator, false).run("home").await;

        assert_eq!(outcome.failure.unwrap().kind, FailureKind::ArchiveFailed);
        assert!(outcome.archived.is_none());
    }
}
