//! Archiving of comparison artifacts

use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::debug;

use crate::error::{KoboldError, Result};
use crate::storage::StorageAdapter;
use crate::types::{ArchiveDecision, ArchiveReceipt, ArtifactKind, ComparisonOutcome};

/// Persists the artifacts of finished comparisons
#[derive(Clone)]
pub struct ResultArchiver {
    destination: Arc<dyn StorageAdapter>,
    highlight_on_success: bool,
}

impl ResultArchiver {
    pub fn new(destination: Arc<dyn StorageAdapter>, highlight_on_success: bool) -> Self {
        Self {
            destination,
            highlight_on_success,
        }
    }

    /// Approved and build images are kept whenever present. The highlight
    /// image is kept on failure, or on success with `highlight_on_success`.
    pub fn decide(outcome: &ComparisonOutcome, highlight_on_success: bool) -> ArchiveDecision {
        ArchiveDecision {
            approved: outcome.approved_image.is_some(),
            build: outcome.build_image.is_some(),
            highlight: outcome.highlight_image.is_some()
                && (!outcome.passed || highlight_on_success),
        }
    }

    /// Issue every archive request the decision calls for and wait for all
    /// of them. Any failed request fails the whole archive.
    pub async fn archive(&self, name: &str, outcome: &ComparisonOutcome) -> Result<ArchiveReceipt> {
        let decision = Self::decide(outcome, self.highlight_on_success);
        debug!(?decision, "Archive screen '{}'", name);

        let mut requests: Vec<BoxFuture<'_, Result<ArtifactKind>>> = Vec::new();

        if let (true, Some(image)) = (decision.approved, outcome.approved_image.as_ref()) {
            requests.push(
                self.destination
                    .archive_approved_screen(name, image)
                    .map(|r| r.map(|_| ArtifactKind::Approved))
                    .boxed(),
            );
        }
        if let (true, Some(image)) = (decision.build, outcome.build_image.as_ref()) {
            requests.push(
                self.destination
                    .archive_build_screen(name, image)
                    .map(|r| r.map(|_| ArtifactKind::Build))
                    .boxed(),
            );
        }
        if let (true, Some(image)) = (decision.highlight, outcome.highlight_image.as_ref()) {
            requests.push(
                self.destination
                    .archive_highlight_screen(name, image)
                    .map(|r| r.map(|_| ArtifactKind::Highlight))
                    .boxed(),
            );
        }

        let archived = future::try_join_all(requests).await.map_err(|e| match e {
            KoboldError::Archive(msg) => KoboldError::Archive(msg),
            other => KoboldError::Archive(format!("{}: {}", name, other)),
        })?;

        Ok(ArchiveReceipt { archived })
    }
}
