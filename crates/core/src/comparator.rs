//! Image comparison capability

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Comparison, ComparisonOptions, Image};

/// Compares an approved screen with a build screen.
///
/// The verdict code is owned by the comparator; callers only ever interpret
/// it through [`Comparator::passed`].
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(
        &self,
        approved: &Image,
        build: &Image,
        options: &ComparisonOptions,
    ) -> Result<Comparison>;

    fn passed(&self, verdict_code: i32) -> bool;
}
