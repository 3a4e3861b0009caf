//! Pixel-by-pixel screenshot comparison

use async_trait::async_trait;
use image::{Pixel, Rgba};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::comparator::Comparator;
use crate::error::{KoboldError, Result};
use crate::types::{Comparison, ComparisonOptions, Image};

/// Comparison could not reach a verdict
pub const RESULT_UNKNOWN: i32 = 0;
/// Differing pixels exceed the threshold
pub const RESULT_DIFFERENT: i32 = 1;
/// Pixel buffers are identical
pub const RESULT_IDENTICAL: i32 = 5;
/// Differing pixels stay within the threshold
pub const RESULT_SIMILAR: i32 = 7;

const DEFAULT_THRESHOLD: f64 = 0.5;
const DEFAULT_TOLERANCE: u8 = 5;

/// Comparator counting pixels whose channels differ by more than a tolerance
#[derive(Debug, Clone, Default)]
pub struct PixelComparator;

/// Options understood by [`PixelComparator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelOptions {
    /// Allowed share of differing pixels (0.0 - 100.0 percent)
    pub threshold: f64,
    /// Per-channel difference treated as equal (anti-aliasing, compression)
    pub tolerance: u8,
}

impl PixelOptions {
    pub fn from_options(options: &ComparisonOptions) -> Result<Self> {
        let threshold = match options.get("threshold") {
            None => DEFAULT_THRESHOLD,
            Some(value) => value
                .as_f64()
                .filter(|t| (0.0..=100.0).contains(t))
                .ok_or_else(|| {
                    KoboldError::Comparison(format!("threshold must be a percentage, got {}", value))
                })?,
        };
        let tolerance = match options.get("tolerance") {
            None => DEFAULT_TOLERANCE,
            Some(value) => value
                .as_u64()
                .and_then(|t| u8::try_from(t).ok())
                .ok_or_else(|| {
                    KoboldError::Comparison(format!("tolerance must be 0-255, got {}", value))
                })?,
        };
        Ok(Self { threshold, tolerance })
    }
}

/// Pixel counts of one comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelDiff {
    pub diff_pixels: u64,
    pub total_pixels: u64,
}

impl PixelDiff {
    pub fn diff_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            (self.diff_pixels as f64 / self.total_pixels as f64) * 100.0
        }
    }
}

impl PixelComparator {
    pub fn new() -> Self {
        Self
    }

    fn digest(image: &Image) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image.width().to_le_bytes());
        hasher.update(image.height().to_le_bytes());
        hasher.update(image.as_raw());
        hex::encode(hasher.finalize())
    }

    fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>, tolerance: u8) -> bool {
        a.channels()
            .iter()
            .zip(b.channels())
            .any(|(x, y)| x.abs_diff(*y) > tolerance)
    }

    /// Count differing pixels and paint them red over a dimmed copy of the
    /// build screen. Pixels outside the overlapping region count as different.
    pub fn diff(approved: &Image, build: &Image, tolerance: u8) -> (PixelDiff, Image) {
        let width = approved.width().max(build.width());
        let height = approved.height().max(build.height());
        let overlap_w = approved.width().min(build.width());
        let overlap_h = approved.height().min(build.height());

        let mut highlight = Image::new(width, height);
        let mut diff_pixels = 0u64;

        for y in 0..height {
            for x in 0..width {
                if x >= overlap_w || y >= overlap_h {
                    diff_pixels += 1;
                    highlight.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                    continue;
                }

                let build_pixel = build.get_pixel(x, y);
                if Self::pixels_differ(approved.get_pixel(x, y), build_pixel, tolerance) {
                    diff_pixels += 1;
                    highlight.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                } else {
                    let channels = build_pixel.channels();
                    highlight.put_pixel(
                        x,
                        y,
                        Rgba([channels[0] / 2, channels[1] / 2, channels[2] / 2, 128]),
                    );
                }
            }
        }

        let counts = PixelDiff {
            diff_pixels,
            total_pixels: (width as u64) * (height as u64),
        };
        (counts, highlight)
    }
}

#[async_trait]
impl Comparator for PixelComparator {
    async fn compare(
        &self,
        approved: &Image,
        build: &Image,
        options: &ComparisonOptions,
    ) -> Result<Comparison> {
        let options = PixelOptions::from_options(options)?;

        if Self::digest(approved) == Self::digest(build) {
            debug!("Screens match exactly (same digest)");
            return Ok(Comparison {
                verdict_code: RESULT_IDENTICAL,
                highlight: None,
            });
        }

        let same_size = approved.dimensions() == build.dimensions();
        if !same_size {
            warn!(
                "Screen dimensions differ: approved {:?} vs build {:?}",
                approved.dimensions(),
                build.dimensions()
            );
        }

        let (counts, highlight) = Self::diff(approved, build, options.tolerance);
        let diff_percent = counts.diff_percent();

        let verdict_code = if counts.diff_pixels == 0 && same_size {
            RESULT_IDENTICAL
        } else if counts.total_pixels == 0 {
            // sizes differ but neither has any area to compare
            RESULT_DIFFERENT
        } else if diff_percent <= options.threshold {
            RESULT_SIMILAR
        } else {
            RESULT_DIFFERENT
        };

        debug!(
            diff_pixels = counts.diff_pixels,
            total_pixels = counts.total_pixels,
            "{:.2}% pixels differ (threshold: {:.2}%)",
            diff_percent,
            options.threshold
        );

        Ok(Comparison {
            verdict_code,
            highlight: (counts.diff_pixels > 0).then_some(highlight),
        })
    }

    fn passed(&self, verdict_code: i32) -> bool {
        verdict_code == RESULT_IDENTICAL || verdict_code == RESULT_SIMILAR
    }
}
