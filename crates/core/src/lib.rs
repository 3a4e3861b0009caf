//! Kobold visual regression core
//!
//! Compares the screens of a build against approved baselines:
//! - Reconciles both listings into orphans, additions, and comparisons
//! - Plans one test case per screen under the configured fail policies
//! - Runs a load / load / config / compare pipeline per matched screen
//! - Archives approved, build, and highlight images for re-approval
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                               │
//! │    ├── plan()  list build + approved -> classify -> plan    │
//! │    └── run()   execute cases (bounded, reported in order)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ComparisonPipeline (per screen)                            │
//! │    ├── load approved ─┐                                     │
//! │    ├── load build    ─┼─ load config override (tolerated)   │
//! │    ├── compare (Comparator, merged options)                 │
//! │    └── ResultArchiver (approved, build, highlight?)         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Capabilities: StorageAdapter · Comparator · TestHarness    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod archive;
pub mod comparator;
pub mod config;
pub mod error;
pub mod fakes;
pub mod harness;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;
pub mod reconcile;
pub mod report;
pub mod storage;
pub mod types;
pub mod visual;

pub use archive::ResultArchiver;
pub use comparator::Comparator;
pub use config::{KoboldConfig, StorageConfig};
pub use error::{KoboldError, Result};
pub use harness::{RecordingHarness, TestHarness};
pub use orchestrator::Orchestrator;
pub use pipeline::{display_name, ComparisonPipeline};
pub use plan::build_plan;
pub use reconcile::{classify, ReconciliationResult};
pub use report::RunSummary;
pub use storage::{FileStorage, StorageAdapter};
pub use types::*;
pub use visual::PixelComparator;

/// Kobold version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
