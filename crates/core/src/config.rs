//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KoboldError, Result};
use crate::types::ComparisonOptions;

/// Configuration for one Kobold run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KoboldConfig {
    /// Build identifier, used to namespace archived artifacts
    pub build: String,

    /// Enable debug logging
    pub verbose: bool,

    /// Fail the case of an approved screen without a build screen
    pub fail_for_orphans: bool,

    /// Fail the case of a build screen without an approved screen
    pub fail_on_additions: bool,

    /// Archive the highlight image of passing comparisons too
    pub highlight_on_success: bool,

    /// Maximum number of comparison pipelines in flight
    pub concurrency: usize,

    /// Global comparator options
    pub comparison: ComparisonOptions,

    /// Storage used for both roles unless overridden
    pub storage: StorageConfig,

    /// Storage for build listings, approved images, and screen configs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StorageConfig>,

    /// Storage for approved listings, build images, and archives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<StorageConfig>,
}

impl Default for KoboldConfig {
    fn default() -> Self {
        let mut comparison = ComparisonOptions::new();
        comparison.insert("threshold".to_string(), serde_json::json!(0.5));
        comparison.insert("tolerance".to_string(), serde_json::json!(5));

        Self {
            build: default_build_id(),
            verbose: false,
            fail_for_orphans: false,
            fail_on_additions: false,
            highlight_on_success: false,
            concurrency: 4,
            comparison,
            storage: StorageConfig::default(),
            source: None,
            destination: None,
        }
    }
}

/// File storage layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding the screen folders
    pub path: PathBuf,
    pub approved_folder: String,
    pub build_folder: String,
    pub highlight_folder: String,
    /// Folder under `path` receiving per-build archives
    pub archive_folder: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            approved_folder: "approved".to_string(),
            build_folder: "build".to_string(),
            highlight_folder: "highlight".to_string(),
            archive_folder: "archive".to_string(),
        }
    }
}

impl KoboldConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KoboldError::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(KoboldError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.build.trim().is_empty() {
            return Err(KoboldError::InvalidConfig("build identifier is empty".to_string()));
        }
        Ok(())
    }

    pub fn source_storage(&self) -> &StorageConfig {
        self.source.as_ref().unwrap_or(&self.storage)
    }

    pub fn destination_storage(&self) -> &StorageConfig {
        self.destination.as_ref().unwrap_or(&self.storage)
    }
}

/// `$BUILD_NUMBER`, else `<user>_<unix millis>`
pub fn default_build_id() -> String {
    match std::env::var("BUILD_NUMBER") {
        Ok(build) if !build.is_empty() => build,
        _ => {
            let user = std::env::var("USER").unwrap_or_else(|_| "kobold".to_string());
            format!("{}_{}", user, chrono::Utc::now().timestamp_millis())
        }
    }
}

/// Deep-merge `overrides` onto `base`. Nested objects merge key by key; any
/// other override value replaces the base value.
pub fn merge_options(base: &ComparisonOptions, overrides: &ComparisonOptions) -> ComparisonOptions {
    let mut merged = base.clone();
    for (key, value) in overrides {
        match (merged.get_mut(key), value) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
                *existing = merge_options(existing, incoming);
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}
