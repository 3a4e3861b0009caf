//! Error types for Kobold

use thiserror::Error;

/// Result type alias using Kobold Error
pub type Result<T> = std::result::Result<T, KoboldError>;

/// Kobold error types
#[derive(Error, Debug)]
pub enum KoboldError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to list {source_kind} screens: {reason}")]
    Listing { source_kind: String, reason: String },

    #[error("{kind} screen not found: {name}")]
    ScreenNotFound { kind: String, name: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Comparison error: {0}")]
    Comparison(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid case transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
