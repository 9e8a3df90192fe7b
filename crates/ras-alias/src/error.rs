//! Error types for alias factory configuration.
//!
//! Storage and resolution errors live in [`ras_storage::StorageError`], since
//! they travel through the same completions as backend errors.

use thiserror::Error;

/// Errors from loading or validating an [`AliasConfig`](crate::AliasConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered as TOML.
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A cache must hold at least one entry.
    #[error("cache capacity must be at least 1")]
    InvalidCapacity,
}
