use std::num::NonZeroUsize;

use ras_storage::OpenOptions;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::ConfigError;

/// Configuration for an [`AliasStorage`](crate::AliasStorage) factory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    /// Whether resolved aliases are remembered across handles.
    pub cache_enabled: bool,
    /// Maximum number of remembered aliases.
    pub cache_capacity: usize,
    /// Options passed to the backend constructor by `open`.
    pub default_options: OpenOptions,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
            default_options: OpenOptions::default(),
        }
    }
}

impl AliasConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capacity().map(|_| ())
    }

    /// Cache capacity as a non-zero count.
    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.cache_capacity).ok_or(ConfigError::InvalidCapacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = AliasConfig::default();
        assert!(c.cache_enabled);
        assert_eq!(c.cache_capacity, 128);
        assert_eq!(c.default_options, OpenOptions::default());
    }

    #[test]
    fn parse_partial_toml() {
        let c = AliasConfig::from_toml_str(
            r#"
            cache_capacity = 16

            [default_options]
            writable = false
            "#,
        )
        .unwrap();
        assert!(c.cache_enabled);
        assert_eq!(c.cache_capacity, 16);
        assert!(!c.default_options.writable);
        assert!(c.default_options.readable);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(AliasConfig::from_toml_str("").unwrap(), AliasConfig::default());
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = AliasConfig::from_toml_str("cache_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AliasConfig::from_toml_str("cache_capacity = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_round_trip() {
        let c = AliasConfig {
            cache_enabled: false,
            ..Default::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(AliasConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(AliasConfig::default()).unwrap();
        assert_eq!(json["cache_capacity"], 128);
        assert_eq!(json["default_options"]["writable"], true);
    }
}
