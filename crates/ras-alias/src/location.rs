use std::path::Path;

use ras_storage::{StorageError, StorageResult};

/// A validated real location: the non-empty string a resolver produced.
///
/// Only [`RealLocation::validate`] builds one, so anything held in the alias
/// cache has already passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RealLocation(String);

impl RealLocation {
    /// Accept a resolver's answer for `alias`, rejecting a missing or empty
    /// location as [`StorageError::InvalidAlias`].
    pub fn validate(alias: &str, resolved: Option<String>) -> StorageResult<Self> {
        match resolved {
            Some(location) if !location.is_empty() => Ok(Self(location)),
            _ => Err(StorageError::InvalidAlias {
                alias: alias.to_owned(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for RealLocation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for RealLocation {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl std::fmt::Display for RealLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
