//! Error types shared by storage backends and deferred handles.

use std::sync::Arc;

/// Boxed error produced by user-supplied collaborators (resolvers, custom
/// backends).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from storage operations.
///
/// `Clone` because a single resolution failure is delivered to every queued
/// completion and error listener of a handle.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// A read asked for bytes past the end of the storage.
    #[error("could not satisfy length: offset {offset} + length {length} exceeds size {size}")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    /// The storage has been closed.
    #[error("storage is closed")]
    Closed,

    /// The storage has been destroyed.
    #[error("storage is destroyed")]
    Destroyed,

    /// The storage was opened without the access an operation needs.
    #[error("storage is not {0}")]
    AccessDenied(&'static str),

    /// The resolver produced an empty or missing real location.
    #[error("Invalid filename alias. Alias must be non-empty string (alias: {alias})")]
    InvalidAlias { alias: String },

    /// The resolver itself failed.
    #[error("alias resolution failed for {alias}: {source}")]
    ResolutionFailed {
        alias: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A backend-only capability was requested before the alias resolved.
    #[error("aliased store is not ready yet: {alias}")]
    NotReady { alias: String },

    /// The handle settled into a failed resolution and accepts no more calls.
    #[error("store not set up: alias resolution failed for {alias}")]
    PermanentFailure { alias: String },
}

impl StorageError {
    /// Wrap a resolver error for `alias`.
    pub fn resolution_failed(alias: impl Into<String>, source: BoxError) -> Self {
        Self::ResolutionFailed {
            alias: alias.into(),
            source: Arc::from(source),
        }
    }

    /// Returns `true` for the two errors a failed resolution settles with.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::InvalidAlias { .. } | Self::ResolutionFailed { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_alias_message() {
        let err = StorageError::InvalidAlias {
            alias: "a-file".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid filename alias."));
        assert!(msg.contains("a-file"));
        assert!(err.is_resolution_error());
    }

    #[test]
    fn resolution_failed_keeps_source() {
        let err = StorageError::resolution_failed("x", "lookup timed out".into());
        assert!(err.to_string().contains("lookup timed out"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_resolution_error());
    }

    #[test]
    fn io_error_converts_and_clones() {
        let err: StorageError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        let cloned = err.clone();
        assert!(matches!(cloned, StorageError::Io(_)));
        assert!(!cloned.is_resolution_error());
    }
}
