//! The [`Resolver`] seam: turning an alias into a real location.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use ras_storage::BoxError;

/// Maps a logical name to the real location a backend should use.
///
/// `Ok(None)` and `Ok(Some(""))` are accepted from the resolver but rejected
/// by the handle as an invalid alias. `Err` is reported as a resolution
/// failure. Timeouts and cancellation are the resolver's own business: a
/// handle waits for as long as `resolve` takes.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    async fn resolve(&self, alias: &str) -> Result<Option<String>, BoxError>;
}

/// Resolver backed by a synchronous function.
pub struct SyncResolver<F> {
    f: F,
}

impl<F> SyncResolver<F>
where
    F: Fn(&str) -> Result<Option<String>, BoxError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Resolver for SyncResolver<F>
where
    F: Fn(&str) -> Result<Option<String>, BoxError> + Send + Sync + 'static,
{
    async fn resolve(&self, alias: &str) -> Result<Option<String>, BoxError> {
        (self.f)(alias)
    }
}

/// Resolver backed by a function returning a future.
pub struct AsyncResolver<F> {
    f: F,
}

impl<F, Fut> AsyncResolver<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Resolver for AsyncResolver<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
{
    async fn resolve(&self, alias: &str) -> Result<Option<String>, BoxError> {
        (self.f)(alias.to_owned()).await
    }
}

/// Static alias table.
///
/// Unknown aliases resolve to nothing, or to themselves when pass-through is
/// enabled.
#[derive(Clone, Debug, Default)]
pub struct MapResolver {
    entries: HashMap<String, String>,
    passthrough: bool,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias mapping.
    pub fn with(mut self, alias: impl Into<String>, location: impl Into<String>) -> Self {
        self.entries.insert(alias.into(), location.into());
        self
    }

    /// Resolve unknown aliases to themselves.
    pub fn passthrough(mut self, enabled: bool) -> Self {
        self.passthrough = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Resolver for MapResolver {
    async fn resolve(&self, alias: &str) -> Result<Option<String>, BoxError> {
        let found = self.entries.get(alias).cloned();
        Ok(found.or_else(|| self.passthrough.then(|| alias.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sync_resolver_calls_function() {
        let r = SyncResolver::new(|alias: &str| Ok(Some(format!("/data/{alias}"))));
        assert_eq!(r.resolve("a").await.unwrap().as_deref(), Some("/data/a"));
    }

    #[tokio::test]
    async fn sync_resolver_propagates_error() {
        let r = SyncResolver::new(|_: &str| Err("no such alias".into()));
        let err = r.resolve("a").await.unwrap_err();
        assert_eq!(err.to_string(), "no such alias");
    }

    #[tokio::test]
    async fn async_resolver_awaits_future() {
        let r = AsyncResolver::new(|alias: String| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, BoxError>(Some(alias.to_uppercase()))
        });
        assert_eq!(r.resolve("abc").await.unwrap().as_deref(), Some("ABC"));
    }

    #[tokio::test]
    async fn map_resolver_lookup_and_passthrough() {
        let strict = MapResolver::new().with("alias.txt", "/data/real.txt");
        assert_eq!(strict.len(), 1);
        assert_eq!(
            strict.resolve("alias.txt").await.unwrap().as_deref(),
            Some("/data/real.txt")
        );
        assert!(strict.resolve("other").await.unwrap().is_none());

        let lenient = strict.passthrough(true);
        assert_eq!(lenient.resolve("other").await.unwrap().as_deref(), Some("other"));
    }
}
