//! [`AliasStorage`]: the factory that turns aliases into handles.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use ras_storage::{FileStorage, MemoryStorage, OpenOptions, Storage, StorageError, StorageResult};
use tracing::debug;

use crate::cache::AliasCache;
use crate::config::AliasConfig;
use crate::error::ConfigError;
use crate::handle::AliasHandle;
use crate::location::RealLocation;
use crate::resolver::Resolver;

/// Builds the backend for a resolved location.
///
/// An `Err` settles the handle as failed, exactly like a failed resolution.
pub trait StorageConstructor: Send + Sync + 'static {
    type Storage: Storage;

    fn construct(
        &self,
        location: &RealLocation,
        options: &OpenOptions,
    ) -> StorageResult<Self::Storage>;
}

/// Opens a [`FileStorage`] at the real location. The default constructor.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileConstructor;

impl StorageConstructor for FileConstructor {
    type Storage = FileStorage;

    fn construct(&self, location: &RealLocation, options: &OpenOptions) -> StorageResult<FileStorage> {
        Ok(FileStorage::new(location.as_str(), options))
    }
}

/// Creates a fresh [`MemoryStorage`] per handle; the location is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryConstructor;

impl StorageConstructor for MemoryConstructor {
    type Storage = MemoryStorage;

    fn construct(&self, _location: &RealLocation, options: &OpenOptions) -> StorageResult<MemoryStorage> {
        MemoryStorage::with_options(options)
    }
}

/// Constructor backed by a function.
pub struct FnConstructor<F, S> {
    f: F,
    _storage: PhantomData<fn() -> S>,
}

/// Wrap `f` as a [`StorageConstructor`].
pub fn constructor_fn<F, S>(f: F) -> FnConstructor<F, S>
where
    F: Fn(&RealLocation, &OpenOptions) -> StorageResult<S> + Send + Sync + 'static,
    S: Storage,
{
    FnConstructor {
        f,
        _storage: PhantomData,
    }
}

impl<F, S> StorageConstructor for FnConstructor<F, S>
where
    F: Fn(&RealLocation, &OpenOptions) -> StorageResult<S> + Send + Sync + 'static,
    S: Storage,
{
    type Storage = S;

    fn construct(&self, location: &RealLocation, options: &OpenOptions) -> StorageResult<S> {
        (self.f)(location, options)
    }
}

/// The settlement of one handle's alias, as a future.
///
/// [`AliasStorage::open`] spawns it; [`AliasStorage::open_deferred`] hands it
/// to the caller. Until it completes, the handle queues. Dropping it
/// unfinished leaves the handle pending for good.
#[must_use = "the handle stays pending until its resolution is polled"]
pub struct Resolution {
    inner: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
}

impl Resolution {
    fn new(fut: impl Future<Output = ()> + Send + 'static) -> Self {
        Self { inner: Box::pin(fut) }
    }

    fn settled() -> Self {
        Self::new(std::future::ready(()))
    }
}

impl Future for Resolution {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution").finish_non_exhaustive()
    }
}

/// Handle factory for one resolver and one backend constructor.
///
/// Holds no per-alias state apart from the optional [`AliasCache`], which
/// every handle from this factory shares. Each `open` creates an independent
/// handle with its own queue.
pub struct AliasStorage<R, C = FileConstructor> {
    resolver: Arc<R>,
    constructor: Arc<C>,
    cache: Option<Arc<AliasCache>>,
    default_options: OpenOptions,
}

impl<R: Resolver> AliasStorage<R, FileConstructor> {
    /// A factory producing file-backed handles.
    pub fn new(resolver: R) -> Self {
        Self::with_constructor(resolver, FileConstructor)
    }
}

impl<R: Resolver, C: StorageConstructor> AliasStorage<R, C> {
    pub fn with_constructor(resolver: R, constructor: C) -> Self {
        Self {
            resolver: Arc::new(resolver),
            constructor: Arc::new(constructor),
            cache: None,
            default_options: OpenOptions::default(),
        }
    }

    /// Build a factory from `config`, creating a cache when enabled.
    pub fn from_config(resolver: R, constructor: C, config: &AliasConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut factory = Self::with_constructor(resolver, constructor);
        factory.default_options = config.default_options.clone();
        if config.cache_enabled {
            factory.cache = Some(Arc::new(AliasCache::new(config.capacity()?)));
        }
        Ok(factory)
    }

    /// Share `cache` across every handle this factory creates.
    pub fn with_cache(mut self, cache: Arc<AliasCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Options used by [`open`](Self::open).
    pub fn with_default_options(mut self, options: OpenOptions) -> Self {
        self.default_options = options;
        self
    }

    pub fn cache(&self) -> Option<&Arc<AliasCache>> {
        self.cache.as_ref()
    }

    /// Open a handle for `alias` with the default options.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since resolution is
    /// spawned onto it.
    pub fn open(&self, alias: &str) -> AliasHandle<C::Storage> {
        self.open_with(alias, self.default_options.clone())
    }

    /// Open a handle for `alias`, forwarding `options` to the constructor.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn open_with(&self, alias: &str, options: OpenOptions) -> AliasHandle<C::Storage> {
        let (handle, resolution) = self.open_deferred(alias, options);
        tokio::spawn(resolution);
        handle
    }

    /// Open a handle for `alias` and return the future that settles it,
    /// leaving the caller to drive resolution.
    pub fn open_deferred(
        &self,
        alias: &str,
        options: OpenOptions,
    ) -> (AliasHandle<C::Storage>, Resolution) {
        if let Some(location) = self.cache.as_ref().and_then(|c| c.get(alias)) {
            debug!(alias = %alias, location = %location, "alias cache hit");
            let handle = match self.constructor.construct(&location, &options) {
                Ok(backend) => AliasHandle::resolved(alias, backend, Some(location)),
                Err(e) => AliasHandle::failed(alias, e),
            };
            return (handle, Resolution::settled());
        }

        let handle = AliasHandle::pending(alias);
        let settle = handle.clone();
        let alias = alias.to_owned();
        let resolver = Arc::clone(&self.resolver);
        let constructor = Arc::clone(&self.constructor);
        let cache = self.cache.clone();

        let resolution = Resolution::new(async move {
            debug!(alias = %alias, "resolving alias");
            let resolved = match resolver.resolve(&alias).await {
                Ok(answer) => RealLocation::validate(&alias, answer),
                Err(e) => Err(StorageError::resolution_failed(alias.as_str(), e)),
            };
            let built = resolved.and_then(|location| {
                let backend = constructor.construct(&location, &options)?;
                Ok((location, backend))
            });
            match built {
                Ok((location, backend)) => {
                    if let Some(cache) = &cache {
                        cache.insert(&alias, location.clone());
                    }
                    settle.resolve_with(location, backend);
                }
                Err(e) => settle.fail_with(e),
            }
        });
        (handle, resolution)
    }
}

impl<R, C> Clone for AliasStorage<R, C> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            constructor: Arc::clone(&self.constructor),
            cache: self.cache.clone(),
            default_options: self.default_options.clone(),
        }
    }
}

impl<R, C> std::fmt::Debug for AliasStorage<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasStorage")
            .field("cache", &self.cache)
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}
