//! Alias-resolved random-access storage.
//!
//! Callers ask an [`AliasStorage`] factory for storage by a logical name. The
//! factory hands back an [`AliasHandle`] immediately and resolves the name to
//! a real location in the background. Operations issued before resolution
//! finishes are queued and replayed in order once the backend exists; if
//! resolution fails, queued completions and error listeners receive the
//! error and the handle refuses further calls.
//!
//! # Modules
//!
//! - [`resolver`]: The [`Resolver`] seam and ready-made adapters
//! - [`location`]: [`RealLocation`], the validated resolver answer
//! - [`cache`]: [`AliasCache`], a shared LRU of past resolutions
//! - [`handle`]: [`AliasHandle`], the deferred-dispatch state machine
//! - [`factory`]: [`AliasStorage`] and backend constructors
//! - [`config`]: [`AliasConfig`] for factory settings
//! - [`error`]: Configuration errors
//!
//! # Example
//!
//! ```no_run
//! use ras_alias::{AliasStorage, MapResolver};
//! use ras_storage::{Bytes, Completion, Storage, StorageResult};
//!
//! # async fn demo() {
//! let factory = AliasStorage::new(MapResolver::new().with("alias.txt", "/data/real.txt"));
//! let file = factory.open("alias.txt");
//! file.read(2, 4, Completion::new(|res: StorageResult<Bytes>| {
//!     println!("{:?}", res.map(|bytes| bytes.to_vec()));
//! }))
//! .unwrap();
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod handle;
pub mod location;
pub mod resolver;

pub use cache::{AliasCache, DEFAULT_CACHE_CAPACITY};
pub use config::AliasConfig;
pub use error::ConfigError;
pub use factory::{
    constructor_fn, AliasStorage, FileConstructor, FnConstructor, MemoryConstructor, Resolution,
    StorageConstructor,
};
pub use handle::{AliasHandle, ResolutionState};
pub use location::RealLocation;
pub use resolver::{AsyncResolver, MapResolver, Resolver, SyncResolver};
