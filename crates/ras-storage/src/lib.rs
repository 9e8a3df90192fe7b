//! Random-access storage capability surface.
//!
//! This crate defines the operations every storage object exposes (`write`,
//! `read`, `stat`, `del`, `close`, `destroy`, and event subscription through
//! `on`) and ships two backends that implement them.
//!
//! # Calling convention
//!
//! Operations take a [`Completion`] that receives the outcome as a
//! [`StorageResult`]. The synchronous return value of each operation is only
//! the dispatch result: `Err` means the call was refused and the completion
//! was dropped uninvoked.
//!
//! # Storage Backends
//!
//! All backends implement the [`Storage`] trait:
//!
//! - [`MemoryStorage`] -- growable in-memory buffer for tests and embedding
//! - [`FileStorage`] -- positional reads and writes against one file
//!
//! # Design Rules
//!
//! 1. Backends open lazily; construction never performs I/O.
//! 2. Completions and listeners run with no backend lock held.
//! 3. After `close`, operations fail with [`StorageError::Closed`]; after
//!    `destroy`, with [`StorageError::Destroyed`].
//! 4. All I/O errors are propagated to the completion, never swallowed.

pub mod error;
pub mod event;
pub mod file;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{BoxError, StorageError, StorageResult};
pub use event::{EventBus, EventKind, Listener, StorageEvent};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Completion, Storage};
pub use types::{OpenOptions, Stat, StorageStatus};

// Re-exported so callers can build payloads without a direct dependency.
pub use bytes::Bytes;
