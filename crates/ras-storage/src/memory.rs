use std::ops::Range;
use std::sync::RwLock;

use bytes::Bytes;

use crate::error::{StorageError, StorageResult};
use crate::event::{EventBus, EventKind, Listener, StorageEvent};
use crate::traits::{Completion, Storage};
use crate::types::{OpenOptions, Stat, StorageStatus};

/// In-memory random-access storage.
///
/// Intended for tests and embedding. The content is a single growable byte
/// buffer behind a `RwLock`. Completions run synchronously, after the lock is
/// released, so a completion may issue the next operation directly.
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
    events: EventBus,
}

struct MemoryInner {
    data: Vec<u8>,
    status: StorageStatus,
    options: OpenOptions,
}

impl MemoryStorage {
    /// Create a new empty, writable storage.
    pub fn new() -> Self {
        Self::build(Vec::new(), OpenOptions::default())
    }

    /// Create a storage honoring `options` (`size` pre-sizes the buffer).
    ///
    /// Fails with `OutOfRange` when the requested size cannot be allocated.
    pub fn with_options(options: &OpenOptions) -> StorageResult<Self> {
        let mut data = Vec::new();
        if let Some(size) = options.size {
            grow(&mut data, 0, size)?;
        }
        Ok(Self::build(data, options.clone()))
    }

    /// Create a storage holding `data`.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::build(data.into(), OpenOptions::default())
    }

    fn build(data: Vec<u8>, options: OpenOptions) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                data,
                status: StorageStatus::default(),
                options,
            }),
            events: EventBus::new(),
        }
    }

    /// Number of bytes currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").data.len()
    }

    /// Returns `true` if the storage holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current content.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.read().expect("lock poisoned").data.clone()
    }

    /// Run `f` against the open storage, opening it first if needed.
    fn with_open<T>(
        &self,
        f: impl FnOnce(&mut MemoryInner) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let (result, just_opened) = {
            let mut inner = self.inner.write().expect("lock poisoned");
            if inner.status.destroyed {
                return Err(StorageError::Destroyed);
            }
            if inner.status.closed {
                return Err(StorageError::Closed);
            }
            let just_opened = !inner.status.opened;
            inner.status.opened = true;
            (f(&mut *inner), just_opened)
        };
        if just_opened {
            self.events.emit(&StorageEvent::Open);
        }
        result
    }
}

fn span(offset: u64, length: u64, size: usize) -> StorageResult<Range<usize>> {
    let out_of_range = || StorageError::OutOfRange {
        offset,
        length,
        size: size as u64,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_range())?;
    let len = usize::try_from(length).map_err(|_| out_of_range())?;
    let end = start.checked_add(len).ok_or_else(out_of_range)?;
    Ok(start..end)
}

/// Zero-extend `data` so that `offset + length` bytes fit. Allocation
/// failure is reported as `OutOfRange` instead of aborting.
fn grow(data: &mut Vec<u8>, offset: u64, length: u64) -> StorageResult<()> {
    let size = data.len();
    let end = span(offset, length, size)?.end;
    if end <= size {
        return Ok(());
    }
    data.try_reserve_exact(end - size)
        .map_err(|_| StorageError::OutOfRange {
            offset,
            length,
            size: size as u64,
        })?;
    data.resize(end, 0);
    Ok(())
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn write(&self, offset: u64, data: Bytes, cb: Completion<()>) -> StorageResult<()> {
        let outcome = self.with_open(|inner| {
            if !inner.options.writable {
                return Err(StorageError::AccessDenied("writable"));
            }
            grow(&mut inner.data, offset, data.len() as u64)?;
            let range = span(offset, data.len() as u64, inner.data.len())?;
            inner.data[range].copy_from_slice(&data);
            Ok(())
        });
        cb.complete(outcome);
        Ok(())
    }

    fn read(&self, offset: u64, length: u64, cb: Completion<Bytes>) -> StorageResult<()> {
        let outcome = self.with_open(|inner| {
            if !inner.options.readable {
                return Err(StorageError::AccessDenied("readable"));
            }
            let size = inner.data.len();
            let range = span(offset, length, size)?;
            if range.end > size {
                return Err(StorageError::OutOfRange {
                    offset,
                    length,
                    size: size as u64,
                });
            }
            Ok(Bytes::copy_from_slice(&inner.data[range]))
        });
        cb.complete(outcome);
        Ok(())
    }

    fn stat(&self, cb: Completion<Stat>) -> StorageResult<()> {
        let outcome = self.with_open(|inner| {
            Ok(Stat {
                size: inner.data.len() as u64,
            })
        });
        cb.complete(outcome);
        Ok(())
    }

    fn del(&self, offset: u64, length: u64, cb: Completion<()>) -> StorageResult<()> {
        let outcome = self.with_open(|inner| {
            if !inner.options.writable {
                return Err(StorageError::AccessDenied("writable"));
            }
            let size = inner.data.len();
            let start = match usize::try_from(offset) {
                Ok(start) if start < size => start,
                _ => return Ok(()),
            };
            let end = usize::try_from(length).map_or(usize::MAX, |len| start.saturating_add(len));
            if end >= size {
                inner.data.truncate(start);
            } else {
                inner.data[start..end].fill(0);
            }
            Ok(())
        });
        cb.complete(outcome);
        Ok(())
    }

    fn close(&self, cb: Completion<()>) -> StorageResult<()> {
        let (outcome, emit) = {
            let mut inner = self.inner.write().expect("lock poisoned");
            if inner.status.destroyed {
                (Err(StorageError::Destroyed), false)
            } else if inner.status.closed {
                (Ok(()), false)
            } else {
                inner.status.closed = true;
                (Ok(()), true)
            }
        };
        if emit {
            self.events.emit(&StorageEvent::Close);
        }
        cb.complete(outcome);
        Ok(())
    }

    fn destroy(&self, cb: Completion<()>) -> StorageResult<()> {
        let (was_closed, was_destroyed) = {
            let mut inner = self.inner.write().expect("lock poisoned");
            let prev = (inner.status.closed, inner.status.destroyed);
            inner.data = Vec::new();
            inner.status.closed = true;
            inner.status.destroyed = true;
            prev
        };
        if !was_closed {
            self.events.emit(&StorageEvent::Close);
        }
        if !was_destroyed {
            self.events.emit(&StorageEvent::Destroy);
        }
        cb.complete(Ok(()));
        Ok(())
    }

    fn on(&self, event: EventKind, listener: Listener) -> StorageResult<()> {
        self.events.subscribe(event, listener);
        Ok(())
    }

    fn status(&self) -> StorageResult<StorageStatus> {
        Ok(self.inner.read().expect("lock poisoned").status)
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("lock poisoned");
        f.debug_struct("MemoryStorage")
            .field("len", &inner.data.len())
            .field("status", &inner.status)
            .finish()
    }
}
