use bytes::Bytes;

use crate::error::StorageResult;
use crate::event::{EventKind, Listener};
use crate::types::{Stat, StorageStatus};

type CallbackFn<T> = Box<dyn FnOnce(StorageResult<T>) + Send + 'static>;

/// Completion callback for a storage operation.
///
/// The callback receives the outcome as a `StorageResult`. A completion may
/// also be empty (`Completion::none()`), meaning the caller did not ask to be
/// told about the outcome.
pub struct Completion<T> {
    callback: Option<CallbackFn<T>>,
}

impl<T> Completion<T> {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(StorageResult<T>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(f)),
        }
    }

    /// A completion with no callback attached.
    pub fn none() -> Self {
        Self { callback: None }
    }

    /// Returns `true` if a callback is attached.
    pub fn is_some(&self) -> bool {
        self.callback.is_some()
    }

    /// Invoke the callback, if any, with `result`.
    pub fn complete(self, result: StorageResult<T>) {
        if let Some(cb) = self.callback {
            cb(result);
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("attached", &self.is_some())
            .finish()
    }
}

/// Random-access storage capability surface.
///
/// Implemented by concrete backends and by deferred alias handles, so a
/// handle can stand wherever a backend is expected.
///
/// Every operation returns a dispatch result. `Err` means the call was
/// refused outright and `cb` was dropped without being invoked. `Ok(())`
/// means the call was accepted; its outcome is delivered to `cb`, possibly
/// before this method returns.
///
/// Implementations must not hold internal locks while invoking callbacks or
/// listeners: callers routinely issue the next operation from inside a
/// completion.
pub trait Storage: Send + Sync + 'static {
    /// Write `data` at `offset`, growing the storage if needed.
    fn write(&self, offset: u64, data: Bytes, cb: Completion<()>) -> StorageResult<()>;

    /// Read exactly `length` bytes at `offset`.
    fn read(&self, offset: u64, length: u64, cb: Completion<Bytes>) -> StorageResult<()>;

    /// Report the current size.
    fn stat(&self, cb: Completion<Stat>) -> StorageResult<()>;

    /// Discard `length` bytes at `offset`.
    fn del(&self, offset: u64, length: u64, cb: Completion<()>) -> StorageResult<()>;

    /// Release resources. Later operations fail with `Closed`.
    fn close(&self, cb: Completion<()>) -> StorageResult<()>;

    /// Close and remove the underlying data.
    fn destroy(&self, cb: Completion<()>) -> StorageResult<()>;

    /// Subscribe `listener` to events of `event`.
    fn on(&self, event: EventKind, listener: Listener) -> StorageResult<()>;

    /// Lifecycle flags.
    fn status(&self) -> StorageResult<StorageStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn completion_invokes_callback_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let c = Completion::new(move |r: StorageResult<u32>| sink.lock().unwrap().push(r.unwrap()));
        assert!(c.is_some());
        c.complete(Ok(7));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn empty_completion_is_noop() {
        let c: Completion<()> = Completion::none();
        assert!(!c.is_some());
        c.complete(Ok(()));
        assert!(!Completion::<()>::default().is_some());
    }

    #[test]
    fn debug_format() {
        let c: Completion<()> = Completion::new(|_| {});
        assert!(format!("{c:?}").contains("attached: true"));
    }
}
