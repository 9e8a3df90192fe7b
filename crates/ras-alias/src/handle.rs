//! Deferred-dispatch storage handle.
//!
//! An [`AliasHandle`] is usable the moment it is created. Until its alias
//! resolves, every operation is recorded in an ordered queue. When resolution
//! succeeds the queue is replayed against the real backend in call order;
//! when it fails, queued completions and error listeners are told why and
//! the handle refuses all further calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ras_storage::{
    Bytes, Completion, EventKind, Listener, Stat, Storage, StorageError, StorageEvent,
    StorageResult, StorageStatus,
};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::location::RealLocation;

/// Observable resolution state of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionState {
    /// The alias is unresolved, or queued operations are still replaying.
    Pending,
    /// The backend exists and operations are forwarded directly.
    Resolved,
    /// Resolution failed; the handle refuses all calls.
    Failed,
}

/// A recorded capability invocation.
enum DeferredOp {
    Write {
        offset: u64,
        data: Bytes,
        cb: Completion<()>,
    },
    Read {
        offset: u64,
        length: u64,
        cb: Completion<Bytes>,
    },
    Stat {
        cb: Completion<Stat>,
    },
    Del {
        offset: u64,
        length: u64,
        cb: Completion<()>,
    },
    Close {
        cb: Completion<()>,
    },
    Destroy {
        cb: Completion<()>,
    },
    On {
        event: EventKind,
        listener: Listener,
    },
}

impl DeferredOp {
    fn name(&self) -> &'static str {
        match self {
            Self::Write { .. } => "write",
            Self::Read { .. } => "read",
            Self::Stat { .. } => "stat",
            Self::Del { .. } => "del",
            Self::Close { .. } => "close",
            Self::Destroy { .. } => "destroy",
            Self::On { .. } => "on",
        }
    }

    /// Invoke the recorded call on `backend` with its original arguments.
    fn apply<S: Storage + ?Sized>(self, backend: &S) -> StorageResult<()> {
        match self {
            Self::Write { offset, data, cb } => backend.write(offset, data, cb),
            Self::Read { offset, length, cb } => backend.read(offset, length, cb),
            Self::Stat { cb } => backend.stat(cb),
            Self::Del { offset, length, cb } => backend.del(offset, length, cb),
            Self::Close { cb } => backend.close(cb),
            Self::Destroy { cb } => backend.destroy(cb),
            Self::On { event, listener } => backend.on(event, listener),
        }
    }

    /// Replay the recorded call on `backend`. If the backend refuses it,
    /// the caller already saw `Ok` at queue time, so the refusal goes to the
    /// call's completion, or to its listener when it subscribed to errors.
    fn replay<S: Storage + ?Sized>(self, backend: &S) -> StorageResult<()> {
        match self {
            Self::Write { offset, data, cb } => relay(cb, |cb| backend.write(offset, data, cb)),
            Self::Read { offset, length, cb } => relay(cb, |cb| backend.read(offset, length, cb)),
            Self::Stat { cb } => relay(cb, |cb| backend.stat(cb)),
            Self::Del { offset, length, cb } => relay(cb, |cb| backend.del(offset, length, cb)),
            Self::Close { cb } => relay(cb, |cb| backend.close(cb)),
            Self::Destroy { cb } => relay(cb, |cb| backend.destroy(cb)),
            Self::On {
                event: EventKind::Error,
                listener,
            } => {
                let shared = Arc::new(Mutex::new(listener));
                let forward = Arc::clone(&shared);
                let result = backend.on(
                    EventKind::Error,
                    Box::new(move |ev: &StorageEvent| {
                        let mut l = forward.lock().expect("listener lock poisoned");
                        (*l)(ev);
                    }),
                );
                if let Err(e) = &result {
                    let mut l = shared.lock().expect("listener lock poisoned");
                    (*l)(&StorageEvent::Error(e.clone()));
                }
                result
            }
            on @ Self::On { .. } => on.apply(backend),
        }
    }

    /// Report `error` instead of running the call. Returns `false` when the
    /// call had nobody to tell.
    fn fail(self, error: &StorageError) -> bool {
        match self {
            Self::Write { cb, .. }
            | Self::Del { cb, .. }
            | Self::Close { cb }
            | Self::Destroy { cb } => notify(cb, error),
            Self::Read { cb, .. } => notify(cb, error),
            Self::Stat { cb } => notify(cb, error),
            Self::On {
                event: EventKind::Error,
                mut listener,
            } => {
                listener(&StorageEvent::Error(error.clone()));
                true
            }
            Self::On { .. } => false,
        }
    }
}

/// Hand `cb` to `call` through a forwarding completion, keeping hold of it
/// so a refused call can still be completed with the refusal.
fn relay<T: Send + 'static>(
    cb: Completion<T>,
    call: impl FnOnce(Completion<T>) -> StorageResult<()>,
) -> StorageResult<()> {
    if !cb.is_some() {
        return call(cb);
    }
    let slot = Arc::new(Mutex::new(Some(cb)));
    let forward = Arc::clone(&slot);
    let result = call(Completion::new(move |r| {
        let cb = forward.lock().expect("completion slot poisoned").take();
        if let Some(cb) = cb {
            cb.complete(r);
        }
    }));
    if let Err(e) = &result {
        let cb = slot.lock().expect("completion slot poisoned").take();
        if let Some(cb) = cb {
            cb.complete(Err(e.clone()));
        }
    }
    result
}

fn notify<T>(cb: Completion<T>, error: &StorageError) -> bool {
    let attached = cb.is_some();
    cb.complete(Err(error.clone()));
    attached
}

enum State<S> {
    Pending(VecDeque<DeferredOp>),
    /// Backend constructed; earlier calls are still being replayed. New calls
    /// join the back of the queue so nothing overtakes them.
    Replaying {
        backend: Arc<S>,
        location: RealLocation,
        queue: VecDeque<DeferredOp>,
    },
    Resolved {
        backend: Arc<S>,
        location: Option<RealLocation>,
    },
    Failed(StorageError),
}

/// Settles a handle whose replay unwound out of a panicking callback.
///
/// The backend is usable, so the handle becomes `Resolved`; operations that
/// were still queued are dropped.
struct ReplayGuard<'a, S: Storage> {
    handle: &'a AliasHandle<S>,
}

impl<S: Storage> Drop for ReplayGuard<'_, S> {
    fn drop(&mut self) {
        let shared = &self.handle.shared;
        let abandoned = {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, State::Pending(VecDeque::new())) {
                State::Replaying {
                    backend,
                    location,
                    queue,
                } => {
                    *state = State::Resolved {
                        backend,
                        location: Some(location),
                    };
                    queue
                }
                settled => {
                    *state = settled;
                    return;
                }
            }
        };
        warn!(
            alias = %shared.alias,
            dropped = abandoned.len(),
            "replay interrupted by a panicking callback; handle resolved without remaining operations"
        );
        drop(abandoned);
        shared.settled.send_replace(ResolutionState::Resolved);
    }
}

struct Shared<S> {
    alias: String,
    state: Mutex<State<S>>,
    settled: watch::Sender<ResolutionState>,
}

/// Storage handle for an alias that may not be resolved yet.
///
/// Cloning yields another reference to the same handle (same queue, same
/// state), which is how a completion can issue follow-up calls.
pub struct AliasHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for AliasHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: Storage> AliasHandle<S> {
    /// A handle whose alias has not resolved yet.
    pub(crate) fn pending(alias: &str) -> Self {
        Self::with_state(alias, State::Pending(VecDeque::new()), ResolutionState::Pending)
    }

    /// A handle born resolved, bypassing the queue entirely.
    pub fn resolved(alias: &str, backend: S, location: Option<RealLocation>) -> Self {
        let state = State::Resolved {
            backend: Arc::new(backend),
            location,
        };
        Self::with_state(alias, state, ResolutionState::Resolved)
    }

    /// A handle born failed.
    pub(crate) fn failed(alias: &str, error: StorageError) -> Self {
        Self::with_state(alias, State::Failed(error), ResolutionState::Failed)
    }

    fn with_state(alias: &str, state: State<S>, initial: ResolutionState) -> Self {
        let (settled, _) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                alias: alias.to_owned(),
                state: Mutex::new(state),
                settled,
            }),
        }
    }

    /// The logical name this handle was created for.
    pub fn alias(&self) -> &str {
        &self.shared.alias
    }

    /// Where the handle is in its lifecycle. Reports `Pending` until every
    /// queued operation has been replayed.
    pub fn state(&self) -> ResolutionState {
        match &*self.lock() {
            State::Pending(_) | State::Replaying { .. } => ResolutionState::Pending,
            State::Resolved { .. } => ResolutionState::Resolved,
            State::Failed(_) => ResolutionState::Failed,
        }
    }

    /// Number of operations waiting for resolution.
    pub fn pending_operations(&self) -> usize {
        match &*self.lock() {
            State::Pending(queue) | State::Replaying { queue, .. } => queue.len(),
            State::Resolved { .. } | State::Failed(_) => 0,
        }
    }

    /// The real location, once known. Handles born resolved from a bare
    /// backend have none.
    pub fn location(&self) -> Option<RealLocation> {
        match &*self.lock() {
            State::Replaying { location, .. } => Some(location.clone()),
            State::Resolved { location, .. } => location.clone(),
            State::Pending(_) | State::Failed(_) => None,
        }
    }

    /// The resolved backend, for anything beyond the capability surface.
    ///
    /// Fails with `NotReady` until resolution and replay have finished, and
    /// with `PermanentFailure` once resolution has failed.
    pub fn backend(&self) -> StorageResult<Arc<S>> {
        match &*self.lock() {
            State::Resolved { backend, .. } => Ok(Arc::clone(backend)),
            State::Pending(_) | State::Replaying { .. } => Err(StorageError::NotReady {
                alias: self.shared.alias.clone(),
            }),
            State::Failed(_) => Err(self.permanent_failure()),
        }
    }

    /// Wait until the handle settles. Returns the resolution error if it
    /// failed.
    pub async fn ready(&self) -> StorageResult<()> {
        let mut rx = self.shared.settled.subscribe();
        if rx
            .wait_for(|s| *s != ResolutionState::Pending)
            .await
            .is_err()
        {
            return Err(StorageError::NotReady {
                alias: self.shared.alias.clone(),
            });
        }
        match &*self.lock() {
            State::Failed(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<S>> {
        self.shared.state.lock().expect("handle state mutex poisoned")
    }

    fn permanent_failure(&self) -> StorageError {
        StorageError::PermanentFailure {
            alias: self.shared.alias.clone(),
        }
    }

    /// Queue `op` or forward it, depending on state.
    fn dispatch(&self, op: DeferredOp) -> StorageResult<()> {
        let backend = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(queue) | State::Replaying { queue, .. } => {
                    trace!(alias = %self.shared.alias, op = op.name(), queued = queue.len() + 1, "deferring operation");
                    queue.push_back(op);
                    return Ok(());
                }
                State::Resolved { backend, .. } => Arc::clone(backend),
                State::Failed(_) => return Err(self.permanent_failure()),
            }
        };
        op.apply(&*backend)
    }

    /// Settle successfully: replay the queue in order, then forward.
    pub(crate) fn resolve_with(&self, location: RealLocation, backend: S) {
        let backend = Arc::new(backend);
        let mut batch = {
            let mut state = self.lock();
            let replaying = State::Replaying {
                backend: Arc::clone(&backend),
                location: location.clone(),
                queue: VecDeque::new(),
            };
            match std::mem::replace(&mut *state, replaying) {
                State::Pending(queue) => queue,
                settled => {
                    *state = settled;
                    warn!(alias = %self.shared.alias, "handle already settled; ignoring resolution");
                    return;
                }
            }
        };
        debug!(
            alias = %self.shared.alias,
            location = %location,
            queued = batch.len(),
            "alias resolved; replaying deferred operations"
        );

        let _guard = ReplayGuard { handle: self };
        loop {
            for op in batch.drain(..) {
                let name = op.name();
                if let Err(e) = op.replay(&*backend) {
                    warn!(alias = %self.shared.alias, op = name, error = %e, "backend refused replayed operation");
                }
            }
            let mut state = self.lock();
            let next = match &mut *state {
                State::Replaying { queue, .. } => std::mem::take(queue),
                _ => VecDeque::new(),
            };
            if next.is_empty() {
                *state = State::Resolved {
                    backend,
                    location: Some(location),
                };
                break;
            }
            batch = next;
        }
        self.shared.settled.send_replace(ResolutionState::Resolved);
    }

    /// Settle as failed: notify queued calls, then refuse everything.
    pub(crate) fn fail_with(&self, error: StorageError) {
        let queue = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, State::Failed(error.clone())) {
                State::Pending(queue) => queue,
                settled => {
                    *state = settled;
                    warn!(alias = %self.shared.alias, "handle already settled; ignoring failure");
                    return;
                }
            }
        };
        debug!(
            alias = %self.shared.alias,
            error = %error,
            queued = queue.len(),
            "alias resolution failed; notifying deferred operations"
        );
        for op in queue {
            let name = op.name();
            if !op.fail(&error) {
                debug!(alias = %self.shared.alias, op = name, "dropped deferred operation with no callback");
            }
        }
        self.shared.settled.send_replace(ResolutionState::Failed);
    }
}

impl<S: Storage> Storage for AliasHandle<S> {
    fn write(&self, offset: u64, data: Bytes, cb: Completion<()>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Write { offset, data, cb })
    }

    fn read(&self, offset: u64, length: u64, cb: Completion<Bytes>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Read { offset, length, cb })
    }

    fn stat(&self, cb: Completion<Stat>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Stat { cb })
    }

    fn del(&self, offset: u64, length: u64, cb: Completion<()>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Del { offset, length, cb })
    }

    fn close(&self, cb: Completion<()>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Close { cb })
    }

    fn destroy(&self, cb: Completion<()>) -> StorageResult<()> {
        self.dispatch(DeferredOp::Destroy { cb })
    }

    fn on(&self, event: EventKind, listener: Listener) -> StorageResult<()> {
        self.dispatch(DeferredOp::On { event, listener })
    }

    fn status(&self) -> StorageResult<StorageStatus> {
        let backend = match &*self.lock() {
            State::Pending(_) => return Ok(StorageStatus::default()),
            State::Replaying { backend, .. } | State::Resolved { backend, .. } => {
                Arc::clone(backend)
            }
            State::Failed(_) => return Err(self.permanent_failure()),
        };
        backend.status()
    }
}

impl<S> std::fmt::Debug for AliasHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.shared.state.lock().as_deref() {
            Ok(State::Pending(q)) => format!("Pending({})", q.len()),
            Ok(State::Replaying { queue, .. }) => format!("Replaying({})", queue.len()),
            Ok(State::Resolved { .. }) => "Resolved".to_string(),
            Ok(State::Failed(_)) => "Failed".to_string(),
            Err(_) => "Poisoned".to_string(),
        };
        f.debug_struct("AliasHandle")
            .field("alias", &self.shared.alias)
            .field("state", &state)
            .finish()
    }
}
