//! Storage lifecycle events and the per-backend listener registry.

use std::sync::{Arc, Mutex};

use crate::error::StorageError;

/// Event names a listener can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Destroy,
    Error,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::Destroy => write!(f, "destroy"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An emitted event.
#[derive(Clone, Debug)]
pub enum StorageEvent {
    Open,
    Close,
    Destroy,
    Error(StorageError),
}

impl StorageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Close => EventKind::Close,
            Self::Destroy => EventKind::Destroy,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Event listener registered through `Storage::on`.
pub type Listener = Box<dyn FnMut(&StorageEvent) + Send + 'static>;

type SharedListener = Arc<Mutex<Listener>>;

/// Listener registry used by the built-in backends.
///
/// Listeners are invoked outside the registry lock, so a listener may
/// subscribe further listeners while an event is being emitted. Those new
/// listeners only see later events.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(EventKind, SharedListener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, listener: Listener) {
        self.listeners
            .lock()
            .expect("event bus lock poisoned")
            .push((kind, Arc::new(Mutex::new(listener))));
    }

    /// Deliver `event` to every listener subscribed to its kind, in
    /// subscription order. Returns the number of listeners invoked.
    pub fn emit(&self, event: &StorageEvent) -> usize {
        let kind = event.kind();
        let matching: Vec<SharedListener> = self
            .listeners
            .lock()
            .expect("event bus lock poisoned")
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in &matching {
            let mut l = listener.lock().expect("listener lock poisoned");
            (*l)(event);
        }
        matching.len()
    }

    /// Number of listeners subscribed to `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .expect("event bus lock poisoned")
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("EventBus")
            .field("listener_count", &count)
            .finish()
    }
}
