//! Queue ordering and failure-notification properties over arbitrary call
//! sequences.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use ras_alias::{
    constructor_fn, AliasStorage, MapResolver, RealLocation, ResolutionState, SyncResolver,
};
use ras_storage::{
    BoxError, Bytes, Completion, EventKind, Listener, OpenOptions, Stat, Storage, StorageEvent,
    StorageResult, StorageStatus,
};

/// Backend that logs every call it receives, tagged with the call's index.
#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<u64>>,
}

impl Journal {
    fn record(&self, tag: u64) {
        self.entries.lock().unwrap().push(tag);
    }
}

impl Storage for Journal {
    fn write(&self, offset: u64, _data: Bytes, cb: Completion<()>) -> StorageResult<()> {
        self.record(offset);
        cb.complete(Ok(()));
        Ok(())
    }
    fn read(&self, offset: u64, _length: u64, cb: Completion<Bytes>) -> StorageResult<()> {
        self.record(offset);
        cb.complete(Ok(Bytes::new()));
        Ok(())
    }
    fn stat(&self, cb: Completion<Stat>) -> StorageResult<()> {
        self.record(u64::MAX);
        cb.complete(Ok(Stat::default()));
        Ok(())
    }
    fn del(&self, offset: u64, _length: u64, cb: Completion<()>) -> StorageResult<()> {
        self.record(offset);
        cb.complete(Ok(()));
        Ok(())
    }
    fn close(&self, cb: Completion<()>) -> StorageResult<()> {
        cb.complete(Ok(()));
        Ok(())
    }
    fn destroy(&self, cb: Completion<()>) -> StorageResult<()> {
        cb.complete(Ok(()));
        Ok(())
    }
    fn on(&self, _event: EventKind, _listener: Listener) -> StorageResult<()> {
        Ok(())
    }
    fn status(&self) -> StorageResult<StorageStatus> {
        Ok(StorageStatus::default())
    }
}

/// One generated call: (kind, has_callback).
#[derive(Clone, Copy, Debug)]
enum Call {
    Write(bool),
    Read(bool),
    Del(bool),
    OnError,
    OnOpen,
}

fn call() -> impl Strategy<Value = Call> {
    prop_oneof![
        any::<bool>().prop_map(Call::Write),
        any::<bool>().prop_map(Call::Read),
        any::<bool>().prop_map(Call::Del),
        Just(Call::OnError),
        Just(Call::OnOpen),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Issue `calls` against `handle`; returns the completion/listener hit log.
fn issue<S: Storage>(handle: &S, calls: &[Call]) -> Arc<Mutex<Vec<(usize, bool)>>> {
    let hits = Arc::new(Mutex::new(Vec::new()));
    for (i, c) in calls.iter().enumerate() {
        let tag = i as u64;
        let sink = Arc::clone(&hits);
        let done = move |ok: bool| sink.lock().unwrap().push((i, ok));
        match *c {
            Call::Write(cb) => {
                let comp = if cb { Completion::new(move |r: StorageResult<()>| done(r.is_ok())) } else { Completion::none() };
                handle.write(tag, Bytes::from_static(b"x"), comp).unwrap();
            }
            Call::Read(cb) => {
                let comp = if cb { Completion::new(move |r: StorageResult<Bytes>| done(r.is_ok())) } else { Completion::none() };
                handle.read(tag, 1, comp).unwrap();
            }
            Call::Del(cb) => {
                let comp = if cb { Completion::new(move |r: StorageResult<()>| done(r.is_ok())) } else { Completion::none() };
                handle.del(tag, 1, comp).unwrap();
            }
            Call::OnError | Call::OnOpen => {
                let kind = if matches!(c, Call::OnError) { EventKind::Error } else { EventKind::Open };
                let mut done = Some(done);
                handle
                    .on(
                        kind,
                        Box::new(move |ev: &StorageEvent| {
                            if let Some(d) = done.take() {
                                d(!matches!(ev, StorageEvent::Error(_)));
                            }
                        }),
                    )
                    .unwrap();
            }
        }
    }
    hits
}

proptest! {
    #[test]
    fn replay_preserves_call_order_exactly_once(calls in proptest::collection::vec(call(), 0..40)) {
        let factory = AliasStorage::with_constructor(
            MapResolver::new().passthrough(true),
            constructor_fn(|_: &RealLocation, _: &OpenOptions| Ok(Journal::default())),
        );
        let (handle, resolution) = factory.open_deferred("ordered", OpenOptions::default());
        let hits = issue(&handle, &calls);
        prop_assert_eq!(handle.pending_operations(), calls.len());

        runtime().block_on(resolution);
        prop_assert_eq!(handle.state(), ResolutionState::Resolved);
        let journal = handle.backend().unwrap().entries.lock().unwrap().clone();

        let expected: Vec<u64> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Call::Write(_) | Call::Read(_) | Call::Del(_)))
            .map(|(i, _)| i as u64)
            .collect();
        prop_assert_eq!(journal, expected);

        // Every attached completion ran exactly once, successfully, in order.
        let expected_hits: Vec<(usize, bool)> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Call::Write(true) | Call::Read(true) | Call::Del(true)))
            .map(|(i, _)| (i, true))
            .collect();
        prop_assert_eq!(hits.lock().unwrap().clone(), expected_hits);
    }

    #[test]
    fn failure_notifies_callbacks_and_error_listeners_only(
        calls in proptest::collection::vec(call(), 0..40),
        reject in any::<bool>(),
    ) {
        let resolver = SyncResolver::new(move |_: &str| {
            if reject {
                Err::<Option<String>, BoxError>("rejected".into())
            } else {
                Ok(None)
            }
        });
        let factory = AliasStorage::with_constructor(
            resolver,
            constructor_fn(|_: &RealLocation, _: &OpenOptions| Ok(Journal::default())),
        );
        let (handle, resolution) = factory.open_deferred("doomed", OpenOptions::default());
        let hits = issue(&handle, &calls);

        runtime().block_on(resolution);
        prop_assert_eq!(handle.state(), ResolutionState::Failed);
        prop_assert_eq!(handle.pending_operations(), 0);

        let expected: Vec<(usize, bool)> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                matches!(c, Call::Write(true) | Call::Read(true) | Call::Del(true) | Call::OnError)
            })
            .map(|(i, _)| (i, false))
            .collect();
        prop_assert_eq!(hits.lock().unwrap().clone(), expected);
    }
}
