use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use async_channel::Receiver;

use crate::error::{unimplemented, StateResult};
use crate::model::{CollectionKey, DocumentKey, Timestamp};
use crate::platform::runtime::{sleep, spawn_detached, spawns_in_parallel, yield_now};
use crate::state::database::StateTree;
use crate::state::events::{EventBus, StateEvent};
use crate::state::query::StructuredQuery;
use crate::state::query_evaluator::{apply_query, validate_query};
use crate::state::snapshot::DocumentSnapshot;
use crate::state::store::StateStore;
use crate::wire::{ListenResponse, TargetChangeType};

/// Callback receiving every response of one listen stream, in order.
pub type ListenEmitter = Arc<dyn Fn(ListenResponse) + Send + Sync + 'static>;

#[derive(Clone, Debug, PartialEq)]
pub enum ListenRequest {
    AddTarget { target_id: i32, target: ListenTarget },
    RemoveTarget(i32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListenTarget {
    Query {
        parent: String,
        query: StructuredQuery,
    },
    /// Full resource names of the watched documents.
    Documents(Vec<String>),
}

/// Keeps a listen stream alive. Dropping it (or calling [`detach`](Self::detach))
/// stops every further emission, including a recomputation already queued.
pub struct ListenRegistration {
    events: EventBus,
    subscription: Option<u64>,
    gate: Arc<StreamGate>,
    target_id: i32,
}

impl ListenRegistration {
    pub fn target_id(&self) -> i32 {
        self.target_id
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.gate.close();
            self.events.unsubscribe(id);
            log::debug!("listen target {} detached", self.target_id);
        }
    }
}

impl Drop for ListenRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

/// Orders emissions against closing the stream: once [`close`](Self::close)
/// returns, no callback of the stream runs again.
struct StreamGate {
    open: AtomicBool,
    emitting: Mutex<()>,
    emitter: Mutex<Option<ThreadId>>,
}

impl StreamGate {
    fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            emitting: Mutex::new(()),
            emitter: Mutex::new(None),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Closes the stream, waiting for a burst in flight on another thread.
    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let closing = Some(thread::current().id());
        let from_callback = *self.emitter.lock().unwrap_or_else(PoisonError::into_inner) == closing;
        // A callback closing its own stream already holds `emitting`; the rest
        // of that burst is cut off by the per-response `is_open` check.
        if !from_callback {
            drop(self.emitting.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }

    /// Runs `burst` with the stream held open. Skipped once closed.
    fn hold(&self, burst: impl FnOnce()) {
        let _emitting = self.emitting.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_open() {
            return;
        }
        self.set_emitter(Some(thread::current().id()));
        burst();
        self.set_emitter(None);
    }

    fn set_emitter(&self, emitter: Option<ThreadId>) {
        *self.emitter.lock().unwrap_or_else(PoisonError::into_inner) = emitter;
    }
}

/// A listen target with its names already parsed and validated.
enum WatchedTarget {
    Query {
        collection: CollectionKey,
        query: StructuredQuery,
    },
    Documents(Vec<DocumentKey>),
}

impl WatchedTarget {
    fn resolve(target: ListenTarget) -> StateResult<Self> {
        match target {
            ListenTarget::Query { parent, query } => {
                validate_query(&query)?;
                let collection = CollectionKey::from_parent(&parent, query.collection_id()?)?;
                Ok(WatchedTarget::Query { collection, query })
            }
            ListenTarget::Documents(names) => Ok(WatchedTarget::Documents(
                names
                    .iter()
                    .map(|name| DocumentKey::parse(name))
                    .collect::<StateResult<Vec<_>>>()?,
            )),
        }
    }

    fn evaluate(&self, tree: &StateTree) -> StateResult<Vec<DocumentSnapshot>> {
        match self {
            WatchedTarget::Query { collection, query } => apply_query(tree.collection(collection), query),
            WatchedTarget::Documents(keys) => Ok(keys
                .iter()
                .filter_map(|key| tree.document(key))
                .filter(|document| document.exists())
                .map(|document| document.snapshot())
                .collect()),
        }
    }

    fn is_affected_by(&self, event: &StateEvent) -> bool {
        match self {
            WatchedTarget::Query { .. } => event.is_mutation(),
            WatchedTarget::Documents(keys) => match event {
                StateEvent::Cleared => true,
                other => other
                    .mutated_document()
                    .is_some_and(|document| keys.contains(document)),
            },
        }
    }

    /// Query targets only announce result changes; document targets announce
    /// every write to a watched document.
    fn announces_unchanged_results(&self) -> bool {
        matches!(self, WatchedTarget::Documents(_))
    }
}

pub(crate) fn listen(
    store: &StateStore,
    request: ListenRequest,
    emit: ListenEmitter,
) -> StateResult<ListenRegistration> {
    let (target_id, target) = match request {
        ListenRequest::AddTarget { target_id, target } => (target_id, target),
        ListenRequest::RemoveTarget(target_id) => {
            log::warn!("rejecting remove_target for target {target_id}");
            return Err(unimplemented("remove_target is not implemented"));
        }
    };
    let target = WatchedTarget::resolve(target)?;

    // Subscribe before the first read so no write slips between the two.
    let subscription = store.subscribe();
    let initial = match store.read(|tree| target.evaluate(tree)) {
        Ok(documents) => documents,
        Err(err) => {
            store.events().unsubscribe(subscription.id);
            return Err(err);
        }
    };

    emit(ListenResponse::target_change(
        TargetChangeType::Add,
        vec![target_id],
        None,
    ));
    send_documents(&*emit, target_id, &initial);
    log::debug!(
        "listen target {target_id} added with {} documents",
        initial.len()
    );

    let gate = Arc::new(StreamGate::new());
    let registration = ListenRegistration {
        events: store.events().clone(),
        subscription: Some(subscription.id),
        gate: Arc::clone(&gate),
        target_id,
    };

    let coalesce_yields = store.settings().listen_coalesce_yields;
    let quiet_period = spawns_in_parallel()
        .then(|| Duration::from_millis(store.settings().listen_quiet_period_ms));
    let store = store.downgrade();
    let receiver = subscription.receiver;
    spawn_detached(async move {
        let mut current = initial;
        while let Ok(event) = receiver.recv().await {
            if !target.is_affected_by(&event) {
                continue;
            }
            coalesce(&receiver, coalesce_yields, quiet_period).await;

            if !gate.is_open() {
                break;
            }
            let Some(handle) = store.upgrade() else {
                break;
            };
            let next = match handle.read(|tree| target.evaluate(tree)) {
                Ok(documents) => documents,
                Err(err) => {
                    log::warn!("listen target {target_id} failed to recompute: {err}");
                    continue;
                }
            };
            drop(handle);

            if next == current && !target.announces_unchanged_results() {
                continue;
            }
            gate.hold(|| {
                log::debug!(
                    "listen target {target_id} reset with {} documents",
                    next.len()
                );
                let emit_open = |response: ListenResponse| {
                    if gate.is_open() {
                        emit(response);
                    }
                };
                emit_open(ListenResponse::target_change(
                    TargetChangeType::Reset,
                    vec![target_id],
                    Some(Timestamp::now()),
                ));
                send_documents(&emit_open, target_id, &next);
            });
            current = next;
        }
    });

    Ok(registration)
}

/// Lets writes issued back to back land before a recompute, discarding their
/// events. With a `quiet_period` it keeps waiting until one passes with no event.
async fn coalesce(
    receiver: &Receiver<StateEvent>,
    yields: usize,
    quiet_period: Option<Duration>,
) {
    yield_now(yields).await;
    while receiver.try_recv().is_ok() {}

    let Some(quiet_period) = quiet_period.filter(|period| !period.is_zero()) else {
        return;
    };
    loop {
        sleep(quiet_period).await;
        let mut arrived = false;
        while receiver.try_recv().is_ok() {
            arrived = true;
        }
        if !arrived {
            return;
        }
    }
}

fn send_documents(emit: &dyn Fn(ListenResponse), target_id: i32, documents: &[DocumentSnapshot]) {
    for document in documents {
        emit(ListenResponse::document_change(
            document.clone(),
            vec![target_id],
        ));
    }
    let read_time = Timestamp::now();
    emit(ListenResponse::target_change(
        TargetChangeType::Current,
        vec![target_id],
        Some(read_time),
    ));
    emit(ListenResponse::target_change(
        TargetChangeType::NoChange,
        Vec::new(),
        Some(read_time),
    ));
}
