use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value as JsonValue;

use crate::error::{internal_error, StateResult};
use crate::model::{CollectionKey, DocumentKey, Timestamp};
use crate::settings::StateSettings;
use crate::state::aggregate::{aggregate, Aggregation};
use crate::state::database::StateTree;
use crate::state::events::{ChangeLog, EventBus, EventSubscription};
use crate::state::listen::{self, ListenEmitter, ListenRegistration, ListenRequest};
use crate::state::query::StructuredQuery;
use crate::state::query_evaluator::apply_query;
use crate::state::snapshot::{CollectionSnapshot, DocumentSnapshot};
use crate::state::write::{self, CommitResponse, Write, WriteResult};
use crate::value::FieldValue;
use crate::wire::ListenResponse;

/// Handle to one in-memory emulator state. Clones share the same tree.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    tree: Mutex<StateTree>,
    events: EventBus,
    settings: StateSettings,
}

/// Non-owning handle held by background listen tasks.
#[derive(Clone)]
pub(crate) struct WeakStateStore {
    inner: Weak<StoreInner>,
}

impl WeakStateStore {
    pub(crate) fn upgrade(&self) -> Option<StateStore> {
        self.inner.upgrade().map(|inner| StateStore { inner })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchGetResult {
    Found(DocumentSnapshot),
    /// Full resource name of a document that does not exist.
    Missing(String),
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_settings(StateSettings::default())
    }

    pub fn with_settings(settings: StateSettings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tree: Mutex::new(StateTree::new()),
                events: EventBus::new(),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &StateSettings {
        &self.inner.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.inner.events.subscribe()
    }

    pub(crate) fn downgrade(&self) -> WeakStateStore {
        WeakStateStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Runs `f` against the tree under the lock. Nothing is created or published.
    pub fn read<T>(&self, f: impl FnOnce(&StateTree) -> T) -> T {
        let tree = self.inner.tree.lock().unwrap_or_else(PoisonError::into_inner);
        f(&tree)
    }

    /// Runs `f` under the lock and publishes what it recorded once the lock is released.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StateTree, &StateSettings, &mut ChangeLog) -> StateResult<T>,
    ) -> StateResult<T> {
        let mut log = ChangeLog::new();
        let result = {
            let mut tree = self.inner.tree.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut tree, &self.inner.settings, &mut log)
        };
        self.inner.events.publish(log);
        result
    }

    /// Resolves a document by full name, creating its ancestry on first use.
    pub fn get_document(&self, name: &str) -> StateResult<DocumentSnapshot> {
        let key = DocumentKey::parse(name)?;
        self.mutate(|tree, _, log| Ok(tree.document_mut(&key, log).snapshot()))
    }

    /// Resolves a collection by full name, creating its ancestry on first use.
    pub fn get_collection(&self, name: &str) -> StateResult<CollectionSnapshot> {
        let key = CollectionKey::parse(name)?;
        self.mutate(|tree, _, log| Ok(tree.collection_mut(&key, log).snapshot()))
    }

    /// Applies one write atomically; a failing transform leaves the document untouched.
    pub fn apply_write(&self, commit_time: Timestamp, write: &Write) -> StateResult<WriteResult> {
        let response = self.commit(commit_time, std::slice::from_ref(write))?;
        response
            .write_results
            .into_iter()
            .next()
            .ok_or_else(|| internal_error("commit produced no write result"))
    }

    /// Applies `writes` in order, all or nothing.
    pub fn commit(&self, commit_time: Timestamp, writes: &[Write]) -> StateResult<CommitResponse> {
        self.mutate(|tree, settings, log| write::commit(tree, settings, commit_time, writes, log))
    }

    /// Evaluates `query` against the collection it selects below `parent`.
    pub fn run_query(
        &self,
        parent: &str,
        query: &StructuredQuery,
    ) -> StateResult<Vec<DocumentSnapshot>> {
        let collection = CollectionKey::from_parent(parent, query.collection_id()?)?;
        self.read(|tree| apply_query(tree.collection(&collection), query))
    }

    pub fn run_aggregation(
        &self,
        parent: &str,
        query: &StructuredQuery,
        aggregations: &[Aggregation],
    ) -> StateResult<BTreeMap<String, FieldValue>> {
        let documents = self.run_query(parent, query)?;
        aggregate(&documents, aggregations)
    }

    /// Looks up every name, in request order.
    pub fn batch_get<S: AsRef<str>>(&self, names: &[S]) -> StateResult<Vec<BatchGetResult>> {
        let keys = names
            .iter()
            .map(|name| DocumentKey::parse(name.as_ref()))
            .collect::<StateResult<Vec<_>>>()?;
        Ok(self.read(|tree| {
            keys.iter()
                .map(|key| match tree.document(key) {
                    Some(document) if document.exists() => BatchGetResult::Found(document.snapshot()),
                    _ => BatchGetResult::Missing(key.name()),
                })
                .collect()
        }))
    }

    /// Opens a listen stream; responses go to `emit` until the registration is dropped.
    pub fn listen<F>(&self, request: ListenRequest, emit: F) -> StateResult<ListenRegistration>
    where
        F: Fn(ListenResponse) + Send + Sync + 'static,
    {
        let emit: ListenEmitter = Arc::new(emit);
        listen::listen(self, request, emit)
    }

    /// Drops every project, database and document.
    pub fn clear_all(&self) {
        let mut log = ChangeLog::new();
        self.inner
            .tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear(&mut log);
        self.inner.events.publish(log);
        log::debug!("cleared emulator state");
    }

    /// Pruned JSON dump of the whole tree.
    pub fn to_snapshot(&self) -> JsonValue {
        self.read(StateTree::to_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DatabaseId;
    use crate::state::events::StateEvent;

    const ROOT: &str = "projects/p/databases/(default)/documents";

    #[test]
    fn lazy_resolution_publishes_additions() {
        let store = StateStore::new();
        let subscription = store.subscribe();

        let snapshot = store.get_document(&format!("{ROOT}/users/alice")).unwrap();
        assert!(!snapshot.exists());

        let mut received = Vec::new();
        while let Ok(event) = subscription.receiver.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
        assert!(matches!(received[3], StateEvent::DocumentAdded { .. }));

        store.get_document(&format!("{ROOT}/users/alice")).unwrap();
        assert!(subscription.receiver.try_recv().is_err());
    }

    #[test]
    fn malformed_names_are_rejected() {
        let store = StateStore::new();
        let err = store.get_document(&format!("{ROOT}/users")).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
        let err = store.get_collection(&format!("{ROOT}/users/alice")).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
    }

    #[test]
    fn clones_share_state() {
        let store = StateStore::new();
        let other = store.clone();
        other
            .apply_write(
                Timestamp::new(1, 0),
                &Write::set(format!("{ROOT}/users/alice"), BTreeMap::new()),
            )
            .unwrap();
        let collection = store.get_collection(&format!("{ROOT}/users")).unwrap();
        assert_eq!(collection.document_ids(), vec!["alice"]);
    }

    #[test]
    fn clear_all_publishes_one_cleared_event() {
        let store = StateStore::new();
        store.get_document(&format!("{ROOT}/users/alice")).unwrap();
        let subscription = store.subscribe();

        store.clear_all();
        assert_eq!(subscription.receiver.try_recv().unwrap(), StateEvent::Cleared);
        assert!(subscription.receiver.try_recv().is_err());
        assert!(store.read(|tree| tree.database(&DatabaseId::new("p", "(default)")).is_none()));
    }
}
