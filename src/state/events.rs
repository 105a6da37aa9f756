use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_channel::{Receiver, Sender, TrySendError};

use crate::model::{CollectionKey, DatabaseId, DocumentKey};

/// A change to the document tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateEvent {
    ProjectAdded { project_id: String },
    DatabaseAdded { database: DatabaseId },
    CollectionAdded { collection: CollectionKey },
    DocumentAdded { document: DocumentKey },
    DocumentCreated { document: DocumentKey },
    DocumentUpdated { document: DocumentKey },
    DocumentDeleted { document: DocumentKey },
    Cleared,
}

impl StateEvent {
    /// Whether the event changes observable document contents.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StateEvent::DocumentCreated { .. }
                | StateEvent::DocumentUpdated { .. }
                | StateEvent::DocumentDeleted { .. }
                | StateEvent::Cleared
        )
    }

    /// The document a create/update/delete touched.
    pub fn mutated_document(&self) -> Option<&DocumentKey> {
        match self {
            StateEvent::DocumentCreated { document }
            | StateEvent::DocumentUpdated { document }
            | StateEvent::DocumentDeleted { document } => Some(document),
            _ => None,
        }
    }
}

/// Events recorded while the tree is locked, published once it is released.
pub type ChangeLog = Vec<StateEvent>;

/// Typed fan-out of [`StateEvent`]s, one unbounded channel per subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Default)]
struct EventBusInner {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<u64, Sender<StateEvent>>>,
}

pub struct EventSubscription {
    pub id: u64,
    pub receiver: Receiver<StateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = async_channel::unbounded();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        EventSubscription { id, receiver }
    }

    /// Detaches subscriber `id`; events already queued for it are discarded.
    pub fn unsubscribe(&self, id: u64) {
        let removed = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(sender) = removed {
            sender.close();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers each event to every subscriber, in subscription order.
    pub fn publish(&self, events: ChangeLog) {
        if events.is_empty() {
            return;
        }
        let subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut closed = Vec::new();
        for event in events {
            for (id, sender) in &subscribers {
                if let Err(TrySendError::Closed(_)) = sender.try_send(event.clone()) {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            self.inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|id, _| !closed.contains(id));
        }
    }
}
