use std::collections::BTreeMap;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::model::{CollectionKey, DocumentKey};
use crate::state::document::DocumentNode;
use crate::state::events::{ChangeLog, StateEvent};
use crate::state::snapshot::CollectionSnapshot;

/// Documents of one collection keyed by id; iteration follows id order.
#[derive(Clone, Debug)]
pub struct CollectionNode {
    key: CollectionKey,
    documents: BTreeMap<String, DocumentNode>,
}

impl CollectionNode {
    pub(crate) fn new(key: CollectionKey) -> Self {
        Self {
            key,
            documents: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Returns document `key`, creating a missing node on first use.
    pub(crate) fn document_mut(&mut self, key: &DocumentKey, log: &mut ChangeLog) -> &mut DocumentNode {
        self.documents
            .entry(key.id().to_string())
            .or_insert_with(|| {
                log.push(StateEvent::DocumentAdded {
                    document: key.clone(),
                });
                DocumentNode::new(key.clone())
            })
    }

    pub fn document(&self, id: &str) -> Option<&DocumentNode> {
        self.documents.get(id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentNode> {
        self.documents.values()
    }

    pub fn existing_documents(&self) -> impl Iterator<Item = &DocumentNode> {
        self.documents.values().filter(|document| document.exists())
    }

    pub fn has_child(&self) -> bool {
        self.documents.values().any(DocumentNode::is_visible)
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot::new(
            self.key.clone(),
            self.existing_documents().map(DocumentNode::snapshot).collect(),
        )
    }

    pub fn to_json(&self) -> JsonValue {
        let documents: JsonMap<String, JsonValue> = self
            .documents
            .iter()
            .filter(|(_, document)| document.is_visible())
            .map(|(id, document)| (id.clone(), document.to_json()))
            .collect();
        json!({
            "documents": documents,
            "path": self.key.name(),
        })
    }
}
