use std::collections::BTreeMap;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::error::{already_exists, not_found, unimplemented, StateResult};
use crate::model::{CollectionKey, DocumentKey, FieldPath, Timestamp};
use crate::state::collection::CollectionNode;
use crate::state::events::{ChangeLog, StateEvent};
use crate::state::mask::update_fields;
use crate::state::snapshot::DocumentSnapshot;
use crate::state::transform::FieldTransform;
use crate::value::FieldValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentMetadata {
    Missing,
    Present {
        create_time: Timestamp,
        update_time: Timestamp,
    },
}

/// One addressable document. The node outlives deletes so child collections keep their place.
#[derive(Clone, Debug)]
pub struct DocumentNode {
    key: DocumentKey,
    metadata: DocumentMetadata,
    fields: BTreeMap<String, FieldValue>,
    collections: BTreeMap<String, CollectionNode>,
}

/// A document's own state, without its child collections.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DocumentContents {
    metadata: DocumentMetadata,
    fields: BTreeMap<String, FieldValue>,
}

impl Default for DocumentContents {
    fn default() -> Self {
        Self {
            metadata: DocumentMetadata::Missing,
            fields: BTreeMap::new(),
        }
    }
}

impl DocumentNode {
    pub(crate) fn new(key: DocumentKey) -> Self {
        Self {
            key,
            metadata: DocumentMetadata::Missing,
            fields: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn metadata(&self) -> DocumentMetadata {
        self.metadata
    }

    pub fn exists(&self) -> bool {
        matches!(self.metadata, DocumentMetadata::Present { .. })
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub(crate) fn contents(&self) -> DocumentContents {
        DocumentContents {
            metadata: self.metadata,
            fields: self.fields.clone(),
        }
    }

    /// Puts back state taken with [`contents`](Self::contents). Publishes nothing.
    pub(crate) fn restore(&mut self, contents: DocumentContents) {
        self.metadata = contents.metadata;
        self.fields = contents.fields;
    }

    pub fn create(
        &mut self,
        at: Timestamp,
        fields: BTreeMap<String, FieldValue>,
        log: &mut ChangeLog,
    ) -> StateResult<()> {
        if self.exists() {
            return Err(already_exists("Document already exists."));
        }
        self.metadata = DocumentMetadata::Present {
            create_time: at,
            update_time: at,
        };
        self.fields = fields;
        log.push(StateEvent::DocumentCreated {
            document: self.key.clone(),
        });
        Ok(())
    }

    /// Merges `fields` (restricted by `mask`) into an existing document.
    pub fn update(
        &mut self,
        at: Timestamp,
        fields: BTreeMap<String, FieldValue>,
        mask: &[FieldPath],
        log: &mut ChangeLog,
    ) -> StateResult<()> {
        let DocumentMetadata::Present { create_time, .. } = self.metadata else {
            return Err(not_found("Document does not exist."));
        };
        self.metadata = DocumentMetadata::Present {
            create_time,
            update_time: at,
        };
        self.fields = update_fields(&self.fields, &fields, mask);
        log.push(StateEvent::DocumentUpdated {
            document: self.key.clone(),
        });
        Ok(())
    }

    /// Upsert: creates the document when missing, otherwise merges like [`update`](Self::update).
    pub fn set(
        &mut self,
        at: Timestamp,
        fields: BTreeMap<String, FieldValue>,
        mask: &[FieldPath],
        log: &mut ChangeLog,
    ) {
        let (create_time, event) = match self.metadata {
            DocumentMetadata::Missing => (
                at,
                StateEvent::DocumentCreated {
                    document: self.key.clone(),
                },
            ),
            DocumentMetadata::Present { create_time, .. } => (
                create_time,
                StateEvent::DocumentUpdated {
                    document: self.key.clone(),
                },
            ),
        };
        self.metadata = DocumentMetadata::Present {
            create_time,
            update_time: at,
        };
        self.fields = update_fields(&self.fields, &fields, mask);
        log.push(event);
    }

    pub fn delete(&mut self, log: &mut ChangeLog) -> StateResult<()> {
        if !self.exists() {
            return Err(not_found("Document does not exist."));
        }
        self.metadata = DocumentMetadata::Missing;
        self.fields.clear();
        log.push(StateEvent::DocumentDeleted {
            document: self.key.clone(),
        });
        Ok(())
    }

    /// Applies `transforms` in order, each one as its own `set`, and returns the values they produced.
    pub fn apply_transforms(
        &mut self,
        at: Timestamp,
        transforms: &[FieldTransform],
        log: &mut ChangeLog,
    ) -> StateResult<Vec<FieldValue>> {
        let mut results = Vec::with_capacity(transforms.len());
        for transform in transforms {
            let path = transform.field_path();
            let current = self.get_field_path(path)?;
            let next = transform.apply(current.as_ref(), at)?;
            let mut fields = BTreeMap::new();
            fields.insert(path.first_segment().to_string(), next.clone());
            self.set(at, fields, &[], log);
            results.push(next);
        }
        Ok(results)
    }

    /// Looks up a top-level field by its server-format path.
    ///
    /// Nested paths are rejected with `Unimplemented`; `__name__` yields the
    /// document's own reference.
    pub fn get_field(&self, path: &str) -> StateResult<Option<FieldValue>> {
        let path = FieldPath::parse(path)?;
        self.get_field_path(&path)
    }

    pub fn get_field_path(&self, path: &FieldPath) -> StateResult<Option<FieldValue>> {
        if path.len() > 1 {
            return Err(unimplemented(format!(
                "Nested field paths are not supported: {path}"
            )));
        }
        if path.is_document_id() {
            return Ok(Some(FieldValue::from_reference(self.key.name())));
        }
        Ok(self.fields.get(path.first_segment()).cloned())
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        let (create_time, update_time) = match self.metadata {
            DocumentMetadata::Missing => (None, None),
            DocumentMetadata::Present {
                create_time,
                update_time,
            } => (Some(create_time), Some(update_time)),
        };
        DocumentSnapshot::new(self.key.clone(), self.fields.clone(), create_time, update_time)
    }

    /// Returns child collection `key`, creating it on first use.
    pub(crate) fn collection_mut(
        &mut self,
        key: &CollectionKey,
        log: &mut ChangeLog,
    ) -> &mut CollectionNode {
        self.collections
            .entry(key.id().to_string())
            .or_insert_with(|| {
                log.push(StateEvent::CollectionAdded {
                    collection: key.clone(),
                });
                CollectionNode::new(key.clone())
            })
    }

    pub fn collection(&self, id: &str) -> Option<&CollectionNode> {
        self.collections.get(id)
    }

    pub fn collection_ids(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Whether some collection below holds an existing document.
    pub fn has_child(&self) -> bool {
        self.collections.values().any(CollectionNode::has_child)
    }

    pub fn is_visible(&self) -> bool {
        self.exists() || self.has_child()
    }

    pub fn to_json(&self) -> JsonValue {
        let collections: JsonMap<String, JsonValue> = self
            .collections
            .iter()
            .filter(|(_, collection)| collection.has_child())
            .map(|(id, collection)| (id.clone(), collection.to_json()))
            .collect();
        let fields: JsonMap<String, JsonValue> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_debug_json()))
            .collect();
        json!({
            "collections": collections,
            "fields": fields,
            "path": self.key.name(),
        })
    }
}
