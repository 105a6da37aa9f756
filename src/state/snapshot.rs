use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::model::{CollectionKey, DocumentKey, Timestamp};
use crate::value::FieldValue;
use crate::wire::encode_fields;

/// Point-in-time copy of one document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    fields: BTreeMap<String, FieldValue>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
}

impl DocumentSnapshot {
    pub(crate) fn new(
        key: DocumentKey,
        fields: BTreeMap<String, FieldValue>,
        create_time: Option<Timestamp>,
        update_time: Option<Timestamp>,
    ) -> Self {
        Self {
            key,
            fields,
            create_time,
            update_time,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn name(&self) -> String {
        self.key.name()
    }

    pub fn exists(&self) -> bool {
        self.create_time.is_some()
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }

    /// `google.firestore.v1.Document` in protobuf JSON form.
    pub fn to_wire(&self) -> JsonValue {
        let mut document = JsonMap::new();
        document.insert("name".to_string(), JsonValue::String(self.name()));
        document.insert("fields".to_string(), encode_fields(&self.fields));
        if let Some(create_time) = self.create_time {
            document.insert(
                "createTime".to_string(),
                JsonValue::String(create_time.to_rfc3339()),
            );
        }
        if let Some(update_time) = self.update_time {
            document.insert(
                "updateTime".to_string(),
                JsonValue::String(update_time.to_rfc3339()),
            );
        }
        JsonValue::Object(document)
    }
}

/// The existing documents of one collection, in id order.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSnapshot {
    key: CollectionKey,
    documents: Vec<DocumentSnapshot>,
}

impl CollectionSnapshot {
    pub(crate) fn new(key: CollectionKey, documents: Vec<DocumentSnapshot>) -> Self {
        Self { key, documents }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.documents.iter().map(DocumentSnapshot::id).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_document_shape() {
        let key = DocumentKey::parse("projects/p/databases/(default)/documents/users/alice").unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("age".to_string(), FieldValue::from_integer(21));
        let snapshot = DocumentSnapshot::new(
            key,
            fields,
            Some(Timestamp::new(1, 0)),
            Some(Timestamp::new(2, 0)),
        );
        assert!(snapshot.exists());
        assert_eq!(
            snapshot.to_wire(),
            json!({
                "name": "projects/p/databases/(default)/documents/users/alice",
                "fields": { "age": { "integerValue": "21" } },
                "createTime": "1970-01-01T00:00:01.000000000Z",
                "updateTime": "1970-01-01T00:00:02.000000000Z",
            })
        );
    }

    #[test]
    fn missing_document_has_no_times() {
        let key = DocumentKey::parse("projects/p/databases/(default)/documents/users/bob").unwrap();
        let snapshot = DocumentSnapshot::new(key, BTreeMap::new(), None, None);
        assert!(!snapshot.exists());
        assert!(snapshot.to_wire().get("createTime").is_none());
    }
}
