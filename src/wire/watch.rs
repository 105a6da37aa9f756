use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::model::Timestamp;
use crate::state::DocumentSnapshot;

/// One message on a listen stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenResponse {
    TargetChange(TargetChange),
    DocumentChange(DocumentChange),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetChange {
    pub change_type: TargetChangeType,
    pub target_ids: Vec<i32>,
    pub read_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetChangeType {
    NoChange,
    Add,
    Remove,
    Current,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub document: DocumentSnapshot,
    pub target_ids: Vec<i32>,
}

impl TargetChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetChangeType::NoChange => "NO_CHANGE",
            TargetChangeType::Add => "ADD",
            TargetChangeType::Remove => "REMOVE",
            TargetChangeType::Current => "CURRENT",
            TargetChangeType::Reset => "RESET",
        }
    }
}

impl ListenResponse {
    pub fn target_change(
        change_type: TargetChangeType,
        target_ids: Vec<i32>,
        read_time: Option<Timestamp>,
    ) -> Self {
        ListenResponse::TargetChange(TargetChange {
            change_type,
            target_ids,
            read_time,
        })
    }

    pub fn document_change(document: DocumentSnapshot, target_ids: Vec<i32>) -> Self {
        ListenResponse::DocumentChange(DocumentChange {
            document,
            target_ids,
        })
    }

    /// The change type for target changes, `None` for document changes.
    pub fn change_type(&self) -> Option<TargetChangeType> {
        match self {
            ListenResponse::TargetChange(change) => Some(change.change_type),
            ListenResponse::DocumentChange(_) => None,
        }
    }

    pub fn document(&self) -> Option<&DocumentSnapshot> {
        match self {
            ListenResponse::TargetChange(_) => None,
            ListenResponse::DocumentChange(change) => Some(&change.document),
        }
    }

    /// `google.firestore.v1.ListenResponse` in protobuf JSON form.
    pub fn to_wire(&self) -> JsonValue {
        match self {
            ListenResponse::TargetChange(change) => {
                let mut body = JsonMap::new();
                body.insert(
                    "targetChangeType".to_string(),
                    JsonValue::String(change.change_type.as_str().to_string()),
                );
                body.insert("targetIds".to_string(), json!(change.target_ids));
                if let Some(read_time) = change.read_time {
                    body.insert(
                        "readTime".to_string(),
                        JsonValue::String(read_time.to_rfc3339()),
                    );
                }
                json!({ "targetChange": body })
            }
            ListenResponse::DocumentChange(change) => json!({
                "documentChange": {
                    "document": change.document.to_wire(),
                    "targetIds": change.target_ids,
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::model::DocumentKey;
    use crate::value::FieldValue;

    #[test]
    fn target_change_shape() {
        let add = ListenResponse::target_change(TargetChangeType::Add, vec![7], None);
        assert_eq!(
            add.to_wire(),
            json!({ "targetChange": { "targetChangeType": "ADD", "targetIds": [7] } })
        );

        let no_change = ListenResponse::target_change(
            TargetChangeType::NoChange,
            Vec::new(),
            Some(Timestamp::new(5, 0)),
        );
        assert_eq!(
            no_change.to_wire(),
            json!({
                "targetChange": {
                    "targetChangeType": "NO_CHANGE",
                    "targetIds": [],
                    "readTime": "1970-01-01T00:00:05.000000000Z",
                }
            })
        );
        assert_eq!(no_change.change_type(), Some(TargetChangeType::NoChange));
    }

    #[test]
    fn document_change_shape() {
        let key = DocumentKey::parse("projects/p/databases/(default)/documents/users/alice").unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::from_string("Alice"));
        let snapshot = DocumentSnapshot::new(
            key,
            fields,
            Some(Timestamp::new(1, 0)),
            Some(Timestamp::new(1, 0)),
        );
        let change = ListenResponse::document_change(snapshot, vec![1]);
        let wire = change.to_wire();
        assert_eq!(wire["documentChange"]["targetIds"], json!([1]));
        assert_eq!(
            wire["documentChange"]["document"]["fields"]["name"],
            json!({ "stringValue": "Alice" })
        );
        assert!(change.change_type().is_none());
        assert_eq!(change.document().map(DocumentSnapshot::id), Some("alice"));
    }
}
