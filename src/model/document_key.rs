use std::fmt::{Display, Formatter};

use crate::error::{invalid_argument, StateResult};
use crate::model::{DatabaseId, ResourcePath};

/// Full address of a document: its database plus an even-length path below `documents`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    database: DatabaseId,
    path: ResourcePath,
}

impl DocumentKey {
    pub fn new(database: DatabaseId, path: ResourcePath) -> StateResult<Self> {
        if path.len() < 2 || path.len() % 2 != 0 {
            return Err(invalid_argument(format!(
                "Document paths must have an even number of segments: {}",
                path
            )));
        }
        Ok(Self { database, path })
    }

    /// Parses `projects/{p}/databases/{d}/documents/{collection}/{doc}(/...)`.
    pub fn parse(name: &str) -> StateResult<Self> {
        let (database, path) = DatabaseId::split_resource_name(name)?;
        Self::new(database, path)
            .map_err(|_| invalid_argument(format!("Invalid document path: {name}")))
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// Path relative to the `documents` root, e.g. `users/alice`.
    pub fn relative_path(&self) -> String {
        self.path.canonical_string()
    }

    pub fn name(&self) -> String {
        format!("{}/{}", self.database.documents_root(), self.path)
    }

    pub fn collection(&self) -> CollectionKey {
        CollectionKey {
            database: self.database.clone(),
            path: self.path.without_last(),
        }
    }

    /// `(collection id, document id)` pairs from the root down to this document.
    pub fn ancestry(&self) -> Vec<(&str, &str)> {
        self.path
            .chunks(2)
            .map(|pair| (pair[0].as_str(), pair[1].as_str()))
            .collect()
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Full address of a collection: an odd-length path below `documents`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey {
    database: DatabaseId,
    path: ResourcePath,
}

impl CollectionKey {
    pub fn new(database: DatabaseId, path: ResourcePath) -> StateResult<Self> {
        if path.len() % 2 != 1 {
            return Err(invalid_argument(format!(
                "Collection paths must have an odd number of segments: {}",
                path
            )));
        }
        Ok(Self { database, path })
    }

    pub fn parse(name: &str) -> StateResult<Self> {
        let (database, path) = DatabaseId::split_resource_name(name)?;
        Self::new(database, path)
            .map_err(|_| invalid_argument(format!("Invalid collection path: {name}")))
    }

    /// Resolves a query's `parent` (the documents root or a document) plus a collection id.
    pub fn from_parent(parent: &str, collection_id: &str) -> StateResult<Self> {
        if collection_id.is_empty() || collection_id.contains('/') {
            return Err(invalid_argument(format!(
                "Invalid collection id: {collection_id:?}"
            )));
        }
        let (database, path) = DatabaseId::split_resource_name(parent)?;
        if path.len() % 2 != 0 {
            return Err(invalid_argument(format!("Invalid query parent: {parent}")));
        }
        Self::new(database, path.child([collection_id]))
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    pub fn relative_path(&self) -> String {
        self.path.canonical_string()
    }

    pub fn name(&self) -> String {
        format!("{}/{}", self.database.documents_root(), self.path)
    }

    /// The document that owns this collection, `None` for root collections.
    pub fn parent_document(&self) -> Option<DocumentKey> {
        if self.path.len() < 3 {
            return None;
        }
        Some(DocumentKey {
            database: self.database.clone(),
            path: self.path.without_last(),
        })
    }

    pub fn document(&self, id: &str) -> StateResult<DocumentKey> {
        if id.is_empty() || id.contains('/') {
            return Err(invalid_argument(format!("Invalid document id: {id:?}")));
        }
        DocumentKey::new(self.database.clone(), self.path.child([id]))
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "projects/demo/databases/(default)/documents";

    #[test]
    fn parses_nested_document() {
        let key = DocumentKey::parse(&format!("{ROOT}/users/alice/posts/p1")).unwrap();
        assert_eq!(key.id(), "p1");
        assert_eq!(key.relative_path(), "users/alice/posts/p1");
        assert_eq!(key.collection().relative_path(), "users/alice/posts");
        assert_eq!(key.ancestry(), vec![("users", "alice"), ("posts", "p1")]);
        assert_eq!(key.name(), format!("{ROOT}/users/alice/posts/p1"));
    }

    #[test]
    fn rejects_odd_document_paths() {
        for name in [
            format!("{ROOT}/users"),
            ROOT.to_string(),
            format!("{ROOT}/users/alice/posts"),
            format!("{ROOT}/users//alice"),
        ] {
            let err = DocumentKey::parse(&name).unwrap_err();
            assert_eq!(err.code_str(), "state/invalid-argument", "{name}");
        }
    }

    #[test]
    fn collection_from_parent() {
        let root = CollectionKey::from_parent(ROOT, "users").unwrap();
        assert_eq!(root.relative_path(), "users");
        assert!(root.parent_document().is_none());

        let nested = CollectionKey::from_parent(&format!("{ROOT}/users/alice"), "posts").unwrap();
        assert_eq!(nested.relative_path(), "users/alice/posts");
        assert_eq!(nested.parent_document().unwrap().id(), "alice");
        assert_eq!(nested.document("p1").unwrap().relative_path(), "users/alice/posts/p1");
    }

    #[test]
    fn collection_rejects_document_parent_shape() {
        assert!(CollectionKey::from_parent(&format!("{ROOT}/users"), "posts").is_err());
        assert!(CollectionKey::from_parent(ROOT, "").is_err());
        assert!(CollectionKey::parse(&format!("{ROOT}/users/alice")).is_err());
    }
}
