use std::collections::BTreeMap;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::model::{CollectionKey, DatabaseId, DocumentKey};
use crate::state::collection::CollectionNode;
use crate::state::document::DocumentNode;
use crate::state::events::{ChangeLog, StateEvent};

#[derive(Clone, Debug)]
pub struct DatabaseNode {
    id: DatabaseId,
    collections: BTreeMap<String, CollectionNode>,
}

impl DatabaseNode {
    fn new(id: DatabaseId) -> Self {
        Self {
            id,
            collections: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &DatabaseId {
        &self.id
    }

    fn collection_mut(&mut self, key: &CollectionKey, log: &mut ChangeLog) -> &mut CollectionNode {
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

    fn has_child(&self) -> bool {
        self.collections.values().any(CollectionNode::has_child)
    }

    pub fn to_json(&self) -> JsonValue {
        let collections: JsonMap<String, JsonValue> = self
            .collections
            .iter()
            .filter(|(_, collection)| collection.has_child())
            .map(|(id, collection)| (id.clone(), collection.to_json()))
            .collect();
        json!({
            "collections": collections,
            "path": self.id.documents_root(),
        })
    }
}

#[derive(Clone, Debug)]
pub struct ProjectNode {
    project_id: String,
    databases: BTreeMap<String, DatabaseNode>,
}

impl ProjectNode {
    fn new(project_id: String) -> Self {
        Self {
            project_id,
            databases: BTreeMap::new(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn database_mut(&mut self, id: &DatabaseId, log: &mut ChangeLog) -> &mut DatabaseNode {
        self.databases
            .entry(id.database().to_string())
            .or_insert_with(|| {
                log.push(StateEvent::DatabaseAdded { database: id.clone() });
                DatabaseNode::new(id.clone())
            })
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseNode> {
        self.databases.get(name)
    }

    pub fn to_json(&self) -> JsonValue {
        let databases: JsonMap<String, JsonValue> = self
            .databases
            .iter()
            .filter(|(_, database)| database.has_child())
            .map(|(name, database)| (name.clone(), database.to_json()))
            .collect();
        json!({
            "databases": databases,
            "path": format!("projects/{}", self.project_id),
        })
    }
}

/// Root of the document hierarchy. Every lookup is addressed by a path key.
#[derive(Clone, Debug, Default)]
pub struct StateTree {
    projects: BTreeMap<String, ProjectNode>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn project_mut(&mut self, project_id: &str, log: &mut ChangeLog) -> &mut ProjectNode {
        self.projects
            .entry(project_id.to_string())
            .or_insert_with(|| {
                log.push(StateEvent::ProjectAdded {
                    project_id: project_id.to_string(),
                });
                ProjectNode::new(project_id.to_string())
            })
    }

    pub(crate) fn database_mut(&mut self, id: &DatabaseId, log: &mut ChangeLog) -> &mut DatabaseNode {
        self.project_mut(id.project_id(), log).database_mut(id, log)
    }

    pub(crate) fn collection_mut(
        &mut self,
        key: &CollectionKey,
        log: &mut ChangeLog,
    ) -> &mut CollectionNode {
        match key.parent_document() {
            None => self.database_mut(key.database(), log).collection_mut(key, log),
            Some(parent) => self.document_mut(&parent, log).collection_mut(key, log),
        }
    }

    pub(crate) fn document_mut(&mut self, key: &DocumentKey, log: &mut ChangeLog) -> &mut DocumentNode {
        self.collection_mut(&key.collection(), log)
            .document_mut(key, log)
    }

    pub fn database(&self, id: &DatabaseId) -> Option<&DatabaseNode> {
        self.projects
            .get(id.project_id())
            .and_then(|project| project.database(id.database()))
    }

    /// Read-only lookup; `None` when some node on the path was never created.
    pub fn collection(&self, key: &CollectionKey) -> Option<&CollectionNode> {
        match key.parent_document() {
            None => self.database(key.database())?.collection(key.id()),
            Some(parent) => self.document(&parent)?.collection(key.id()),
        }
    }

    pub fn document(&self, key: &DocumentKey) -> Option<&DocumentNode> {
        self.collection(&key.collection())?.document(key.id())
    }

    pub fn clear(&mut self, log: &mut ChangeLog) {
        self.projects.clear();
        log.push(StateEvent::Cleared);
    }

    pub fn to_json(&self) -> JsonValue {
        let projects: JsonMap<String, JsonValue> = self
            .projects
            .iter()
            .map(|(id, project)| (id.clone(), project.to_json()))
            .collect();
        json!({ "projects": projects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;

    const ROOT: &str = "projects/p/databases/(default)/documents";

    #[test]
    fn resolving_a_document_creates_the_ancestry() {
        let mut tree = StateTree::new();
        let mut log = ChangeLog::new();
        let key = DocumentKey::parse(&format!("{ROOT}/users/alice/posts/p1")).unwrap();
        tree.document_mut(&key, &mut log);

        let kinds: Vec<&str> = log
            .iter()
            .map(|event| match event {
                StateEvent::ProjectAdded { .. } => "project",
                StateEvent::DatabaseAdded { .. } => "database",
                StateEvent::CollectionAdded { .. } => "collection",
                StateEvent::DocumentAdded { .. } => "document",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["project", "database", "collection", "document", "collection", "document"]
        );

        log.clear();
        tree.document_mut(&key, &mut log);
        assert!(log.is_empty());
        assert!(tree.document(&key).is_some());
    }

    #[test]
    fn read_only_lookup_does_not_create() {
        let tree = StateTree::new();
        let key = DocumentKey::parse(&format!("{ROOT}/users/alice")).unwrap();
        assert!(tree.document(&key).is_none());
    }

    #[test]
    fn json_prunes_missing_documents() {
        let mut tree = StateTree::new();
        let mut log = ChangeLog::new();
        let alice = DocumentKey::parse(&format!("{ROOT}/users/alice")).unwrap();
        let ghost = DocumentKey::parse(&format!("{ROOT}/ghosts/casper")).unwrap();
        tree.document_mut(&alice, &mut log)
            .set(Timestamp::new(1, 0), BTreeMap::new(), &[], &mut log);
        tree.document_mut(&ghost, &mut log);

        let json = tree.to_json();
        let database = &json["projects"]["p"]["databases"]["(default)"];
        assert_eq!(database["path"], ROOT);
        assert_eq!(json["projects"]["p"]["path"], "projects/p");
        assert!(database["collections"].get("ghosts").is_none());
        assert_eq!(
            database["collections"]["users"]["documents"]["alice"]["path"],
            format!("{ROOT}/users/alice")
        );
    }

    #[test]
    fn clear_drops_everything() {
        let mut tree = StateTree::new();
        let mut log = ChangeLog::new();
        let key = DocumentKey::parse(&format!("{ROOT}/users/alice")).unwrap();
        tree.document_mut(&key, &mut log);
        log.clear();
        tree.clear(&mut log);
        assert_eq!(log, vec![StateEvent::Cleared]);
        assert_eq!(tree.to_json(), json!({ "projects": {} }));
    }
}
