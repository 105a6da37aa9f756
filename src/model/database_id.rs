use crate::error::{invalid_argument, StateResult};
use crate::model::ResourcePath;

/// The `projects/{project}/databases/{database}` prefix shared by every resource name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId {
    project_id: String,
    database: String,
}

impl DatabaseId {
    pub fn new(project_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `projects/{project}/databases/{database}/documents`, the parent of every root collection.
    pub fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    /// Splits a full resource name into its database and the path below `documents`.
    pub fn split_resource_name(name: &str) -> StateResult<(DatabaseId, ResourcePath)> {
        let invalid = || invalid_argument(format!("Invalid path: {name}"));
        let path = ResourcePath::from_string(name).map_err(|_| invalid())?;
        if path.len() < 5
            || path.get(0) != Some("projects")
            || path.get(2) != Some("databases")
            || path.get(4) != Some("documents")
        {
            return Err(invalid());
        }
        let database = DatabaseId::new(&path[1], &path[3]);
        Ok((database, path.pop_first_n(5)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_resource_name() {
        let (database, rest) =
            DatabaseId::split_resource_name("projects/demo/databases/(default)/documents/users/alice")
                .unwrap();
        assert_eq!(database.project_id(), "demo");
        assert_eq!(database.database(), "(default)");
        assert_eq!(rest.canonical_string(), "users/alice");
        assert_eq!(
            database.documents_root(),
            "projects/demo/databases/(default)/documents"
        );
    }

    #[test]
    fn rejects_foreign_prefix() {
        for name in [
            "users/alice",
            "projects/demo/databases/(default)",
            "projects/demo/dbs/(default)/documents/users",
            "projects//databases/(default)/documents",
        ] {
            let err = DatabaseId::split_resource_name(name).unwrap_err();
            assert_eq!(err.code_str(), "state/invalid-argument", "{name}");
        }
    }
}
