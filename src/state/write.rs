use std::collections::BTreeMap;

use crate::error::{already_exists, not_found, StateResult};
use crate::model::{DocumentKey, FieldPath, Timestamp};
use crate::settings::StateSettings;
use crate::state::database::StateTree;
use crate::state::document::{DocumentContents, DocumentNode};
use crate::state::events::ChangeLog;
use crate::state::transform::FieldTransform;
use crate::value::FieldValue;

/// One entry of a `CommitRequest`.
#[derive(Clone, Debug, PartialEq)]
pub struct Write {
    pub operation: WriteOperation,
    pub precondition: Option<Precondition>,
    pub transforms: Vec<FieldTransform>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    Update {
        name: String,
        fields: BTreeMap<String, FieldValue>,
        /// `None` writes every given key; otherwise only the listed paths.
        mask: Option<Vec<FieldPath>>,
    },
    Delete(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    Exists(bool),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteResult {
    pub update_time: Timestamp,
    pub transform_results: Vec<FieldValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommitResponse {
    pub commit_time: Timestamp,
    pub write_results: Vec<WriteResult>,
}

impl Write {
    /// Unconditional upsert of `fields`.
    pub fn set(name: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            operation: WriteOperation::Update {
                name: name.into(),
                fields,
                mask: None,
            },
            precondition: None,
            transforms: Vec::new(),
        }
    }

    /// Create-only write: fails when the document already exists.
    pub fn create(name: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self::set(name, fields).with_precondition(Precondition::Exists(false))
    }

    /// Merge into an existing document, limited to `mask`.
    pub fn update(
        name: impl Into<String>,
        fields: BTreeMap<String, FieldValue>,
        mask: Vec<FieldPath>,
    ) -> Self {
        Self {
            operation: WriteOperation::Update {
                name: name.into(),
                fields,
                mask: Some(mask),
            },
            precondition: Some(Precondition::Exists(true)),
            transforms: Vec::new(),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            operation: WriteOperation::Delete(name.into()),
            precondition: None,
            transforms: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    pub fn without_precondition(mut self) -> Self {
        self.precondition = None;
        self
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn with_mask(mut self, mask: Vec<FieldPath>) -> Self {
        if let WriteOperation::Update { mask: slot, .. } = &mut self.operation {
            *slot = Some(mask);
        }
        self
    }

    /// Full resource name of the targeted document.
    pub fn name(&self) -> &str {
        match &self.operation {
            WriteOperation::Update { name, .. } => name,
            WriteOperation::Delete(name) => name,
        }
    }
}

pub(crate) fn apply_write(
    tree: &mut StateTree,
    settings: &StateSettings,
    at: Timestamp,
    write: &Write,
    log: &mut ChangeLog,
) -> StateResult<WriteResult> {
    let key = DocumentKey::parse(write.name())?;
    let document = tree.document_mut(&key, log);
    let must_exist = write.precondition.map(|Precondition::Exists(exists)| exists);

    match &write.operation {
        WriteOperation::Delete(_) => {
            check_precondition(document, must_exist, settings)?;
            if document.exists() {
                document.delete(log)?;
            }
            log::debug!("deleted {key}");
            Ok(WriteResult {
                update_time: at,
                transform_results: Vec::new(),
            })
        }
        WriteOperation::Update { fields, mask, .. } => {
            check_precondition(document, must_exist, settings)?;
            let mask = mask.as_deref().unwrap_or(&[]);
            match must_exist {
                Some(false) => document.create(at, fields.clone(), log)?,
                Some(true) => document.update(at, fields.clone(), mask, log)?,
                None => document.set(at, fields.clone(), mask, log),
            }
            let transform_results = document.apply_transforms(at, &write.transforms, log)?;
            log::debug!(
                "wrote {key} ({} fields, {} transforms)",
                fields.len(),
                write.transforms.len()
            );
            Ok(WriteResult {
                update_time: at,
                transform_results,
            })
        }
    }
}

/// Applies `writes` in order as one unit. On failure every touched document
/// is put back and `log` is left empty.
pub(crate) fn commit(
    tree: &mut StateTree,
    settings: &StateSettings,
    at: Timestamp,
    writes: &[Write],
    log: &mut ChangeLog,
) -> StateResult<CommitResponse> {
    let mut undo = BTreeMap::new();
    let mut write_results = Vec::with_capacity(writes.len());
    for write in writes {
        let applied = remember(tree, write, &mut undo)
            .and_then(|()| apply_write(tree, settings, at, write, log));
        match applied {
            Ok(result) => write_results.push(result),
            Err(err) => {
                log::debug!("rolling back commit of {} writes: {err}", writes.len());
                rollback(tree, undo);
                log.clear();
                return Err(err);
            }
        }
    }
    Ok(CommitResponse {
        commit_time: at,
        write_results,
    })
}

/// Records the target's state the first time a commit touches it.
fn remember(
    tree: &StateTree,
    write: &Write,
    undo: &mut BTreeMap<DocumentKey, DocumentContents>,
) -> StateResult<()> {
    let key = DocumentKey::parse(write.name())?;
    if !undo.contains_key(&key) {
        let contents = tree
            .document(&key)
            .map(DocumentNode::contents)
            .unwrap_or_default();
        undo.insert(key, contents);
    }
    Ok(())
}

fn rollback(tree: &mut StateTree, undo: BTreeMap<DocumentKey, DocumentContents>) {
    // Nodes created on the way stay behind as missing documents.
    let mut discarded = ChangeLog::new();
    for (key, contents) in undo {
        tree.document_mut(&key, &mut discarded).restore(contents);
    }
}

fn check_precondition(
    document: &DocumentNode,
    must_exist: Option<bool>,
    settings: &StateSettings,
) -> StateResult<()> {
    match must_exist {
        Some(true) if !document.exists() => Err(not_found(no_entity_message(document.key(), settings))),
        Some(false) if document.exists() => Err(already_exists(format!(
            "entity already exists: EntityRef{{partitionRef={}, path={}}}",
            settings.partition(document.key().database().project_id()),
            document.key().relative_path()
        ))),
        _ => Ok(()),
    }
}

fn no_entity_message(key: &DocumentKey, settings: &StateSettings) -> String {
    let elements: Vec<String> = key
        .ancestry()
        .into_iter()
        .map(|(collection, document)| {
            format!("  Element {{\n    type: \"{collection}\"\n    name: \"{document}\"\n  }}")
        })
        .collect();
    format!(
        "no entity to update: app: \"{}\"\npath <\n{}\n>\n",
        settings.partition(key.database().project_id()),
        elements.join("\n")
    )
}
