//! The document store: collections of JSON documents with versioned compare-and-commit writes and
//! push-based change notification per query.
//!
//! `DocumentStore` is the seam between the app and whatever hosts the data. `MemoryStore` keeps
//! everything in process and can simulate access-policy and connectivity failures. `SqliteStore`
//! persists to a local SQLite file.

mod listeners;
mod memory;
mod migrations;
mod query;
mod sqlite;

pub use listeners::ListenerId;
pub use memory::MemoryStore;
pub use query::{Query, RangeFilter, RangeOp, OWNER_FIELD};
pub use sqlite::SqliteStore;

use crate::error::FaultContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tokio::sync::mpsc;

/// The fields of a document.
pub type Fields = Map<String, Value>;

/// Result type of store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The operation that was attempted on a resource. Reported with permission and connectivity
/// faults.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    Delete,
    /// A multi-document commit.
    Write,
}

serde_plain::derive_display_from_serialize!(Operation);
serde_plain::derive_fromstr_from_deserialize!(Operation);

/// Errors reported by a `DocumentStore`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Missing or insufficient permissions for '{operation}' on '{path}'")]
    PermissionDenied { path: String, operation: Operation },

    #[error("The store is unavailable for '{operation}' on '{path}': {message}")]
    Unavailable {
        path: String,
        operation: Operation,
        message: String,
    },

    #[error("Document '{path}' was modified by another writer")]
    Conflict { path: String },

    #[error("Document '{path}' does not exist")]
    NotFound { path: String },

    #[error("Document '{path}' already exists")]
    AlreadyExists { path: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// The resource and operation for the faults that are routed to the fault channel.
    pub(crate) fn fault_context(&self) -> Option<FaultContext> {
        match self {
            StoreError::PermissionDenied { path, operation }
            | StoreError::Unavailable {
                path, operation, ..
            } => Some(FaultContext {
                resource_path: path.clone(),
                operation: *operation,
            }),
            _ => None,
        }
    }
}

/// The location of a document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((collection, id))
                if !collection.is_empty() && !id.is_empty() && !id.contains('/') =>
            {
                Ok(DocPath::new(collection, id))
            }
            _ => anyhow::bail!("Invalid document path '{s}', expected 'collection/id'"),
        }
    }
}

/// A raw document as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: DocPath,
    version: u64,
    data: Fields,
}

impl Document {
    pub fn new(path: DocPath, version: u64, data: Fields) -> Self {
        Self {
            path,
            version,
            data,
        }
    }

    pub fn path(&self) -> &DocPath {
        &self.path
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Incremented on every write to this document.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &Fields {
        &self.data
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// One write in a `Commit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Fails with `AlreadyExists` if the document exists.
    Create { path: DocPath, data: Fields },
    /// Creates or replaces the document.
    Set { path: DocPath, data: Fields },
    /// Merges top-level fields into an existing document. Fails with `NotFound` if it is missing.
    Update { path: DocPath, fields: Fields },
    /// Deleting a missing document is not an error.
    Delete { path: DocPath },
}

impl Write {
    pub fn path(&self) -> &DocPath {
        match self {
            Write::Create { path, .. }
            | Write::Set { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path } => path,
        }
    }

    /// The operation an access policy should check for this write.
    pub fn operation(&self, exists: bool) -> Operation {
        match self {
            Write::Create { .. } => Operation::Create,
            Write::Set { .. } if exists => Operation::Update,
            Write::Set { .. } => Operation::Create,
            Write::Update { .. } => Operation::Update,
            Write::Delete { .. } => Operation::Delete,
        }
    }
}

/// The version of a document that a transaction observed. `None` means it did not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub path: DocPath,
    pub version: Option<u64>,
}

/// An atomic batch of writes. Every precondition must still hold at commit time, otherwise the
/// store rejects the whole commit with `StoreError::Conflict` and applies nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commit {
    preconditions: Vec<Precondition>,
    writes: Vec<Write>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the document at `path` to still be at `version` when the commit is applied.
    pub fn expect_version(&mut self, path: DocPath, version: Option<u64>) -> &mut Self {
        self.preconditions.push(Precondition { path, version });
        self
    }

    pub fn create(&mut self, path: DocPath, data: Fields) -> &mut Self {
        self.writes.push(Write::Create { path, data });
        self
    }

    pub fn set(&mut self, path: DocPath, data: Fields) -> &mut Self {
        self.writes.push(Write::Set { path, data });
        self
    }

    pub fn update(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.writes.push(Write::Update { path, fields });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.writes.push(Write::Delete { path });
        self
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The collections written by this commit, used to decide which listeners to notify.
    pub fn touched_collections(&self) -> BTreeSet<String> {
        self.writes
            .iter()
            .map(|w| w.path().collection().to_string())
            .collect()
    }
}

/// An event pushed to a listener.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The full, current result set of the listener's query in path order.
    Snapshot(Vec<Document>),
    /// The listener failed and will receive nothing further.
    Error(StoreError),
}

/// A registered listener: its id (for `unsubscribe`) and the events pushed to it.
#[derive(Debug)]
pub struct Listener {
    pub id: ListenerId,
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
}

/// A store of JSON documents grouped into collections.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>>;

    /// Runs a one-shot query. Results are in path order.
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Applies all writes of `commit` atomically, or none of them.
    async fn commit(&self, commit: Commit) -> StoreResult<()>;

    /// Registers a listener for `query`. The current result set is pushed immediately, and again
    /// after every commit that touches the query's collection.
    async fn subscribe(&self, query: Query) -> StoreResult<Listener>;

    /// Releases a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);

    /// Releases backend resources.
    async fn close(&self) {}

    async fn create(&self, path: DocPath, data: Fields) -> StoreResult<()> {
        let mut commit = Commit::new();
        commit.create(path, data);
        self.commit(commit).await
    }

    async fn set(&self, path: DocPath, data: Fields) -> StoreResult<()> {
        let mut commit = Commit::new();
        commit.set(path, data);
        self.commit(commit).await
    }

    async fn update(&self, path: DocPath, fields: Fields) -> StoreResult<()> {
        let mut commit = Commit::new();
        commit.update(path, fields);
        self.commit(commit).await
    }

    async fn delete(&self, path: DocPath) -> StoreResult<()> {
        let mut commit = Commit::new();
        commit.delete(path);
        self.commit(commit).await
    }

    /// Deletes all `paths` in one atomic commit.
    async fn batch_delete(&self, paths: Vec<DocPath>) -> StoreResult<()> {
        let mut commit = Commit::new();
        for path in paths {
            commit.delete(path);
        }
        self.commit(commit).await
    }
}

/// Checks that `current` matches what the transaction observed.
pub(crate) fn check_precondition(
    precondition: &Precondition,
    current: Option<u64>,
) -> StoreResult<()> {
    if precondition.version == current {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            path: precondition.path.to_string(),
        })
    }
}

/// Computes the result of applying `write` to `existing`. `None` means the document is deleted.
pub(crate) fn apply_write(
    existing: Option<&Document>,
    write: &Write,
) -> StoreResult<Option<Document>> {
    let next_version = existing.map(|d| d.version + 1).unwrap_or(1);
    match write {
        Write::Create { path, data } => match existing {
            Some(_) => Err(StoreError::AlreadyExists {
                path: path.to_string(),
            }),
            None => Ok(Some(Document::new(path.clone(), next_version, data.clone()))),
        },
        Write::Set { path, data } => {
            Ok(Some(Document::new(path.clone(), next_version, data.clone())))
        }
        Write::Update { path, fields } => match existing {
            None => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            Some(doc) => {
                let mut data = doc.data.clone();
                for (k, v) in fields {
                    data.insert(k.clone(), v.clone());
                }
                Ok(Some(Document::new(path.clone(), next_version, data)))
            }
        },
        Write::Delete { .. } => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Fields {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_doc_path_round_trip() {
        let path = DocPath::from_str("goals/abc").unwrap();
        assert_eq!(path.collection(), "goals");
        assert_eq!(path.id(), "abc");
        assert_eq!(path.to_string(), "goals/abc");
        assert!(DocPath::from_str("goals").is_err());
        assert!(DocPath::from_str("goals/").is_err());
        assert!(DocPath::from_str("a/b/c").is_err());
    }

    #[test]
    fn test_apply_update_merges_and_bumps_version() {
        let path = DocPath::new("goals", "g1");
        let doc = Document::new(path.clone(), 3, fields(json!({"name": "Trip", "n": 1})));
        let write = Write::Update {
            path,
            fields: fields(json!({"n": 2})),
        };
        let updated = apply_write(Some(&doc), &write).unwrap().unwrap();
        assert_eq!(updated.version(), 4);
        assert_eq!(updated.field("name"), Some(&json!("Trip")));
        assert_eq!(updated.field("n"), Some(&json!(2)));
    }

    #[test]
    fn test_apply_create_and_update_edge_cases() {
        let path = DocPath::new("goals", "g1");
        let create = Write::Create {
            path: path.clone(),
            data: Fields::new(),
        };
        let created = apply_write(None, &create).unwrap().unwrap();
        assert_eq!(created.version(), 1);
        assert!(matches!(
            apply_write(Some(&created), &create),
            Err(StoreError::AlreadyExists { .. })
        ));

        let update = Write::Update {
            path: path.clone(),
            fields: Fields::new(),
        };
        assert!(matches!(
            apply_write(None, &update),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(apply_write(None, &Write::Delete { path }).unwrap(), None);
    }

    #[test]
    fn test_precondition() {
        let p = Precondition {
            path: DocPath::new("goals", "g1"),
            version: Some(2),
        };
        assert!(check_precondition(&p, Some(2)).is_ok());
        assert!(matches!(
            check_precondition(&p, Some(3)),
            Err(StoreError::Conflict { .. })
        ));
        assert!(check_precondition(&p, None).is_err());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Update.to_string(), "update");
        assert_eq!(Operation::from_str("list").unwrap(), Operation::List);
    }
}
