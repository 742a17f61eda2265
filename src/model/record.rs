//! The boundary between raw documents and typed records.
//!
//! Every record type parses its document into a private wire struct with serde and then checks
//! the invariants serde cannot express. A document that fails either step is rejected with a
//! `SchemaError`; nothing downstream ever sees a half-valid record.

use crate::store::{DocPath, Document, Fields};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Document '{path}' failed its schema check: {reason}")]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    pub(crate) fn new(doc: &Document, reason: impl ToString) -> Self {
        Self {
            path: doc.path().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A typed record stored as one document in `COLLECTION`.
pub trait Record: Sized + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Parses and validates a raw document.
    fn from_document(doc: &Document) -> Result<Self, SchemaError>;

    /// The document fields for this record, without its id.
    fn to_fields(&self) -> Fields;

    fn id(&self) -> &str;

    /// The user the record belongs to.
    fn owner_id(&self) -> &str;

    fn path(&self) -> DocPath {
        DocPath::new(Self::COLLECTION, self.id())
    }
}

pub(crate) fn parse_wire<W>(doc: &Document) -> Result<W, SchemaError>
where
    W: DeserializeOwned,
{
    serde_json::from_value(Value::Object(doc.data().clone())).map_err(|e| SchemaError::new(doc, e))
}

pub(crate) fn wire_fields<W>(wire: &W) -> Fields
where
    W: Serialize,
{
    match serde_json::to_value(wire) {
        Ok(Value::Object(fields)) => fields,
        _ => Fields::new(),
    }
}
