use crate::model::record::{parse_wire, wire_fields, Record, SchemaError};
use crate::store::{Document, Fields};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A to-do item due on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDoc {
    title: String,
    due_date: NaiveDate,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
    owner_id: String,
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        let wire: TaskDoc = parse_wire(doc)?;
        if wire.title.trim().is_empty() {
            return Err(SchemaError::new(doc, "title is empty"));
        }
        Ok(Task {
            id: doc.id().to_string(),
            title: wire.title,
            due_date: wire.due_date,
            completed: wire.completed,
            created_at: wire.created_at,
            owner_id: wire.owner_id,
        })
    }

    fn to_fields(&self) -> Fields {
        wire_fields(&TaskDoc {
            title: self.title.clone(),
            due_date: self.due_date,
            completed: self.completed,
            created_at: self.created_at,
            owner_id: self.owner_id.clone(),
        })
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub due_date: NaiveDate,
}
