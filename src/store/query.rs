//! Queries: an owner equality match on one collection, optionally narrowed by one range condition.

use crate::store::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// The field every owned document carries.
pub const OWNER_FIELD: &str = "ownerId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl RangeOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            RangeOp::Lt => ordering == Ordering::Less,
            RangeOp::Le => ordering != Ordering::Greater,
            RangeOp::Gt => ordering == Ordering::Greater,
            RangeOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    pub field: String,
    pub op: RangeOp,
    pub value: Value,
}

/// A filtered view of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    owner: Option<String>,
    range: Option<RangeFilter>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            owner: None,
            range: None,
        }
    }

    /// Only documents whose `ownerId` equals `owner`.
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Adds the range condition. A query holds at most one; a second call replaces the first.
    pub fn range(mut self, field: impl Into<String>, op: RangeOp, value: impl Into<Value>) -> Self {
        self.range = Some(RangeFilter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn range_filter(&self) -> Option<&RangeFilter> {
        self.range.as_ref()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if doc.path().collection() != self.collection {
            return false;
        }
        if let Some(owner) = &self.owner {
            if doc.field(OWNER_FIELD).and_then(Value::as_str) != Some(owner.as_str()) {
                return false;
            }
        }
        match &self.range {
            None => true,
            Some(range) => doc
                .field(&range.field)
                .and_then(|v| compare(v, &range.value))
                .map(|ordering| range.op.accepts(ordering))
                .unwrap_or(false),
        }
    }
}

/// Numbers compare numerically and strings lexically (ISO dates sort correctly as strings).
/// Values of different kinds are not comparable, so such documents never match a range.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocPath;
    use serde_json::json;

    fn doc(collection: &str, data: Value) -> Document {
        Document::new(
            DocPath::new(collection, "x"),
            1,
            data.as_object().unwrap().clone(),
        )
    }

    #[test]
    fn test_owner_match() {
        let q = Query::collection("goals").owned_by("u1");
        assert!(q.matches(&doc("goals", json!({"ownerId": "u1"}))));
        assert!(!q.matches(&doc("goals", json!({"ownerId": "u2"}))));
        assert!(!q.matches(&doc("goals", json!({}))));
        assert!(!q.matches(&doc("tasks", json!({"ownerId": "u1"}))));
    }

    #[test]
    fn test_range_on_dates() {
        let q = Query::collection("ledger")
            .owned_by("u1")
            .range("date", RangeOp::Ge, "2025-03-01");
        assert!(q.matches(&doc("ledger", json!({"ownerId": "u1", "date": "2025-03-01"}))));
        assert!(q.matches(&doc("ledger", json!({"ownerId": "u1", "date": "2025-04-15"}))));
        assert!(!q.matches(&doc("ledger", json!({"ownerId": "u1", "date": "2025-02-28"}))));
        assert!(!q.matches(&doc("ledger", json!({"ownerId": "u1"}))));
    }

    #[test]
    fn test_range_on_numbers_and_mismatched_kinds() {
        let q = Query::collection("c").range("n", RangeOp::Lt, 10);
        assert!(q.matches(&doc("c", json!({"n": 9.5}))));
        assert!(!q.matches(&doc("c", json!({"n": 10}))));
        assert!(!q.matches(&doc("c", json!({"n": "9"}))));
    }

    #[test]
    fn test_second_range_replaces_first() {
        let q = Query::collection("c")
            .range("a", RangeOp::Gt, 1)
            .range("b", RangeOp::Lt, 5);
        assert_eq!(q.range_filter().unwrap().field, "b");
    }
}
