use crate::model::record::{parse_wire, wire_fields, Record, SchemaError};
use crate::store::{Document, Fields};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named savings target.
///
/// `current_amount` changes only through a goal transfer; edits of the other fields never touch
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: NaiveDate,
    pub owner_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalDoc {
    name: String,
    target_amount: Decimal,
    current_amount: Decimal,
    deadline: NaiveDate,
    owner_id: String,
}

impl Goal {
    /// The share of the target already saved, in percent. A zero target counts as reached. A
    /// share too large to represent saturates at `Decimal::MAX`.
    pub fn progress_percent(&self) -> Decimal {
        if self.target_amount.is_zero() {
            return Decimal::ONE_HUNDRED;
        }
        self.current_amount
            .checked_div(self.target_amount)
            .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
            .map(|percent| percent.round_dp(1))
            .unwrap_or(Decimal::MAX)
    }

    /// What is still missing to reach the target; zero once it is reached.
    pub fn remaining(&self) -> Decimal {
        (self.target_amount - self.current_amount).max(Decimal::ZERO)
    }
}

impl Record for Goal {
    const COLLECTION: &'static str = "goals";

    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        let wire: GoalDoc = parse_wire(doc)?;
        if wire.name.trim().is_empty() {
            return Err(SchemaError::new(doc, "name is empty"));
        }
        if wire.target_amount.is_sign_negative() && !wire.target_amount.is_zero() {
            return Err(SchemaError::new(doc, "targetAmount is negative"));
        }
        if wire.current_amount.is_sign_negative() && !wire.current_amount.is_zero() {
            return Err(SchemaError::new(doc, "currentAmount is negative"));
        }
        Ok(Goal {
            id: doc.id().to_string(),
            name: wire.name,
            target_amount: wire.target_amount,
            current_amount: wire.current_amount,
            deadline: wire.deadline,
            owner_id: wire.owner_id,
        })
    }

    fn to_fields(&self) -> Fields {
        wire_fields(&GoalDoc {
            name: self.name.clone(),
            target_amount: self.target_amount,
            current_amount: self.current_amount,
            deadline: self.deadline,
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

/// The user-supplied fields of a new goal. A new goal starts with nothing saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: Decimal,
    pub deadline: NaiveDate,
}

/// Changes to a goal. `None` leaves a field as it is. There is deliberately no way to set the
/// current amount here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalEdit {
    pub name: Option<String>,
    pub target_amount: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

impl GoalEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.target_amount.is_none() && self.deadline.is_none()
    }

    pub(crate) fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = &self.name {
            fields.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(target) = &self.target_amount {
            fields.insert("targetAmount".into(), Value::String(target.to_string()));
        }
        if let Some(deadline) = &self.deadline {
            fields.insert("deadline".into(), Value::String(deadline.to_string()));
        }
        fields
    }
}
