use crate::model::record::{parse_wire, wire_fields, Record, SchemaError};
use crate::store::{Document, Fields};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The category written on ledger entries created by goal transfers.
pub const GOAL_TRANSFER_CATEGORY: &str = "goal-transfer";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(EntryKind);
serde_plain::derive_fromstr_from_deserialize!(EntryKind);

impl EntryKind {
    /// Gives `amount` the sign this kind carries in the ledger: positive for income, negative for
    /// expense.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            EntryKind::Income => amount.abs(),
            EntryKind::Expense => -amount.abs(),
        }
    }
}

/// One line of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category: String,
    pub owner_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerDoc {
    description: String,
    amount: Decimal,
    date: NaiveDate,
    kind: EntryKind,
    #[serde(default)]
    category: String,
    owner_id: String,
}

impl Record for LedgerEntry {
    const COLLECTION: &'static str = "ledger";

    fn from_document(doc: &Document) -> Result<Self, SchemaError> {
        let wire: LedgerDoc = parse_wire(doc)?;
        if wire.kind.signed(wire.amount) != wire.amount {
            return Err(SchemaError::new(
                doc,
                format!("amount {} has the wrong sign for a {} entry", wire.amount, wire.kind),
            ));
        }
        Ok(LedgerEntry {
            id: doc.id().to_string(),
            description: wire.description,
            amount: wire.amount,
            date: wire.date,
            kind: wire.kind,
            category: wire.category,
            owner_id: wire.owner_id,
        })
    }

    fn to_fields(&self) -> Fields {
        wire_fields(&LedgerDoc {
            description: self.description.clone(),
            amount: self.amount,
            date: self.date,
            kind: self.kind,
            category: self.category.clone(),
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

/// The user-supplied fields of a ledger entry. The sign of `amount` is ignored; the stored amount
/// takes its sign from `kind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category: String,
}

/// Totals over a set of ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    /// Sum of income entries, positive.
    pub income: Decimal,
    /// Sum of expense entries as a positive number.
    pub expense: Decimal,
    pub balance: Decimal,
    pub entries: usize,
}

impl LedgerSummary {
    /// Totals `entries`, or `None` if a total leaves the representable range.
    pub fn of<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Option<Self> {
        let mut summary = LedgerSummary::default();
        for entry in entries {
            match entry.kind {
                EntryKind::Income => summary.income = summary.income.checked_add(entry.amount)?,
                EntryKind::Expense => {
                    summary.expense = summary.expense.checked_sub(entry.amount)?
                }
            }
            summary.balance = summary.balance.checked_add(entry.amount)?;
            summary.entries += 1;
        }
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocPath;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn doc(data: Value) -> Document {
        Document::new(DocPath::new("ledger", "e1"), 1, data.as_object().unwrap().clone())
    }

    fn entry(amount: &str, kind: EntryKind) -> LedgerEntry {
        LedgerEntry {
            id: "e".into(),
            description: "d".into(),
            amount: Decimal::from_str(amount).unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            kind,
            category: String::new(),
            owner_id: "u".into(),
        }
    }

    #[test]
    fn test_signed() {
        assert_eq!(EntryKind::Expense.signed(Decimal::from(5)), Decimal::from(-5));
        assert_eq!(EntryKind::Expense.signed(Decimal::from(-5)), Decimal::from(-5));
        assert_eq!(EntryKind::Income.signed(Decimal::from(-5)), Decimal::from(5));
    }

    #[test]
    fn test_parse_defaults_category_and_checks_sign() {
        let parsed = LedgerEntry::from_document(&doc(json!({
            "description": "Coffee",
            "amount": "-3.50",
            "date": "2026-02-03",
            "kind": "expense",
            "ownerId": "u1",
        })))
        .unwrap();
        assert_eq!(parsed.category, "");
        assert_eq!(parsed.kind, EntryKind::Expense);

        let wrong_sign = doc(json!({
            "description": "Salary",
            "amount": "-100",
            "date": "2026-02-03",
            "kind": "income",
            "ownerId": "u1",
        }));
        assert!(LedgerEntry::from_document(&wrong_sign).is_err());

        let unknown_kind = doc(json!({
            "description": "x",
            "amount": "1",
            "date": "2026-02-03",
            "kind": "transfer",
            "ownerId": "u1",
        }));
        assert!(LedgerEntry::from_document(&unknown_kind).is_err());
    }

    #[test]
    fn test_summary() {
        let entries = vec![
            entry("100", EntryKind::Income),
            entry("-30.25", EntryKind::Expense),
            entry("-9.75", EntryKind::Expense),
        ];
        let summary = LedgerSummary::of(&entries).unwrap();
        assert_eq!(summary.income, Decimal::from(100));
        assert_eq!(summary.expense, Decimal::from(40));
        assert_eq!(summary.balance, Decimal::from(60));
        assert_eq!(summary.entries, 3);
    }

    #[test]
    fn test_summary_out_of_range() {
        let mut huge = entry("1", EntryKind::Income);
        huge.amount = Decimal::MAX;
        assert!(LedgerSummary::of(&[huge.clone(), huge.clone()]).is_none());

        let mut huge_expense = entry("1", EntryKind::Expense);
        huge_expense.amount = Decimal::MIN;
        assert!(LedgerSummary::of(&[huge_expense.clone(), huge_expense]).is_none());
        assert!(LedgerSummary::of(&[huge]).is_some());
    }
}
