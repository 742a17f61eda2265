//! The ledger: income and expense entries, newest first.

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::model::{LedgerEntry, LedgerSummary, NewLedgerEntry, Record};
use crate::service;
use crate::store::{Query, RangeOp};
use crate::sync::{self, SortOrder, SubscriptionHandle};
use crate::utils;
use chrono::NaiveDate;
use serde_json::Value;

fn entry_order() -> SortOrder<LedgerEntry> {
    SortOrder::descending(|e: &LedgerEntry| e.date)
}

fn entries_since(ctx: &AppContext, since: Option<NaiveDate>) -> Query {
    let query = service::owned::<LedgerEntry>(ctx);
    match since {
        Some(day) => query.range("date", RangeOp::Ge, day.to_string()),
        None => query,
    }
}

/// Records an entry. The stored amount takes its sign from the entry's kind.
pub async fn add_entry(ctx: &AppContext, new: NewLedgerEntry) -> Result<LedgerEntry> {
    let description = new.description.trim();
    if description.is_empty() {
        return Err(Error::validation("The description is empty"));
    }
    if new.amount.is_zero() {
        return Err(Error::validation("The amount must not be zero"));
    }
    let entry = LedgerEntry {
        id: utils::new_id(),
        description: description.to_string(),
        amount: new.kind.signed(new.amount),
        date: new.date,
        kind: new.kind,
        category: new.category.trim().to_string(),
        owner_id: ctx.user_id().to_string(),
    };
    let fields = entry.to_fields();
    ctx.store()
        .create(entry.path(), fields.clone())
        .await
        .map_err(|e| ctx.report_with(e, Some(Value::Object(fields))))?;
    Ok(entry)
}

/// Entries dated on or after `since` (all entries without it), newest first.
pub async fn list_entries(ctx: &AppContext, since: Option<NaiveDate>) -> Result<Vec<LedgerEntry>> {
    let mut entries = service::list::<LedgerEntry>(ctx, &entries_since(ctx, since)).await?;
    entry_order().sort(&mut entries);
    Ok(entries)
}

pub async fn delete_entry(ctx: &AppContext, entry_id: &str) -> Result<()> {
    let (entry, _) = service::load_owned::<LedgerEntry>(ctx, entry_id).await?;
    ctx.store()
        .delete(entry.path())
        .await
        .map_err(|e| ctx.report(e))
}

/// Income, expense and balance over the entries dated on or after `since`.
pub async fn summary(ctx: &AppContext, since: Option<NaiveDate>) -> Result<LedgerSummary> {
    let entries = service::list::<LedgerEntry>(ctx, &entries_since(ctx, since)).await?;
    LedgerSummary::of(&entries).ok_or_else(|| {
        Error::validation("The ledger totals exceed the largest supported amount")
    })
}

/// A live, newest-first view of the entries dated on or after `since`.
pub async fn watch_entries(
    ctx: &AppContext,
    since: Option<NaiveDate>,
) -> SubscriptionHandle<LedgerEntry> {
    sync::subscribe(
        ctx.store().clone(),
        entries_since(ctx, since),
        entry_order(),
        ctx.faults().clone(),
    )
    .await
}
