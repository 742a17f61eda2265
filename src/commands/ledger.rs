use crate::commands::{plural, Out};
use crate::ledger;
use crate::model::{Amount, LedgerEntry, LedgerSummary, NewLedgerEntry};
use crate::{AppContext, Result};
use chrono::NaiveDate;

pub async fn ledger_add(ctx: &AppContext, new: NewLedgerEntry) -> Result<Out<LedgerEntry>> {
    let entry = ledger::add_entry(ctx, new).await?;
    Ok(Out::new(
        format!(
            "Recorded {} {} for '{}' on {}",
            entry.kind,
            Amount::new(entry.amount),
            entry.description,
            entry.date
        ),
        entry,
    ))
}

pub async fn ledger_list(
    ctx: &AppContext,
    since: Option<NaiveDate>,
) -> Result<Out<Vec<LedgerEntry>>> {
    let entries = ledger::list_entries(ctx, since).await?;
    Ok(Out::new(
        format!("Found {}", plural(entries.len(), "entry", "entries")),
        entries,
    ))
}

pub async fn ledger_delete(ctx: &AppContext, entry_id: &str) -> Result<Out<()>> {
    ledger::delete_entry(ctx, entry_id).await?;
    Ok(format!("Deleted ledger entry {entry_id}").into())
}

pub async fn ledger_summary(
    ctx: &AppContext,
    since: Option<NaiveDate>,
) -> Result<Out<LedgerSummary>> {
    let summary = ledger::summary(ctx, since).await?;
    Ok(Out::new(
        format!(
            "Income {}, expense {}, balance {}",
            Amount::new(summary.income),
            Amount::new(summary.expense),
            Amount::new(summary.balance)
        ),
        summary,
    ))
}
