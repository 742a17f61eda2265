use crate::context::AppContext;
use crate::error::{Error, ErrorType, Result};
use crate::model::{
    Amount, EntryKind, Goal, LedgerEntry, Record, GOAL_TRANSFER_CATEGORY,
};
use crate::service;
use crate::store::{Commit, Fields, Operation, StoreError};
use crate::utils;
use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Which way money moves between a goal and the ledger.
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
pub enum Direction {
    /// Set money aside: the goal grows and the ledger records an expense.
    Deposit,
    /// Take money back: the goal shrinks and the ledger records income.
    Withdraw,
}

serde_plain::derive_display_from_serialize!(Direction);
serde_plain::derive_fromstr_from_deserialize!(Direction);

impl Direction {
    fn entry_kind(self) -> EntryKind {
        match self {
            Direction::Deposit => EntryKind::Expense,
            Direction::Withdraw => EntryKind::Income,
        }
    }

    fn describe(self, goal_name: &str) -> String {
        match self {
            Direction::Deposit => format!("Deposit to goal '{goal_name}'"),
            Direction::Withdraw => format!("Withdrawal from goal '{goal_name}'"),
        }
    }
}

/// The goal after the transfer and the ledger entry that records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub goal: Goal,
    pub entry: LedgerEntry,
}

/// The goal's new balance, or `InsufficientBalance` if a withdraw would take it below zero.
/// A deposit past the largest representable amount fails `Validation`.
fn new_balance(current: Decimal, amount: Decimal, direction: Direction) -> Result<Decimal> {
    match direction {
        Direction::Deposit => current.checked_add(amount).ok_or_else(|| {
            Error::validation(format!(
                "Depositing {amount} into a goal holding {current} exceeds the largest \
                 supported amount"
            ))
        }),
        Direction::Withdraw if amount > current => Err(Error::msg(
            ErrorType::InsufficientBalance,
            format!(
                "Cannot withdraw {} from a goal holding {}",
                Amount::new(amount),
                Amount::new(current)
            ),
        )),
        Direction::Withdraw => Ok(current - amount),
    }
}

/// Moves `amount` between goal `goal_id` and the ledger in one atomic commit: the goal's
/// `currentAmount` changes and exactly one ledger entry is created, or nothing happens.
///
/// The goal is read and the commit is guarded by the version that was read. If another writer
/// got in first, the whole read-compute-commit is repeated against fresh state, up to the
/// context's transfer attempts, after which it fails with `Conflict`.
pub async fn transfer(
    ctx: &AppContext,
    goal_id: &str,
    amount: Decimal,
    direction: Direction,
) -> Result<TransferReceipt> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "The amount must be positive, got {}",
            Amount::new(amount)
        )));
    }
    let path = service::path_of::<Goal>(goal_id)?;

    for attempt in 1..=ctx.transfer_attempts() {
        let (mut goal, version) = service::load_owned::<Goal>(ctx, goal_id).await?;
        goal.current_amount = new_balance(goal.current_amount, amount, direction)
            .map_err(|e| e.with_context(path.to_string(), Operation::Update))?;

        let kind = direction.entry_kind();
        let entry = LedgerEntry {
            id: utils::new_id(),
            description: direction.describe(&goal.name),
            amount: kind.signed(amount),
            date: Local::now().date_naive(),
            kind,
            category: GOAL_TRANSFER_CATEGORY.to_string(),
            owner_id: ctx.user_id().to_string(),
        };

        let mut balance = Fields::new();
        balance.insert(
            "currentAmount".into(),
            Value::String(goal.current_amount.to_string()),
        );
        let mut commit = Commit::new();
        commit
            .expect_version(goal.path(), Some(version))
            .update(goal.path(), balance.clone())
            .create(entry.path(), entry.to_fields());

        match ctx.store().commit(commit).await {
            Ok(()) => {
                info!(
                    "{direction} of {} on goal {}, balance now {}",
                    Amount::new(amount),
                    goal.id,
                    Amount::new(goal.current_amount)
                );
                return Ok(TransferReceipt { goal, entry });
            }
            Err(StoreError::Conflict { .. }) => {
                debug!("Goal {} changed during transfer attempt {attempt}, retrying", goal.id);
            }
            Err(e) => return Err(ctx.report_with(e, Some(Value::Object(balance)))),
        }
    }

    Err(Error::msg(
        ErrorType::Conflict,
        format!(
            "Goal '{goal_id}' kept changing, gave up after {} attempts",
            ctx.transfer_attempts()
        ),
    )
    .with_context(path.to_string(), Operation::Update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::PERMISSION_ERROR;
    use crate::goals::{create_goal, get_goal};
    use crate::model::NewGoal;
    use crate::store::{
        Commit, DocPath, Document, DocumentStore, Listener, ListenerId, MemoryStore, Query,
        StoreResult,
    };
    use crate::test::{memory_context, memory_context_on, TestEnv};
    use crate::Mode;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn goal_with(ctx: &AppContext, balance: &str) -> Goal {
        let goal = create_goal(
            ctx,
            NewGoal {
                name: "Emergency fund".into(),
                target_amount: Decimal::from(1000),
                deadline: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            },
        )
        .await
        .unwrap();
        if dec(balance) > Decimal::ZERO {
            transfer(ctx, &goal.id, dec(balance), Direction::Deposit)
                .await
                .unwrap();
        }
        get_goal(ctx, &goal.id).await.unwrap()
    }

    async fn ledger(store: &MemoryStore) -> Vec<Document> {
        store
            .query(&Query::collection(LedgerEntry::COLLECTION))
            .await
            .unwrap()
    }

    #[test]
    fn test_new_balance() {
        assert_eq!(
            new_balance(dec("10"), dec("2.5"), Direction::Deposit).unwrap(),
            dec("12.5")
        );
        assert_eq!(
            new_balance(dec("10"), dec("10"), Direction::Withdraw).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            new_balance(dec("10"), dec("10.01"), Direction::Withdraw)
                .unwrap_err()
                .error_type(),
            ErrorType::InsufficientBalance
        );
        assert_eq!(
            new_balance(Decimal::MAX, Decimal::ONE, Direction::Deposit)
                .unwrap_err()
                .error_type(),
            ErrorType::Validation
        );
    }

    #[tokio::test]
    async fn test_deposit_past_largest_amount_changes_nothing() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "0").await;
        transfer(&ctx, &goal.id, Decimal::MAX, Direction::Deposit)
            .await
            .unwrap();
        let full = get_goal(&ctx, &goal.id).await.unwrap();

        let e = transfer(&ctx, &goal.id, Decimal::ONE, Direction::Deposit)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        let context = e.context().unwrap();
        assert_eq!(context.resource_path, goal.path().to_string());
        assert_eq!(context.operation, Operation::Update);
        assert_eq!(get_goal(&ctx, &goal.id).await.unwrap(), full);
        assert_eq!(ledger(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_records_one_expense() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "0").await;

        let receipt = transfer(&ctx, &goal.id, dec("125.50"), Direction::Deposit)
            .await
            .unwrap();
        assert_eq!(receipt.goal.current_amount, dec("125.50"));
        assert_eq!(receipt.entry.amount, dec("-125.50"));
        assert_eq!(receipt.entry.kind, EntryKind::Expense);
        assert_eq!(receipt.entry.category, GOAL_TRANSFER_CATEGORY);

        let entries = ledger(&store).await;
        assert_eq!(entries.len(), 1);
        let stored = LedgerEntry::from_document(&entries[0]).unwrap();
        assert_eq!(stored, receipt.entry);
        assert_eq!(get_goal(&ctx, &goal.id).await.unwrap(), receipt.goal);
    }

    #[tokio::test]
    async fn test_withdraw_records_one_income() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "300").await;

        let receipt = transfer(&ctx, &goal.id, dec("120"), Direction::Withdraw)
            .await
            .unwrap();
        assert_eq!(receipt.goal.current_amount, dec("180"));
        assert_eq!(receipt.entry.amount, dec("120"));
        assert_eq!(receipt.entry.kind, EntryKind::Income);
        assert_eq!(ledger(&store).await.len(), 2);
    }

    #[tokio::test]
    async fn test_overdraw_changes_nothing() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "40").await;
        let entries_before = ledger(&store).await;

        let e = transfer(&ctx, &goal.id, dec("40.01"), Direction::Withdraw)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::InsufficientBalance);
        assert_eq!(e.context().unwrap().resource_path, goal.path().to_string());
        assert_eq!(get_goal(&ctx, &goal.id).await.unwrap(), goal);
        assert_eq!(ledger(&store).await, entries_before);
    }

    #[tokio::test]
    async fn test_amount_must_be_positive() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "0").await;
        for amount in ["0", "-5"] {
            let e = transfer(&ctx, &goal.id, dec(amount), Direction::Deposit)
                .await
                .unwrap_err();
            assert_eq!(e.error_type(), ErrorType::Validation);
        }
        assert!(ledger(&store).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_overdrawing_withdraws() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = goal_with(&ctx, "100").await;

        let a = tokio::spawn({
            let ctx = ctx.clone();
            let id = goal.id.clone();
            async move { transfer(&ctx, &id, dec("70"), Direction::Withdraw).await }
        });
        let b = tokio::spawn({
            let ctx = ctx.clone();
            let id = goal.id.clone();
            async move { transfer(&ctx, &id, dec("60"), Direction::Withdraw).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| {
                matches!(r, Err(e) if e.error_type() == ErrorType::InsufficientBalance)
            })
            .count();
        assert_eq!((ok, short), (1, 1));

        let balance = get_goal(&ctx, &goal.id).await.unwrap().current_amount;
        assert!(balance == dec("30") || balance == dec("40"), "{balance}");
        // The initial deposit plus the one successful withdraw.
        assert_eq!(ledger(&store).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdraws_on_sqlite() {
        let env = TestEnv::new().await;
        let ctx = AppContext::open(&env.config(), Mode::Testing).await.unwrap();
        let goal = goal_with(&ctx, "100").await;

        let withdraws = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                let id = goal.id.clone();
                tokio::spawn(async move {
                    transfer(&ctx, &id, dec("30"), Direction::Withdraw).await
                })
            })
            .collect::<Vec<_>>();
        let mut results = Vec::new();
        for withdraw in withdraws {
            results.push(withdraw.await.unwrap());
        }

        let ok = results.iter().filter(|r| r.is_ok()).count();
        let short = results
            .iter()
            .filter(|r| {
                matches!(r, Err(e) if e.error_type() == ErrorType::InsufficientBalance)
            })
            .count();
        assert_eq!((ok, short), (3, 5));
        assert_eq!(
            get_goal(&ctx, &goal.id).await.unwrap().current_amount,
            dec("10")
        );
        let entries = ctx
            .store()
            .query(&Query::collection(LedgerEntry::COLLECTION))
            .await
            .unwrap();
        assert_eq!(entries.len(), 4);
        ctx.close().await;
    }

    /// Lets another writer change the goal right before the first commit lands.
    struct RacingStore {
        inner: Arc<MemoryStore>,
        raced: AtomicBool,
        goal: DocPath,
    }

    #[async_trait::async_trait]
    impl DocumentStore for RacingStore {
        async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
            self.inner.get(path).await
        }

        async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
            self.inner.query(query).await
        }

        async fn commit(&self, commit: Commit) -> StoreResult<()> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut fields = Fields::new();
                fields.insert("currentAmount".into(), json!("10"));
                self.inner.update(self.goal.clone(), fields).await?;
            }
            self.inner.commit(commit).await
        }

        async fn subscribe(&self, query: Query) -> StoreResult<Listener> {
            self.inner.subscribe(query).await
        }

        fn unsubscribe(&self, id: ListenerId) {
            self.inner.unsubscribe(id)
        }
    }

    #[tokio::test]
    async fn test_lost_race_is_rerun_on_fresh_state() {
        let (setup, store, _faults) = memory_context("u1");
        let goal = goal_with(&setup, "100").await;

        let racing = Arc::new(RacingStore {
            inner: store.clone(),
            raced: AtomicBool::new(false),
            goal: goal.path(),
        });
        let (ctx, _, _) = memory_context_on("u1", store.clone());
        let ctx = AppContext::new(
            ctx.user_id(),
            racing,
            ctx.faults().clone(),
            ctx.delegate().clone(),
        );

        // The racing writer drops the balance to 10, so the rerun must refuse 50.
        let e = transfer(&ctx, &goal.id, dec("50"), Direction::Withdraw)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::InsufficientBalance);
        assert_eq!(ledger(&store).await.len(), 1);

        let receipt = transfer(&ctx, &goal.id, dec("10"), Direction::Withdraw)
            .await
            .unwrap();
        assert_eq!(receipt.goal.current_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let (setup, store, _faults) = memory_context("u1");
        let goal = goal_with(&setup, "100").await;

        struct AlwaysStale(Arc<MemoryStore>);

        #[async_trait::async_trait]
        impl DocumentStore for AlwaysStale {
            async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
                self.0.get(path).await
            }
            async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
                self.0.query(query).await
            }
            async fn commit(&self, _commit: Commit) -> StoreResult<()> {
                Err(StoreError::Conflict {
                    path: "goals/x".into(),
                })
            }
            async fn subscribe(&self, query: Query) -> StoreResult<Listener> {
                self.0.subscribe(query).await
            }
            fn unsubscribe(&self, id: ListenerId) {
                self.0.unsubscribe(id)
            }
        }

        let ctx = AppContext::new(
            "u1",
            Arc::new(AlwaysStale(store.clone())),
            setup.faults().clone(),
            setup.delegate().clone(),
        )
        .with_transfer_attempts(3);
        let e = transfer(&ctx, &goal.id, dec("1"), Direction::Deposit)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Conflict);
        assert!(e.to_string().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_denied_write_publishes_permission_fault() {
        let (ctx, store, faults) = memory_context("u1");
        let goal = goal_with(&ctx, "20").await;
        store.deny(Goal::COLLECTION, Operation::Update);

        let e = transfer(&ctx, &goal.id, dec("5"), Direction::Deposit)
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Permission);
        let context = e.context().unwrap();
        assert_eq!(context.resource_path, goal.path().to_string());
        assert_eq!(context.operation, Operation::Update);

        let events = faults.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), PERMISSION_ERROR);
        assert_eq!(ledger(&store).await.len(), 1);
    }
}
