//! Savings goals: CRUD, a live view, and (in `transfer`) moving money between a goal and the
//! ledger.

mod transfer;

pub use transfer::{transfer, Direction, TransferReceipt};

use crate::context::AppContext;
use crate::error::{Error, ErrorType, Result};
use crate::model::{Amount, Goal, GoalEdit, NewGoal, Record};
use crate::service;
use crate::store::{Commit, Operation, StoreError};
use crate::sync::{self, SortOrder, SubscriptionHandle};
use crate::utils;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

fn check_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("The goal name is empty"));
    }
    Ok(name.to_string())
}

fn check_target(target: Decimal) -> Result<Decimal> {
    if target < Decimal::ZERO {
        return Err(Error::validation(format!(
            "The target amount {} is negative",
            Amount::new(target)
        )));
    }
    Ok(target)
}

/// Deadline first, then name.
fn goal_order() -> SortOrder<Goal> {
    SortOrder::ascending(|g: &Goal| g.deadline).then(SortOrder::ascending(|g: &Goal| g.name.clone()))
}

/// Creates a goal with nothing saved yet.
pub async fn create_goal(ctx: &AppContext, new: NewGoal) -> Result<Goal> {
    let goal = Goal {
        id: utils::new_id(),
        name: check_name(&new.name)?,
        target_amount: check_target(new.target_amount)?,
        current_amount: Decimal::ZERO,
        deadline: new.deadline,
        owner_id: ctx.user_id().to_string(),
    };
    let fields = goal.to_fields();
    ctx.store()
        .create(goal.path(), fields.clone())
        .await
        .map_err(|e| ctx.report_with(e, Some(Value::Object(fields))))?;
    debug!("Created goal {}", goal.id);
    Ok(goal)
}

pub async fn get_goal(ctx: &AppContext, goal_id: &str) -> Result<Goal> {
    Ok(service::load_owned::<Goal>(ctx, goal_id).await?.0)
}

/// The user's goals, soonest deadline first.
pub async fn list_goals(ctx: &AppContext) -> Result<Vec<Goal>> {
    let mut goals = service::list::<Goal>(ctx, &service::owned::<Goal>(ctx)).await?;
    goal_order().sort(&mut goals);
    Ok(goals)
}

/// Changes the name, target or deadline of a goal. The saved amount is never touched here.
///
/// Fails with `Conflict` if the goal changed between reading and writing it.
pub async fn edit_goal(ctx: &AppContext, goal_id: &str, edit: GoalEdit) -> Result<Goal> {
    if edit.is_empty() {
        return Err(Error::validation("Nothing to change"));
    }
    let edit = GoalEdit {
        name: edit.name.as_deref().map(check_name).transpose()?,
        target_amount: edit.target_amount.map(check_target).transpose()?,
        deadline: edit.deadline,
    };

    let (mut goal, version) = service::load_owned::<Goal>(ctx, goal_id).await?;
    let fields = edit.to_fields();
    let mut commit = Commit::new();
    commit
        .expect_version(goal.path(), Some(version))
        .update(goal.path(), fields.clone());
    ctx.store()
        .commit(commit)
        .await
        .map_err(|e| ctx.report_with(e, Some(Value::Object(fields))))?;

    if let Some(name) = edit.name {
        goal.name = name;
    }
    if let Some(target) = edit.target_amount {
        goal.target_amount = target;
    }
    if let Some(deadline) = edit.deadline {
        goal.deadline = deadline;
    }
    Ok(goal)
}

/// Deletes a goal. Only an empty goal can be deleted; withdraw what it holds first.
pub async fn delete_goal(ctx: &AppContext, goal_id: &str) -> Result<()> {
    let (goal, version) = service::load_owned::<Goal>(ctx, goal_id).await?;
    if !goal.current_amount.is_zero() {
        return Err(Error::validation(format!(
            "Goal '{}' still holds {}, withdraw it before deleting the goal",
            goal.name,
            Amount::new(goal.current_amount)
        ))
        .with_context(goal.path().to_string(), Operation::Delete));
    }
    let mut commit = Commit::new();
    commit
        .expect_version(goal.path(), Some(version))
        .delete(goal.path());
    match ctx.store().commit(commit).await {
        Ok(()) => {
            debug!("Deleted goal {}", goal.id);
            Ok(())
        }
        // Someone deposited or edited in between; the balance must be checked again.
        Err(e @ StoreError::Conflict { .. }) => Err(Error::new(ErrorType::Conflict, e)
            .context_msg(format!("Goal '{}' changed while deleting it", goal.name))
            .with_context(goal.path().to_string(), Operation::Delete)),
        Err(e) => Err(ctx.report(e)),
    }
}

/// A live, deadline-ordered view of the user's goals.
pub async fn watch_goals(ctx: &AppContext) -> SubscriptionHandle<Goal> {
    sync::subscribe(
        ctx.store().clone(),
        service::owned::<Goal>(ctx),
        goal_order(),
        ctx.faults().clone(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test::memory_context;
    use chrono::NaiveDate;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_goal(name: &str, target: i64, deadline: NaiveDate) -> NewGoal {
        NewGoal {
            name: name.into(),
            target_amount: Decimal::from(target),
            deadline,
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let (ctx, _store, _faults) = memory_context("u1");
        let later = create_goal(&ctx, new_goal(" Car ", 5000, date(2027, 1, 1)))
            .await
            .unwrap();
        let sooner = create_goal(&ctx, new_goal("Trip", 800, date(2026, 7, 1)))
            .await
            .unwrap();
        assert_eq!(later.name, "Car");
        assert_eq!(later.current_amount, Decimal::ZERO);

        let fetched = get_goal(&ctx, &later.id).await.unwrap();
        assert_eq!(fetched, later);

        let listed = list_goals(&ctx).await.unwrap();
        assert_eq!(listed, vec![sooner, later]);
    }

    #[tokio::test]
    async fn test_create_validates_before_writing() {
        let (ctx, store, _faults) = memory_context("u1");
        let e = create_goal(&ctx, new_goal("  ", 10, date(2026, 1, 1)))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        let e = create_goal(&ctx, new_goal("X", -10, date(2026, 1, 1)))
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert_eq!(store.count(Goal::COLLECTION), 0);
    }

    #[tokio::test]
    async fn test_other_users_goals_are_invisible() {
        let store = Arc::new(MemoryStore::new());
        let (alice, _, _) = crate::test::memory_context_on("alice", store.clone());
        let (bob, _, _) = crate::test::memory_context_on("bob", store.clone());
        let goal = create_goal(&alice, new_goal("Bike", 300, date(2026, 5, 1)))
            .await
            .unwrap();
        assert_eq!(
            get_goal(&bob, &goal.id).await.unwrap_err().error_type(),
            ErrorType::NotFound
        );
        assert!(list_goals(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_keeps_balance() {
        let (ctx, _store, _faults) = memory_context("u1");
        let goal = create_goal(&ctx, new_goal("Laptop", 1500, date(2026, 9, 1)))
            .await
            .unwrap();
        transfer(&ctx, &goal.id, Decimal::from(200), Direction::Deposit)
            .await
            .unwrap();

        let edited = edit_goal(
            &ctx,
            &goal.id,
            GoalEdit {
                name: Some("New laptop".into()),
                target_amount: Some(Decimal::from_str("1800.50").unwrap()),
                deadline: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.current_amount, Decimal::from(200));
        assert_eq!(get_goal(&ctx, &goal.id).await.unwrap(), edited);

        let e = edit_goal(&ctx, &goal.id, GoalEdit::default())
            .await
            .unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
    }

    #[tokio::test]
    async fn test_delete_requires_empty_goal() {
        let (ctx, store, _faults) = memory_context("u1");
        let goal = create_goal(&ctx, new_goal("Sofa", 900, date(2026, 4, 1)))
            .await
            .unwrap();
        transfer(&ctx, &goal.id, Decimal::from(50), Direction::Deposit)
            .await
            .unwrap();

        let e = delete_goal(&ctx, &goal.id).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert_eq!(store.count(Goal::COLLECTION), 1);

        transfer(&ctx, &goal.id, Decimal::from(50), Direction::Withdraw)
            .await
            .unwrap();
        delete_goal(&ctx, &goal.id).await.unwrap();
        assert_eq!(store.count(Goal::COLLECTION), 0);
        assert_eq!(
            delete_goal(&ctx, &goal.id).await.unwrap_err().error_type(),
            ErrorType::NotFound
        );
    }

    #[tokio::test]
    async fn test_watch_goals_follows_writes() {
        let (ctx, _store, _faults) = memory_context("u1");
        let mut view = watch_goals(&ctx).await;
        let goal = create_goal(&ctx, new_goal("Camera", 700, date(2026, 8, 1)))
            .await
            .unwrap();
        let state = tokio::time::timeout(
            Duration::from_secs(5),
            view.wait_for(|s| s.records.len() == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(state.records[0], goal);
        view.close();
    }
}
