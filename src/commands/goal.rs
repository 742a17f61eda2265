use crate::commands::{plural, Out};
use crate::goals::{self, Direction, TransferReceipt};
use crate::model::{Amount, Goal, GoalEdit, NewGoal};
use crate::{AppContext, Result};
use rust_decimal::Decimal;

pub async fn goal_create(ctx: &AppContext, new: NewGoal) -> Result<Out<Goal>> {
    let goal = goals::create_goal(ctx, new).await?;
    Ok(Out::new(
        format!(
            "Created goal '{}' ({}) saving {} by {}",
            goal.name,
            goal.id,
            Amount::new(goal.target_amount),
            goal.deadline
        ),
        goal,
    ))
}

pub async fn goal_list(ctx: &AppContext) -> Result<Out<Vec<Goal>>> {
    let goals = goals::list_goals(ctx).await?;
    Ok(Out::new(format!("Found {}", plural(goals.len(), "goal", "goals")), goals))
}

pub async fn goal_get(ctx: &AppContext, goal_id: &str) -> Result<Out<Goal>> {
    let goal = goals::get_goal(ctx, goal_id).await?;
    Ok(Out::new(
        format!(
            "Goal '{}' holds {} of {} ({}%)",
            goal.name,
            Amount::new(goal.current_amount),
            Amount::new(goal.target_amount),
            goal.progress_percent().normalize()
        ),
        goal,
    ))
}

pub async fn goal_edit(ctx: &AppContext, goal_id: &str, edit: GoalEdit) -> Result<Out<Goal>> {
    let goal = goals::edit_goal(ctx, goal_id, edit).await?;
    Ok(Out::new(format!("Updated goal '{}'", goal.name), goal))
}

pub async fn goal_delete(ctx: &AppContext, goal_id: &str) -> Result<Out<()>> {
    goals::delete_goal(ctx, goal_id).await?;
    Ok(format!("Deleted goal {goal_id}").into())
}

pub async fn goal_transfer(
    ctx: &AppContext,
    goal_id: &str,
    amount: Decimal,
    direction: Direction,
) -> Result<Out<TransferReceipt>> {
    let receipt = goals::transfer(ctx, goal_id, amount, direction).await?;
    let verb = match direction {
        Direction::Deposit => "Deposited",
        Direction::Withdraw => "Withdrew",
    };
    Ok(Out::new(
        format!(
            "{verb} {}, goal '{}' now holds {}",
            Amount::new(amount),
            receipt.goal.name,
            Amount::new(receipt.goal.current_amount)
        ),
        receipt,
    ))
}
