//! Tasks: a dated to-do list with batch operations.

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::model::{NewTask, Record, Task};
use crate::service;
use crate::store::{Commit, Fields, Query, RangeOp};
use crate::sync::{self, SortOrder, SubscriptionHandle};
use crate::utils;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

/// Due date, then creation time.
fn task_order() -> SortOrder<Task> {
    SortOrder::ascending(|t: &Task| t.due_date).then(SortOrder::ascending(|t: &Task| t.created_at))
}

fn due_on(ctx: &AppContext, day: Option<NaiveDate>) -> Query {
    let query = service::owned::<Task>(ctx);
    match day {
        Some(day) => query.range("dueDate", RangeOp::Le, day.to_string()),
        None => query,
    }
}

fn build(ctx: &AppContext, new: NewTask) -> Result<Task> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::validation("The task title is empty"));
    }
    Ok(Task {
        id: utils::new_id(),
        title: title.to_string(),
        due_date: new.due_date,
        completed: false,
        created_at: Utc::now(),
        owner_id: ctx.user_id().to_string(),
    })
}

pub async fn add_task(ctx: &AppContext, new: NewTask) -> Result<Task> {
    let task = build(ctx, new)?;
    let fields = task.to_fields();
    ctx.store()
        .create(task.path(), fields.clone())
        .await
        .map_err(|e| ctx.report_with(e, Some(Value::Object(fields))))?;
    Ok(task)
}

/// Adds all `tasks` in one commit, e.g. the subtasks of an AI breakdown. Either all are added
/// or none.
pub async fn add_tasks(ctx: &AppContext, tasks: Vec<NewTask>) -> Result<Vec<Task>> {
    let tasks = tasks
        .into_iter()
        .map(|new| build(ctx, new))
        .collect::<Result<Vec<_>>>()?;
    if tasks.is_empty() {
        return Ok(tasks);
    }
    let mut commit = Commit::new();
    for task in &tasks {
        commit.create(task.path(), task.to_fields());
    }
    ctx.store()
        .commit(commit)
        .await
        .map_err(|e| ctx.report(e))?;
    debug!("Added {} tasks", tasks.len());
    Ok(tasks)
}

/// Marks a task done. Completing a completed task changes nothing.
pub async fn complete_task(ctx: &AppContext, task_id: &str) -> Result<Task> {
    let (mut task, _) = service::load_owned::<Task>(ctx, task_id).await?;
    if task.completed {
        return Ok(task);
    }
    let mut fields = Fields::new();
    fields.insert("completed".into(), Value::Bool(true));
    ctx.store()
        .update(task.path(), fields.clone())
        .await
        .map_err(|e| ctx.report_with(e, Some(Value::Object(fields))))?;
    task.completed = true;
    Ok(task)
}

/// The user's tasks, or only those due on or before `day`.
pub async fn list_tasks(ctx: &AppContext, day: Option<NaiveDate>) -> Result<Vec<Task>> {
    let mut tasks = service::list::<Task>(ctx, &due_on(ctx, day)).await?;
    task_order().sort(&mut tasks);
    Ok(tasks)
}

/// Deletes every completed task in one batch. Returns how many were deleted.
pub async fn clear_completed(ctx: &AppContext) -> Result<usize> {
    let done: Vec<_> = service::list::<Task>(ctx, &service::owned::<Task>(ctx))
        .await?
        .into_iter()
        .filter(|t| t.completed)
        .map(|t| t.path())
        .collect();
    let count = done.len();
    if count > 0 {
        ctx.store()
            .batch_delete(done)
            .await
            .map_err(|e| ctx.report(e))?;
    }
    debug!("Cleared {count} completed tasks");
    Ok(count)
}

/// A live view of the tasks due on or before `day` (all tasks without it).
pub async fn watch_tasks(ctx: &AppContext, day: Option<NaiveDate>) -> SubscriptionHandle<Task> {
    sync::subscribe(
        ctx.store().clone(),
        due_on(ctx, day),
        task_order(),
        ctx.faults().clone(),
    )
    .await
}
