use crate::commands::{plural, Out};
use crate::model::{NewTask, Task};
use crate::tasks;
use crate::{AppContext, Result};
use chrono::NaiveDate;

pub async fn task_add(ctx: &AppContext, new: NewTask) -> Result<Out<Task>> {
    let task = tasks::add_task(ctx, new).await?;
    Ok(Out::new(
        format!("Added '{}' due {}", task.title, task.due_date),
        task,
    ))
}

pub async fn task_list(ctx: &AppContext, due: Option<NaiveDate>) -> Result<Out<Vec<Task>>> {
    let tasks = tasks::list_tasks(ctx, due).await?;
    let open = tasks.iter().filter(|t| !t.completed).count();
    Ok(Out::new(
        format!(
            "Found {}, {open} still open",
            plural(tasks.len(), "task", "tasks")
        ),
        tasks,
    ))
}

pub async fn task_complete(ctx: &AppContext, task_id: &str) -> Result<Out<Task>> {
    let task = tasks::complete_task(ctx, task_id).await?;
    Ok(Out::new(format!("Completed '{}'", task.title), task))
}

pub async fn task_clear(ctx: &AppContext) -> Result<Out<usize>> {
    let count = tasks::clear_completed(ctx).await?;
    Ok(Out::new(
        format!("Deleted {}", plural(count, "completed task", "completed tasks")),
        count,
    ))
}

/// Asks the AI delegate to break `title` into subtasks and adds them all, due on `due`.
pub async fn task_breakdown(
    ctx: &AppContext,
    title: &str,
    due: NaiveDate,
) -> Result<Out<Vec<Task>>> {
    let breakdown = ctx.delegate().breakdown(title).await?;
    let new_tasks = breakdown
        .subtasks
        .into_iter()
        .map(|subtask| NewTask {
            title: subtask,
            due_date: due,
        })
        .collect();
    let added = tasks::add_tasks(ctx, new_tasks).await?;
    Ok(Out::new(
        format!(
            "Added {} for '{}'",
            plural(added.len(), "subtask", "subtasks"),
            title.trim()
        ),
        added,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{CannedClient, Delegate, BREAKDOWN};
    use crate::error::ErrorType;
    use crate::fault::RecordingFaultSink;
    use crate::model::Record;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[tokio::test]
    async fn test_breakdown_adds_subtasks() {
        let canned = CannedClient::new().with_response(
            BREAKDOWN,
            json!({"subtasks": ["Empty the shelves", "Sweep", "Put things back"]}),
        );
        let store = Arc::new(MemoryStore::new());
        let ctx = AppContext::new(
            "u1",
            store.clone(),
            Arc::new(RecordingFaultSink::new()),
            Delegate::new(Arc::new(canned.clone())),
        );

        let out = task_breakdown(&ctx, " Clean the garage ", day()).await.unwrap();
        assert_eq!(out.message(), "Added 3 subtasks for 'Clean the garage'");
        assert_eq!(canned.calls(), 1);

        let listed = task_list(&ctx, None).await.unwrap();
        assert_eq!(listed.message(), "Found 3 tasks, 3 still open");
        let titles: Vec<_> = listed
            .structure()
            .unwrap()
            .iter()
            .map(|t| t.title.clone())
            .collect();
        assert!(titles.contains(&"Sweep".to_string()));
    }

    #[tokio::test]
    async fn test_breakdown_of_blank_task_adds_nothing() {
        let canned = CannedClient::new();
        let store = Arc::new(MemoryStore::new());
        let ctx = AppContext::new(
            "u1",
            store.clone(),
            Arc::new(RecordingFaultSink::new()),
            Delegate::new(Arc::new(canned.clone())),
        );
        let e = task_breakdown(&ctx, "   ", day()).await.unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);
        assert_eq!(canned.calls(), 0);
        assert_eq!(store.count(Task::COLLECTION), 0);
    }
}
