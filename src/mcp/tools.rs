//! The MCP tools. Each tool converts its parameters and calls the same command handler the CLI
//! uses.

use crate::commands;
use crate::error::Error;
use crate::goals::Direction;
use crate::mcp::mcp_utils::tool_result;
use crate::mcp::PocketplanServer;
use crate::model::{decimal_from_f64, EntryKind, GoalEdit, NewGoal, NewLedgerEntry, NewTask};
use chrono::{Local, NaiveDate};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;
use rmcp::ErrorData as McpError;
use rmcp::{tool, tool_router};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// JSON clients send money as numbers.
fn money(value: f64, field: &str) -> crate::Result<Decimal> {
    decimal_from_f64(value)
        .ok_or_else(|| Error::validation(format!("'{field}' must be a finite number")))
}

fn date(value: &str, field: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        Error::validation(format!("'{field}' must be a date like 2026-05-31: {e}"))
    })
}

fn optional_date(value: Option<&str>, field: &str) -> crate::Result<Option<NaiveDate>> {
    value.map(|v| date(v, field)).transpose()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    /// The id of the document, as returned when it was created or listed.
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "CreateGoalParams")]
pub struct CreateGoalParams {
    /// What the user is saving for.
    pub name: String,
    /// The amount to save. Must not be negative.
    pub target_amount: f64,
    /// The deadline as YYYY-MM-DD.
    pub deadline: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "EditGoalParams")]
pub struct EditGoalParams {
    /// The goal to change.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_amount: Option<f64>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "TransferParams")]
pub struct TransferParams {
    pub goal_id: String,
    /// A positive amount.
    pub amount: f64,
    /// 'deposit' moves money from the ledger into the goal, 'withdraw' moves it back.
    pub direction: Direction,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "AddLedgerEntryParams")]
pub struct AddLedgerEntryParams {
    pub description: String,
    /// The amount. Its sign is ignored and taken from `kind`.
    pub amount: f64,
    pub kind: EntryKind,
    /// YYYY-MM-DD, defaults to today.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SinceParams {
    /// Only entries dated on or after this day (YYYY-MM-DD).
    #[serde(default)]
    pub since: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "AddTaskParams")]
pub struct AddTaskParams {
    pub title: String,
    /// YYYY-MM-DD, defaults to today.
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DueParams {
    /// Only tasks due on or before this day (YYYY-MM-DD).
    #[serde(default)]
    pub due: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "BreakdownTaskParams")]
pub struct BreakdownTaskParams {
    /// The task to break down.
    pub task: String,
    /// Add the subtasks to the task list instead of only returning them.
    #[serde(default)]
    pub add_subtasks: bool,
    /// Due date of the added subtasks (YYYY-MM-DD), defaults to today.
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductParams {
    /// An http or https product page URL.
    pub url: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestParams {
    /// Earlier tasks as a JSON string. Defaults to the user's current task list.
    #[serde(default)]
    pub historical_tasks: Option<String>,
    /// How many suggestions, at least 1. Defaults to 3.
    #[serde(default)]
    pub count: Option<u32>,
}

#[tool_router(vis = "pub(super)")]
impl PocketplanServer {
    #[tool]
    /// Initialize the pocketplan MCP service for this session and return usage instructions. You
    /// **MUST** call this **ONCE** before using other tools so that you have the full usage
    /// instructions. You **MAY** call it more than once if you have forgotten the usage
    /// instructions.
    async fn initialize_service(&self) -> Result<CallToolResult, McpError> {
        let mut initialized = self.initialized.lock().await;
        *initialized = true;
        Ok(CallToolResult::success(vec![rmcp::model::Content::text(
            include_str!("docs/INSTRUCTIONS.md"),
        )]))
    }

    /// Create a savings goal. It starts with nothing saved; use `transfer` to put money in.
    #[tool]
    async fn create_goal(
        &self,
        Parameters(params): Parameters<CreateGoalParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: create_goal called");
        let out = async {
            let new = NewGoal {
                name: params.name,
                target_amount: money(params.target_amount, "targetAmount")?,
                deadline: date(&params.deadline, "deadline")?,
            };
            commands::goal_create(&self.ctx, new).await
        }
        .await;
        tool_result(out)
    }

    /// List the user's goals, soonest deadline first.
    #[tool]
    async fn list_goals(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        tool_result(commands::goal_list(&self.ctx).await)
    }

    /// Get one goal with its saved amount.
    #[tool]
    async fn get_goal(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        tool_result(commands::goal_get(&self.ctx, &params.id).await)
    }

    /// Change a goal's name, target amount or deadline. The saved amount can only change through
    /// `transfer`. Fails with a conflict if the goal changed at the same time; read it and retry.
    #[tool]
    async fn edit_goal(
        &self,
        Parameters(params): Parameters<EditGoalParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: edit_goal called for {}", params.id);
        let out = async {
            let edit = GoalEdit {
                name: params.name,
                target_amount: params
                    .target_amount
                    .map(|t| money(t, "targetAmount"))
                    .transpose()?,
                deadline: optional_date(params.deadline.as_deref(), "deadline")?,
            };
            commands::goal_edit(&self.ctx, &params.id, edit).await
        }
        .await;
        tool_result(out)
    }

    /// Delete a goal. Only a goal holding nothing can be deleted; withdraw its money first.
    #[tool]
    async fn delete_goal(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: delete_goal called for {}", params.id);
        tool_result(commands::goal_delete(&self.ctx, &params.id).await)
    }

    /// Move money between a goal and the ledger in one atomic step.
    ///
    /// A deposit adds `amount` to the goal and records an expense of `amount` in the ledger. A
    /// withdraw takes it out of the goal and records income. Both entries use the category
    /// `goal-transfer`. A withdraw larger than the goal's saved amount fails and changes nothing.
    /// Concurrent transfers on the same goal are retried, so money is never lost or double-spent.
    #[tool]
    async fn transfer(
        &self,
        Parameters(params): Parameters<TransferParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!(
            "MCP: transfer called with direction={} for {}",
            params.direction, params.goal_id
        );
        let out = async {
            let amount = money(params.amount, "amount")?;
            commands::goal_transfer(&self.ctx, &params.goal_id, amount, params.direction).await
        }
        .await;
        tool_result(out)
    }

    /// Record an income or expense in the ledger.
    #[tool]
    async fn add_ledger_entry(
        &self,
        Parameters(params): Parameters<AddLedgerEntryParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: add_ledger_entry called");
        let out = async {
            let new = NewLedgerEntry {
                description: params.description,
                amount: money(params.amount, "amount")?,
                date: optional_date(params.date.as_deref(), "date")?.unwrap_or_else(today),
                kind: params.kind,
                category: params.category.unwrap_or_default(),
            };
            commands::ledger_add(&self.ctx, new).await
        }
        .await;
        tool_result(out)
    }

    /// List ledger entries, newest first. Expenses have negative amounts.
    #[tool]
    async fn list_ledger_entries(
        &self,
        Parameters(params): Parameters<SinceParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let out = async {
            let since = optional_date(params.since.as_deref(), "since")?;
            commands::ledger_list(&self.ctx, since).await
        }
        .await;
        tool_result(out)
    }

    /// Delete a ledger entry.
    #[tool]
    async fn delete_ledger_entry(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: delete_ledger_entry called for {}", params.id);
        tool_result(commands::ledger_delete(&self.ctx, &params.id).await)
    }

    /// Total income, total expense (as a positive number) and the balance.
    #[tool]
    async fn ledger_summary(
        &self,
        Parameters(params): Parameters<SinceParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let out = async {
            let since = optional_date(params.since.as_deref(), "since")?;
            commands::ledger_summary(&self.ctx, since).await
        }
        .await;
        tool_result(out)
    }

    /// Add a task to the to-do list.
    #[tool]
    async fn add_task(
        &self,
        Parameters(params): Parameters<AddTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let out = async {
            let new = NewTask {
                title: params.title,
                due_date: optional_date(params.due_date.as_deref(), "dueDate")?
                    .unwrap_or_else(today),
            };
            commands::task_add(&self.ctx, new).await
        }
        .await;
        tool_result(out)
    }

    /// List tasks by due date, optionally only those due on or before `due`.
    #[tool]
    async fn list_tasks(
        &self,
        Parameters(params): Parameters<DueParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        let out = async {
            let due = optional_date(params.due.as_deref(), "due")?;
            commands::task_list(&self.ctx, due).await
        }
        .await;
        tool_result(out)
    }

    /// Mark a task as done.
    #[tool]
    async fn complete_task(
        &self,
        Parameters(params): Parameters<IdParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        tool_result(commands::task_complete(&self.ctx, &params.id).await)
    }

    /// Delete every completed task in one batch.
    #[tool]
    async fn clear_completed_tasks(&self) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: clear_completed_tasks called");
        tool_result(commands::task_clear(&self.ctx).await)
    }

    /// Break a task into ordered subtasks with the AI helper. With `addSubtasks`, the subtasks
    /// are also added to the task list in one step.
    #[tool]
    async fn breakdown_task(
        &self,
        Parameters(params): Parameters<BreakdownTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: breakdown_task called, add_subtasks={}", params.add_subtasks);
        if !params.add_subtasks {
            return tool_result(commands::ai_breakdown(&self.ctx, &params.task).await);
        }
        let out = async {
            let due = optional_date(params.due_date.as_deref(), "dueDate")?.unwrap_or_else(today);
            commands::task_breakdown(&self.ctx, &params.task, due).await
        }
        .await;
        tool_result(out)
    }

    /// Read the product name, price and main image URL from a product page.
    #[tool]
    async fn extract_product_info(
        &self,
        Parameters(params): Parameters<ProductParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: extract_product_info called");
        tool_result(commands::ai_product(&self.ctx, &params.url).await)
    }

    /// Suggest tasks for today from earlier tasks.
    #[tool]
    async fn suggest_daily_tasks(
        &self,
        Parameters(params): Parameters<SuggestParams>,
    ) -> Result<CallToolResult, McpError> {
        require_init!(self);
        info!("MCP: suggest_daily_tasks called");
        tool_result(commands::ai_suggest(&self.ctx, params.historical_tasks, params.count).await)
    }
}
