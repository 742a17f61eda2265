use crate::ai::{Breakdown, DailySuggestions, ProductInfo};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::Amount;
use crate::tasks;
use crate::utils;
use crate::{AppContext, Result};
use anyhow::Context;
use std::path::Path;

pub async fn ai_breakdown(ctx: &AppContext, task: &str) -> Result<Out<Breakdown>> {
    let breakdown = ctx.delegate().breakdown(task).await?;
    Ok(Out::new(
        format!("'{}' breaks down into {} steps", task.trim(), breakdown.subtasks.len()),
        breakdown,
    ))
}

pub async fn ai_product(ctx: &AppContext, url: &str) -> Result<Out<ProductInfo>> {
    let product = ctx.delegate().extract_product_info(url).await?;
    Ok(Out::new(
        format!("{} costs {}", product.name, Amount::new(product.price)),
        product,
    ))
}

/// Suggests tasks for today. Without `history`, the user's current task list is used as the
/// history.
pub async fn ai_suggest(
    ctx: &AppContext,
    history: Option<String>,
    count: Option<u32>,
) -> Result<Out<DailySuggestions>> {
    let history = match history {
        Some(history) => history,
        None => {
            let tasks = tasks::list_tasks(ctx, None).await?;
            serde_json::to_string(&tasks)
                .context("Unable to serialize the task history")
                .pub_result(ErrorType::MalformedInput)?
        }
    };
    let suggestions = ctx.delegate().suggest_daily_tasks(&history, count).await?;
    Ok(Out::new(
        format!("{} suggestions for today", suggestions.suggestions.len()),
        suggestions,
    ))
}

/// Same as `ai_suggest` with the history read from a JSON file.
pub async fn ai_suggest_from_file(
    ctx: &AppContext,
    history_file: &Path,
    count: Option<u32>,
) -> Result<Out<DailySuggestions>> {
    let history = utils::read(history_file)
        .await
        .pub_result(ErrorType::Validation)?;
    ai_suggest(ctx, Some(history), count).await
}
