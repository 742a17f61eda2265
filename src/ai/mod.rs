//! The AI task delegate.
//!
//! Each operation validates its input, renders a prompt, asks the completion service for JSON
//! matching the output's schema, and validates what comes back. Input problems are reported
//! before any call is made. There are no retries: an upstream failure is returned as
//! `ErrorType::Delegate` with the upstream message.

mod canned;
mod flows;
mod gemini;

pub use canned::CannedClient;
pub use flows::{
    Breakdown, DailySuggestions, ProductInfo, BREAKDOWN, DEFAULT_SUGGESTION_COUNT,
    EXTRACT_PRODUCT_INFO, SUGGEST_DAILY_TASKS,
};
pub use gemini::GeminiClient;

use crate::error::{Error, ErrorType, Result};
use anyhow::Context;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// One structured completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The operation, e.g. `breakdown`.
    pub name: &'static str,
    pub prompt: String,
    /// JSON schema the answer must conform to.
    pub output_schema: Value,
}

/// A generative text service that answers with JSON.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Value>;
}

#[derive(Clone)]
pub struct Delegate {
    client: Arc<dyn CompletionClient>,
}

impl Delegate {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Splits a task into ordered subtasks.
    pub async fn breakdown(&self, task_description: &str) -> Result<Breakdown> {
        let prompt = flows::breakdown_prompt(task_description)?;
        self.run(BREAKDOWN, prompt).await
    }

    /// Reads the name, price and image of the product at `product_url`.
    pub async fn extract_product_info(&self, product_url: &str) -> Result<ProductInfo> {
        let url = flows::parse_product_url(product_url)?;
        let output: flows::ProductInfoOutput = self
            .run(EXTRACT_PRODUCT_INFO, flows::product_prompt(&url))
            .await?;
        flows::check_product(output).map_err(|reason| {
            warn!("{EXTRACT_PRODUCT_INFO} returned an invalid answer: {reason}");
            Error::msg(
                ErrorType::Delegate,
                format!("The completion service returned an invalid product: {reason}"),
            )
        })
    }

    /// Suggests `count` (default 3) tasks for today from a JSON dump of earlier tasks.
    pub async fn suggest_daily_tasks(
        &self,
        historical_tasks: &str,
        count: Option<u32>,
    ) -> Result<DailySuggestions> {
        let prompt = flows::suggestion_prompt(historical_tasks, count)?;
        self.run(SUGGEST_DAILY_TASKS, prompt).await
    }

    async fn run<O>(&self, name: &'static str, prompt: String) -> Result<O>
    where
        O: DeserializeOwned + JsonSchema,
    {
        let output_schema = serde_json::to_value(schemars::schema_for!(O))
            .context("Unable to render the output schema")
            .map_err(|e| Error::new(ErrorType::Delegate, e))?;
        let request = CompletionRequest {
            name,
            prompt,
            output_schema,
        };
        debug!("Calling the completion service for {name}");
        let answer = self.client.complete(&request).await.map_err(|e| {
            warn!("{name} failed: {e:#}");
            Error::new(ErrorType::Delegate, e)
        })?;
        serde_json::from_value(answer)
            .with_context(|| format!("The answer to {name} does not match its schema"))
            .map_err(|e| Error::new(ErrorType::Delegate, e))
    }
}
