use crate::ai::flows::{BREAKDOWN, EXTRACT_PRODUCT_INFO, SUGGEST_DAILY_TASKS};
use crate::ai::{CompletionClient, CompletionRequest};
use anyhow::bail;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
struct State {
    calls: usize,
    last: Option<CompletionRequest>,
}

/// A completion client that answers from memory. Used in test mode so that the CLI and MCP
/// server run without network access, and by tests to count calls and inspect requests.
#[derive(Clone, Default)]
pub struct CannedClient {
    responses: HashMap<&'static str, Value>,
    failure: Option<String>,
    state: Arc<Mutex<State>>,
}

impl CannedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Answers `name` with `response` instead of the default answer.
    pub fn with_response(mut self, name: &'static str, response: Value) -> Self {
        self.responses.insert(name, response);
        self
    }

    /// How many completions were requested.
    pub fn calls(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    fn default_response(name: &str) -> Option<Value> {
        match name {
            BREAKDOWN => Some(json!({
                "subtasks": ["Write down the goal", "List what is needed", "Do the first step"]
            })),
            EXTRACT_PRODUCT_INFO => Some(json!({
                "name": "Stainless Steel Kettle",
                "price": 34.99,
                "imageUrl": "https://images.example.com/kettle.jpg"
            })),
            SUGGEST_DAILY_TASKS => Some(json!({
                "suggestions": ["Review the budget", "Plan tomorrow", "Take a walk"]
            })),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for CannedClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Value> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.calls += 1;
            state.last = Some(request.clone());
        }
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        match self.responses.get(request.name) {
            Some(response) => Ok(response.clone()),
            None => match Self::default_response(request.name) {
                Some(response) => Ok(response),
                None => bail!("No canned answer for '{}'", request.name),
            },
        }
    }
}
