//! The application context: everything a service call needs, constructed once and passed
//! explicitly.

use crate::ai::{CannedClient, CompletionClient, Delegate, GeminiClient};
use crate::error::{Error, ErrorType, IntoResult};
use crate::fault::{self, FaultChannel, FaultSink};
use crate::store::{DocumentStore, SqliteStore, StoreError};
use crate::{Config, Mode, Result};
use anyhow::bail;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_TRANSFER_ATTEMPTS: u32 = 5;

/// The signed-in user, the store, the fault sink and the AI delegate.
#[derive(Clone)]
pub struct AppContext {
    user_id: String,
    store: Arc<dyn DocumentStore>,
    faults: Arc<dyn FaultSink>,
    delegate: Delegate,
    transfer_attempts: u32,
}

impl AppContext {
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        faults: Arc<dyn FaultSink>,
        delegate: Delegate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            faults,
            delegate,
            transfer_attempts: DEFAULT_TRANSFER_ATTEMPTS,
        }
    }

    /// Sets how many times a goal transfer is attempted before giving up on a conflict. At
    /// least one attempt is always made.
    pub fn with_transfer_attempts(mut self, attempts: u32) -> Self {
        self.transfer_attempts = attempts.max(1);
        self
    }

    /// Opens the SQLite store under the configured home, starts a fault channel with a logging
    /// listener, and picks the completion client for `mode`.
    pub async fn open(config: &Config, mode: Mode) -> Result<Self> {
        let store = SqliteStore::load(config.sqlite_path())
            .await
            .pub_result(ErrorType::Database)?;
        let faults = FaultChannel::default();
        faults.spawn_logger();

        let client: Arc<dyn CompletionClient> = match mode {
            Mode::Testing => {
                debug!("Test mode: using canned completions");
                Arc::new(CannedClient::new())
            }
            Mode::Live => live_client(config)?,
        };

        Ok(Self::new(
            config.user_id(),
            Arc::new(store),
            Arc::new(faults),
            Delegate::new(client),
        )
        .with_transfer_attempts(config.transfer_attempts()))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn faults(&self) -> &Arc<dyn FaultSink> {
        &self.faults
    }

    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }

    pub fn transfer_attempts(&self) -> u32 {
        self.transfer_attempts
    }

    /// Publishes the fault for `error`, if it is a permission or connectivity failure, and
    /// converts it into the public error.
    pub(crate) fn report(&self, error: StoreError) -> Error {
        self.report_with(error, None)
    }

    /// Like `report`, including the payload of the rejected request in the fault.
    pub(crate) fn report_with(&self, error: StoreError, payload: Option<Value>) -> Error {
        if fault::report(self.faults.as_ref(), &error, payload) {
            warn!("{error}");
        }
        Error::from(error)
    }

    /// Releases the store.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Answers every call with the reason the live client could not be built, so that commands
/// that never use the delegate still work without AI settings.
struct UnconfiguredClient {
    reason: String,
}

#[async_trait::async_trait]
impl CompletionClient for UnconfiguredClient {
    async fn complete(&self, _request: &crate::ai::CompletionRequest) -> anyhow::Result<Value> {
        bail!("{}", self.reason)
    }
}

fn live_client(config: &Config) -> Result<Arc<dyn CompletionClient>> {
    let ai = config.ai();
    let api_key = match std::env::var(&ai.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            return Ok(Arc::new(UnconfiguredClient {
                reason: format!(
                    "The completion service is not configured, set {} to an API key",
                    ai.api_key_env
                ),
            }))
        }
    };
    let client = GeminiClient::new(&ai.provider_url, &ai.model, api_key, ai.timeout())
        .pub_result(ErrorType::Config)?;
    Ok(Arc::new(client))
}
