//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::ai::{CannedClient, Delegate};
use crate::context::AppContext;
use crate::fault::RecordingFaultSink;
use crate::store::MemoryStore;
use crate::Config;
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment that sets up a pocketplan home directory with Config and database.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with Config and initialized database.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pocketplan");
        let config = Config::create(&root, "test-user").await.unwrap();

        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }
}

/// A context for `user` on a fresh in-memory store, with a recording fault sink and canned
/// completions.
pub(crate) fn memory_context(user: &str) -> (AppContext, Arc<MemoryStore>, RecordingFaultSink) {
    memory_context_on(user, Arc::new(MemoryStore::new()))
}

/// Same as `memory_context` but on a shared store, for tests with more than one user.
pub(crate) fn memory_context_on(
    user: &str,
    store: Arc<MemoryStore>,
) -> (AppContext, Arc<MemoryStore>, RecordingFaultSink) {
    let faults = RecordingFaultSink::new();
    let ctx = AppContext::new(
        user,
        store.clone(),
        Arc::new(faults.clone()),
        Delegate::new(Arc::new(CannedClient::new())),
    );
    (ctx, store, faults)
}
