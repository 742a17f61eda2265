pub mod ai;
pub mod args;
pub mod commands;
pub mod context;
pub mod fault;
pub mod goals;
pub mod ledger;
pub mod model;
pub mod store;
pub mod sync;
pub mod tasks;

mod config;
mod error;
mod mcp;
mod service;
mod utils;

#[cfg(test)]
mod test;

pub use config::{AiSettings, Config};
pub use context::AppContext;
pub use error::{Error, ErrorType, FaultContext, Result};

/// Environment variable that switches the program to `Mode::Testing` when set and non-empty.
pub const TEST_MODE_ENV: &str = "POCKETPLAN_IN_TEST_MODE";

/// Whether the AI delegate talks to the configured completion service or answers from canned
/// responses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Live,
    Testing,
}

impl Mode {
    /// `Testing` when `POCKETPLAN_IN_TEST_MODE` is set to a non-empty value, otherwise `Live`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Live,
        }
    }
}
