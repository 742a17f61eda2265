//! Command handlers for the pocketplan CLI.
//!
//! Each handler takes an `AppContext`, calls into the services and returns an `Out`. The MCP
//! server calls the same handlers, so both interfaces report identical messages.

mod ai;
mod goal;
mod init;
mod ledger;
mod mcp;
mod task;
mod watch;

use serde::Serialize;
use std::fmt::Debug;
use tracing::{error, info};

pub use ai::{ai_breakdown, ai_product, ai_suggest, ai_suggest_from_file};
pub use goal::{goal_create, goal_delete, goal_edit, goal_get, goal_list, goal_transfer};
pub use init::init;
pub use ledger::{ledger_add, ledger_delete, ledger_list, ledger_summary};
pub use mcp::mcp;
pub use task::{task_add, task_breakdown, task_clear, task_complete, task_list};
pub use watch::watch;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to both the command line and MCP server interfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Logs the message with `info!` and prints the structured data (if it exists) as JSON to
    /// stdout, so that it can be piped.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            match serde_json::to_string_pretty(structure) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Unable to serialize the command output: {e}"),
            }
        }
    }
}

/// "1 goal", "2 goals".
pub(crate) fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_and_plural() {
        let out: Out<Vec<u8>> = Out::new("Found 2", vec![1, 2]);
        assert_eq!(out.message(), "Found 2");
        assert_eq!(out.structure(), Some(&vec![1, 2]));
        let out: Out<()> = "Done".into();
        assert!(out.structure().is_none());
        assert_eq!(plural(1, "entry", "entries"), "1 entry");
        assert_eq!(plural(0, "entry", "entries"), "0 entries");
    }
}
