//! Typed records (`Goal`, `LedgerEntry`, `Task`) and their mapping to and from store documents.
mod amount;
mod goal;
mod ledger;
mod record;
mod task;

pub use amount::{decimal_from_f64, Amount, AmountError, AmountFormat};
pub use goal::{Goal, GoalEdit, NewGoal};
pub use ledger::{EntryKind, LedgerEntry, LedgerSummary, NewLedgerEntry, GOAL_TRANSFER_CATEGORY};
pub use record::{Record, SchemaError};
pub use task::{NewTask, Task};
