//! These structs provide the CLI interface for the pocketplan CLI.

use crate::model::{Amount, EntryKind};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// pocketplan: savings goals, a ledger and a to-do list, from the command line.
///
/// Money moves between a savings goal and the ledger atomically: a deposit takes money out of the
/// ledger and puts it into the goal, a withdraw does the reverse, and a goal can never go below
/// zero. An AI helper can break a task into subtasks, read a product page, and suggest tasks for
/// the day.
///
/// There is also a mode in which an AI agent can use this program through the mcp subcommand.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the document store.
    ///
    /// This is the first command you should run. Pass --pocketplan-home if you do not want the
    /// data in $HOME/pocketplan.
    Init(InitArgs),
    /// Create, list, edit and delete savings goals, and move money in and out of them.
    Goal(GoalArgs),
    /// Record income and expenses.
    Ledger(LedgerArgs),
    /// Manage the to-do list.
    Task(TaskArgs),
    /// Ask the AI helper for a task breakdown, product details or daily suggestions.
    Ai(AiArgs),
    /// Print every change to goals, ledger entries or tasks until interrupted.
    Watch(WatchArgs),
    /// Run an MCP server over stdio so that an AI agent can use pocketplan.
    Mcp(McpArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where pocketplan data and configuration is held. Defaults to ~/pocketplan
    #[arg(long, env = "POCKETPLAN_HOME", default_value_t = default_pocketplan_home())]
    pocketplan_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, pocketplan_home: PathBuf) -> Self {
        Self {
            log_level,
            pocketplan_home: pocketplan_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn pocketplan_home(&self) -> &DisplayPath {
        &self.pocketplan_home
    }
}

/// (Not shown): Args for the `pocketplan init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The id of the user whose documents this installation reads and writes.
    #[arg(long)]
    user_id: String,
}

impl InitArgs {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// (Not shown): Args for the `pocketplan goal` command.
#[derive(Debug, Parser, Clone)]
pub struct GoalArgs {
    #[command(subcommand)]
    command: GoalCommand,
}

impl GoalArgs {
    pub fn command(&self) -> &GoalCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoalCommand {
    /// Create a goal with nothing saved yet.
    Create(CreateGoalArgs),
    /// List your goals, soonest deadline first.
    List,
    /// Show one goal.
    Get(IdArg),
    /// Change the name, target or deadline of a goal.
    Edit(EditGoalArgs),
    /// Delete a goal. It must be empty.
    Delete(IdArg),
    /// Move money from the ledger into a goal.
    Deposit(TransferArgs),
    /// Move money from a goal back to the ledger.
    Withdraw(TransferArgs),
}

/// A single document id.
#[derive(Debug, Parser, Clone)]
pub struct IdArg {
    /// The id, as printed by the list commands.
    id: String,
}

impl IdArg {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Parser, Clone)]
pub struct CreateGoalArgs {
    /// What you are saving for.
    #[arg(long)]
    name: String,

    /// How much you want to save, e.g. 1500 or $1,500.00
    #[arg(long)]
    target: Amount,

    /// The day you want to have it by, as YYYY-MM-DD.
    #[arg(long)]
    deadline: NaiveDate,
}

impl CreateGoalArgs {
    pub fn new(name: impl Into<String>, target: Amount, deadline: NaiveDate) -> Self {
        Self {
            name: name.into(),
            target,
            deadline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Amount {
        self.target
    }

    pub fn deadline(&self) -> NaiveDate {
        self.deadline
    }
}

#[derive(Debug, Parser, Clone)]
pub struct EditGoalArgs {
    /// The goal to change.
    id: String,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    target: Option<Amount>,

    #[arg(long)]
    deadline: Option<NaiveDate>,
}

impl EditGoalArgs {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target(&self) -> Option<Amount> {
        self.target
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }
}

#[derive(Debug, Parser, Clone)]
pub struct TransferArgs {
    /// The goal.
    id: String,

    /// How much to move. Must be positive.
    amount: Amount,
}

impl TransferArgs {
    pub fn new(id: impl Into<String>, amount: Amount) -> Self {
        Self {
            id: id.into(),
            amount,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// (Not shown): Args for the `pocketplan ledger` command.
#[derive(Debug, Parser, Clone)]
pub struct LedgerArgs {
    #[command(subcommand)]
    command: LedgerCommand,
}

impl LedgerArgs {
    pub fn command(&self) -> &LedgerCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum LedgerCommand {
    /// Record an income or expense.
    Add(AddEntryArgs),
    /// List entries, newest first.
    List(SinceArg),
    /// Delete an entry.
    Delete(IdArg),
    /// Total income, expense and balance.
    Summary(SinceArg),
}

#[derive(Debug, Parser, Clone)]
pub struct AddEntryArgs {
    #[arg(long)]
    description: String,

    /// The amount. The sign is taken from --kind, so 40 and -40 are the same.
    #[arg(long, allow_hyphen_values = true)]
    amount: Amount,

    #[arg(long, value_enum)]
    kind: EntryKind,

    /// Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long, default_value = "")]
    category: String,
}

impl AddEntryArgs {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

#[derive(Debug, Parser, Clone, Default)]
pub struct SinceArg {
    /// Only entries dated on or after this day (YYYY-MM-DD).
    #[arg(long)]
    since: Option<NaiveDate>,
}

impl SinceArg {
    pub fn since(&self) -> Option<NaiveDate> {
        self.since
    }
}

/// (Not shown): Args for the `pocketplan task` command.
#[derive(Debug, Parser, Clone)]
pub struct TaskArgs {
    #[command(subcommand)]
    command: TaskCommand,
}

impl TaskArgs {
    pub fn command(&self) -> &TaskCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Add a task.
    Add(AddTaskArgs),
    /// List tasks by due date.
    List(DueArg),
    /// Mark a task done.
    Complete(IdArg),
    /// Delete all completed tasks.
    Clear,
    /// Ask the AI helper to break a task into subtasks and add them all.
    Breakdown(AddTaskArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct AddTaskArgs {
    title: String,

    /// Defaults to today.
    #[arg(long)]
    due: Option<NaiveDate>,
}

impl AddTaskArgs {
    pub fn new(title: impl Into<String>, due: Option<NaiveDate>) -> Self {
        Self {
            title: title.into(),
            due,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn due(&self) -> Option<NaiveDate> {
        self.due
    }
}

#[derive(Debug, Parser, Clone, Default)]
pub struct DueArg {
    /// Only tasks due on or before this day (YYYY-MM-DD).
    #[arg(long)]
    due: Option<NaiveDate>,
}

impl DueArg {
    pub fn due(&self) -> Option<NaiveDate> {
        self.due
    }
}

/// (Not shown): Args for the `pocketplan ai` command.
#[derive(Debug, Parser, Clone)]
pub struct AiArgs {
    #[command(subcommand)]
    command: AiCommand,
}

impl AiArgs {
    pub fn command(&self) -> &AiCommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum AiCommand {
    /// Split a task into ordered subtasks (nothing is saved).
    Breakdown(BreakdownArgs),
    /// Read the name, price and image of a product page.
    Product(ProductArgs),
    /// Suggest tasks for today based on earlier tasks.
    Suggest(SuggestArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct BreakdownArgs {
    task: String,
}

impl BreakdownArgs {
    pub fn task(&self) -> &str {
        &self.task
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ProductArgs {
    /// An http or https URL.
    url: String,
}

impl ProductArgs {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SuggestArgs {
    /// How many suggestions to ask for. Defaults to 3.
    #[arg(long)]
    count: Option<u32>,

    /// A JSON file with earlier tasks. Defaults to your current task list.
    #[arg(long)]
    history: Option<PathBuf>,
}

impl SuggestArgs {
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    pub fn history(&self) -> Option<&Path> {
        self.history.as_deref()
    }
}

/// Which collection `pocketplan watch` follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WatchTarget {
    Goals,
    Ledger,
    Tasks,
}

serde_plain::derive_display_from_serialize!(WatchTarget);
serde_plain::derive_fromstr_from_deserialize!(WatchTarget);

/// (Not shown): Args for the `pocketplan watch` command.
#[derive(Debug, Parser, Clone)]
pub struct WatchArgs {
    #[arg(value_enum)]
    target: WatchTarget,
}

impl WatchArgs {
    pub fn new(target: WatchTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> WatchTarget {
        self.target
    }
}

/// (Not shown): Args for the `pocketplan mcp` command.
#[derive(Debug, Parser, Clone)]
pub struct McpArgs {}

fn default_pocketplan_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("pocketplan"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --pocketplan-home or POCKETPLAN_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("pocketplan")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goal_deposit() {
        let args = Args::try_parse_from([
            "pocketplan",
            "--pocketplan-home",
            "/tmp/pp",
            "goal",
            "deposit",
            "g1",
            "$1,250.50",
        ])
        .unwrap();
        assert_eq!(args.common().pocketplan_home().path(), Path::new("/tmp/pp"));
        let Command::Goal(goal) = args.command() else {
            panic!("expected goal command");
        };
        let GoalCommand::Deposit(transfer) = goal.command() else {
            panic!("expected deposit");
        };
        assert_eq!(transfer.id(), "g1");
        assert_eq!(transfer.amount().to_string(), "$1,250.50");
    }

    #[test]
    fn test_parse_ledger_add_negative() {
        let args = Args::try_parse_from([
            "pocketplan",
            "ledger",
            "add",
            "--description",
            "Rent",
            "--amount",
            "-900",
            "--kind",
            "expense",
        ])
        .unwrap();
        let Command::Ledger(ledger) = args.command() else {
            panic!("expected ledger command");
        };
        let LedgerCommand::Add(add) = ledger.command() else {
            panic!("expected add");
        };
        assert_eq!(add.kind(), EntryKind::Expense);
        assert!(add.amount().is_negative());
        assert_eq!(add.date(), None);
        assert_eq!(add.category(), "");
    }

    #[test]
    fn test_log_level_and_watch_target() {
        let args =
            Args::try_parse_from(["pocketplan", "--log-level", "debug", "watch", "tasks"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Watch(watch) = args.command() else {
            panic!("expected watch command");
        };
        assert_eq!(watch.target(), WatchTarget::Tasks);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Args::try_parse_from([
            "pocketplan",
            "goal",
            "create",
            "--name",
            "Car",
            "--target",
            "100",
            "--deadline",
            "next week",
        ])
        .is_err());
    }
}
