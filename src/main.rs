use chrono::Local;
use clap::Parser;
use pocketplan::args::{AiCommand, Args, Command, GoalCommand, LedgerCommand, TaskCommand};
use pocketplan::commands;
use pocketplan::goals::Direction;
use pocketplan::model::{GoalEdit, NewGoal, NewLedgerEntry, NewTask};
use pocketplan::{AppContext, Config, Mode, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with {} error: {e}", e.error_type());
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().pocketplan_home().path();

    // This allows for running the program without calling the completion service. When
    // POCKETPLAN_IN_TEST_MODE is set and non-empty, the AI helper answers from canned responses.
    let mode = Mode::from_env();

    match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.user_id()).await?.print(),
        Command::Mcp(_mcp_args) => commands::mcp(Config::load(home).await?, mode)
            .await?
            .print(),
        command => {
            let config = Config::load(home).await?;
            let ctx = AppContext::open(&config, mode).await?;
            let result = run(&ctx, command).await;
            ctx.close().await;
            result?
        }
    };
    Ok(())
}

/// Runs the commands that work on the document store.
async fn run(ctx: &AppContext, command: &Command) -> Result<()> {
    let today = Local::now().date_naive();
    match command {
        Command::Goal(goal_args) => match goal_args.command() {
            GoalCommand::Create(a) => {
                let new = NewGoal {
                    name: a.name().to_string(),
                    target_amount: a.target().value(),
                    deadline: a.deadline(),
                };
                commands::goal_create(ctx, new).await?.print()
            }
            GoalCommand::List => commands::goal_list(ctx).await?.print(),
            GoalCommand::Get(a) => commands::goal_get(ctx, a.id()).await?.print(),
            GoalCommand::Edit(a) => {
                let edit = GoalEdit {
                    name: a.name().map(str::to_string),
                    target_amount: a.target().map(|t| t.value()),
                    deadline: a.deadline(),
                };
                commands::goal_edit(ctx, a.id(), edit).await?.print()
            }
            GoalCommand::Delete(a) => commands::goal_delete(ctx, a.id()).await?.print(),
            GoalCommand::Deposit(a) => {
                commands::goal_transfer(ctx, a.id(), a.amount().value(), Direction::Deposit)
                    .await?
                    .print()
            }
            GoalCommand::Withdraw(a) => {
                commands::goal_transfer(ctx, a.id(), a.amount().value(), Direction::Withdraw)
                    .await?
                    .print()
            }
        },

        Command::Ledger(ledger_args) => match ledger_args.command() {
            LedgerCommand::Add(a) => {
                let new = NewLedgerEntry {
                    description: a.description().to_string(),
                    amount: a.amount().value(),
                    date: a.date().unwrap_or(today),
                    kind: a.kind(),
                    category: a.category().to_string(),
                };
                commands::ledger_add(ctx, new).await?.print()
            }
            LedgerCommand::List(a) => commands::ledger_list(ctx, a.since()).await?.print(),
            LedgerCommand::Delete(a) => commands::ledger_delete(ctx, a.id()).await?.print(),
            LedgerCommand::Summary(a) => commands::ledger_summary(ctx, a.since()).await?.print(),
        },

        Command::Task(task_args) => match task_args.command() {
            TaskCommand::Add(a) => {
                let new = NewTask {
                    title: a.title().to_string(),
                    due_date: a.due().unwrap_or(today),
                };
                commands::task_add(ctx, new).await?.print()
            }
            TaskCommand::List(a) => commands::task_list(ctx, a.due()).await?.print(),
            TaskCommand::Complete(a) => commands::task_complete(ctx, a.id()).await?.print(),
            TaskCommand::Clear => commands::task_clear(ctx).await?.print(),
            TaskCommand::Breakdown(a) => {
                commands::task_breakdown(ctx, a.title(), a.due().unwrap_or(today))
                    .await?
                    .print()
            }
        },

        Command::Ai(ai_args) => match ai_args.command() {
            AiCommand::Breakdown(a) => commands::ai_breakdown(ctx, a.task()).await?.print(),
            AiCommand::Product(a) => commands::ai_product(ctx, a.url()).await?.print(),
            AiCommand::Suggest(a) => match a.history() {
                Some(path) => commands::ai_suggest_from_file(ctx, path, a.count())
                    .await?
                    .print(),
                None => commands::ai_suggest(ctx, None, a.count()).await?.print(),
            },
        },

        Command::Watch(watch_args) => commands::watch(ctx, watch_args.target()).await?.print(),

        Command::Init(_) | Command::Mcp(_) => {}
    }
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
