//! taskdash - terminal client for the ML task dashboard.
//!
//! Log in, upload files against a model to create tasks, and browse task
//! results from the terminal.

mod app;
mod format;

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, Command};
use taskdash_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// Directory for the rolling log file; stderr only when unset
const ENV_LOG_DIR: &str = "TASKDASH_LOG_DIR";

const LOG_FILE_PREFIX: &str = "taskdash.log";

const USAGE: &str = "\
Usage: taskdash [--ephemeral] <command>

Commands:
  login [LOGIN]            Log in (prompts for password)
  register [LOGIN]         Create an account and log in
  logout                   Forget stored tokens
  status                   Show session state
  models                   List available models
  tasks [PAGE]             List your tasks
  task <ID>                Show task details and prediction
  upload <MODEL_ID> <FILE> Create a task from a file

Options:
  --ephemeral              Keep tokens in memory only";

#[derive(Debug, PartialEq, Eq)]
struct Cli {
    ephemeral: bool,
    command: Command,
}

fn parse_args(args: &[String]) -> Result<Cli> {
    let ephemeral = args.iter().any(|a| a == "--ephemeral");
    let rest: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--ephemeral")
        .collect();

    let command = match rest.as_slice() {
        ["login"] => Command::Login { login: None },
        ["login", login] => Command::Login {
            login: Some(login.to_string()),
        },
        ["register"] => Command::Register { login: None },
        ["register", login] => Command::Register {
            login: Some(login.to_string()),
        },
        ["logout"] => Command::Logout,
        ["status"] => Command::Status,
        ["models"] => Command::Models,
        ["tasks"] => Command::Tasks { page: 1 },
        ["tasks", page] => Command::Tasks {
            page: page
                .parse()
                .with_context(|| format!("Invalid page number '{}'", page))?,
        },
        ["task", id] => Command::Task { id: id.to_string() },
        ["upload", model_id, file] => Command::Upload {
            model_id: model_id.to_string(),
            file: file.to_string(),
        },
        _ => bail!("{}", USAGE),
    };

    Ok(Cli { ephemeral, command })
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;

    let config = Config::load()?;
    info!(environment = ?config.environment, storage = ?config.token_storage, "taskdash starting");

    let mut app = App::new(config, cli.ephemeral)?;

    // Ctrl-C abandons whatever navigation is in flight
    let cancel = app.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    app.run(cli.command).await
}
