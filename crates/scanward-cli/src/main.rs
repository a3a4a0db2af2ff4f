//! Scanward - command line front end for the malware analysis dashboard.
//!
//! Every invocation behaves like a page load: the persisted session is
//! restored first, then the command runs against it.

mod app;
mod cli;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::Command;

/// Directory for log files; logs go to stderr when unset.
const ENV_LOG_DIR: &str = "SCANWARD_LOG_DIR";

/// Log file name inside `SCANWARD_LOG_DIR`
const LOG_FILE: &str = "scanward.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    let command = cli::parse();

    let mut app = App::new(&command.options)?;
    app.start().await;
    info!(authenticated = app.session.is_authenticated(), "Scanward started");

    match command.command {
        Command::Login(args) => app.login(args.identifier, args.password).await,
        Command::Logout => app.logout().await,
        Command::Whoami => app.whoami(),
        Command::Open(args) => app.open(&args.path),
        Command::Fetch(args) => app.fetch(&args.path).await,
    }
}
