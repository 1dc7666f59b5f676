//! `notification-pending` binary entrypoint.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pending_cli::args::Cli;
use pending_cli::commands;
use pending_common::error::StoreError;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so env-backed flags see it
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help / --version are not failures
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.log_json);

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let retryable = err
                .downcast_ref::<StoreError>()
                .is_some_and(StoreError::is_retryable);
            tracing::error!(error = %err, retryable, "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

const DEFAULT_LOG_FILTER: &str = "pending_cli=info,pending_store=info,pending_common=info";

/// Logs go to stderr so stdout stays machine-readable JSON.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
