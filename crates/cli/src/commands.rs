use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::Context;

use pending_common::config::StoreConfig;
use pending_common::error::StoreError;
use pending_common::types::NewNotification;
use pending_store::PendingStore;

use crate::args::{Cli, Command, StoreArgs};

/// Build the store configuration, letting command-line flags win over the
/// environment.
pub fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    StoreConfig::from_lookup(|key| match key {
        "DATABASE_URL" => cli
            .database_url
            .clone()
            .or_else(|| std::env::var(key).ok()),
        "PENDING_TABLE" => cli.table.clone().or_else(|| std::env::var(key).ok()),
        _ => std::env::var(key).ok(),
    })
}

/// Connect to the store and run the parsed command, writing results to stdout.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let store = PendingStore::connect(&config).await?;

    let mut stdout = io::stdout();
    execute(&store, cli.command, &mut stdout).await
}

/// Run one command against an already connected store.
pub async fn execute<W: Write>(
    store: &PendingStore,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Store(args) => {
            let notification = read_notification(&args)?;
            let record = store.put(notification).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
        }
        Command::Get(args) => {
            let records = store.query(args.filter()).await?;
            tracing::info!(count = records.len(), "Retrieved pending notifications");
            writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
        }
        Command::Delete(args) => {
            let deleted = store.delete(args.filter()).await?;
            writeln!(out, "{}", serde_json::json!({ "deleted": deleted }))?;
        }
        Command::CreateTable => {
            store.ensure_schema().await?;
            tracing::info!(table = %store.table(), "Table created/verified");
        }
    }
    Ok(())
}

fn read_notification(args: &StoreArgs) -> anyhow::Result<NewNotification> {
    let payload = read_payload(&args.data_file)?;
    Ok(NewNotification::new(
        args.team_name.clone(),
        args.branch.clone(),
        args.build_type.clone(),
        payload,
    ))
}

/// Read the notification payload from a JSON file, or stdin for `-`.
pub fn read_payload(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read notification data from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read data file {}", path.display()))?
    };

    let payload = serde_json::from_str(&raw)
        .map_err(StoreError::from)
        .with_context(|| format!("data file {} is not valid JSON", path.display()))?;
    Ok(payload)
}
