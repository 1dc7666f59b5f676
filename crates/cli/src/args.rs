use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};

use pending_common::types::{DeleteFilter, QueryFilter};

/// Manage pending CI notifications awaiting aggregated delivery
#[derive(Parser, Debug)]
#[command(name = "notification-pending")]
#[command(version)]
#[command(about = "Manage notification storage", long_about = None)]
pub struct Cli {
    /// PostgreSQL connection string
    #[arg(long = "database-url", env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Table holding pending notifications (optionally schema.table)
    #[arg(long = "table", env = "PENDING_TABLE", global = true)]
    pub table: Option<String>,

    /// Emit logs as JSON
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a notification
    Store(StoreArgs),
    /// Get pending notifications
    Get(GetArgs),
    /// Delete notifications
    Delete(DeleteArgs),
    /// Create notification table
    CreateTable,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Team name
    #[arg(long = "team-name")]
    pub team_name: String,

    /// Branch name
    #[arg(long = "branch")]
    pub branch: String,

    /// Build type
    #[arg(long = "build-type")]
    pub build_type: String,

    /// Path to JSON file with notification data ("-" reads stdin)
    #[arg(long = "data-file")]
    pub data_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Filter by team name
    #[arg(long = "team-name")]
    pub team_name: Option<String>,

    /// Filter by branch
    #[arg(long = "branch")]
    pub branch: Option<String>,

    /// Filter by build type
    #[arg(long = "build-type")]
    pub build_type: Option<String>,

    /// Get notifications created at or after this datetime (ISO 8601, UTC if no offset)
    #[arg(long = "since", value_parser = parse_timestamp)]
    pub since: Option<DateTime<Utc>>,
}

impl GetArgs {
    pub fn filter(&self) -> QueryFilter {
        QueryFilter {
            team_name: self.team_name.clone(),
            branch: self.branch.clone(),
            build_type: self.build_type.clone(),
            since: self.since,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Filter by team name
    #[arg(long = "team-name")]
    pub team_name: Option<String>,

    /// Filter by branch
    #[arg(long = "branch")]
    pub branch: Option<String>,

    /// Filter by build type
    #[arg(long = "build-type")]
    pub build_type: Option<String>,

    /// Delete notifications created before this datetime (ISO 8601, UTC if no offset)
    #[arg(long = "before", value_parser = parse_timestamp)]
    pub before: Option<DateTime<Utc>>,
}

impl DeleteArgs {
    pub fn filter(&self) -> DeleteFilter {
        DeleteFilter {
            team_name: self.team_name.clone(),
            branch: self.branch.clone(),
            build_type: self.build_type.clone(),
            before: self.before,
        }
    }
}

/// Parse an ISO 8601 datetime. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(format!(
        "invalid datetime '{value}', expected ISO 8601 such as 2025-01-31T12:00:00Z"
    ))
}
