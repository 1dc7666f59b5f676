use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::error::StoreError;

/// Default table name, matching the table the CI aggregator reads.
pub const DEFAULT_TABLE: &str = "notification_pending";

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection string (credentials included), or `memory://`
    /// for an in-process dry run
    pub database_url: String,

    /// Table holding pending notifications, optionally schema-qualified
    pub table: TableName,

    /// Number of hash partitions over (team_name, branch) (default: 4)
    pub partitions: u32,

    /// Provision the table on every `put` (default: true)
    pub auto_provision: bool,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection before giving up (default: 5)
    pub db_acquire_timeout_secs: u64,
}

impl StoreConfig {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let partitions: u32 = var_or("PENDING_PARTITIONS", "4")
            .parse()
            .map_err(|_| anyhow!("PENDING_PARTITIONS must be a valid u32"))?;
        if !(1..=256).contains(&partitions) {
            return Err(anyhow!("PENDING_PARTITIONS must be between 1 and 256"));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .filter(|url| !url.is_empty())
                .ok_or_else(|| anyhow!("DATABASE_URL environment variable is required"))?,
            table: var_or("PENDING_TABLE", DEFAULT_TABLE).parse()?,
            partitions,
            auto_provision: parse_bool(&var_or("PENDING_AUTO_PROVISION", "true"))
                .ok_or_else(|| anyhow!("PENDING_AUTO_PROVISION must be true or false"))?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            db_acquire_timeout_secs: var_or("DB_ACQUIRE_TIMEOUT_SECS", "5")
                .parse()
                .map_err(|_| anyhow!("DB_ACQUIRE_TIMEOUT_SECS must be a valid u64"))?,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A validated, optionally schema-qualified table identifier.
///
/// Identifiers cannot be bound as statement parameters, so they are
/// restricted to `[A-Za-z_][A-Za-z0-9_]*` and always emitted double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

/// Leaves room for the `_pNNN` partition suffix within PostgreSQL's 63-byte limit.
const MAX_NAME_LEN: usize = 58;

impl TableName {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Quoted identifier for use in SQL text.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("\"{}\".\"{}\"", schema, self.name),
            None => format!("\"{}\"", self.name),
        }
    }

    /// Table name of the hash partition with the given remainder.
    pub fn partition(&self, remainder: u32) -> TableName {
        TableName {
            schema: self.schema.clone(),
            name: format!("{}_p{}", self.name, remainder),
        }
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self {
            schema: None,
            name: DEFAULT_TABLE.to_string(),
        }
    }
}

impl FromStr for TableName {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (schema, name) = match value.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, value),
        };

        if let Some(schema) = schema {
            check_identifier(schema, value)?;
        }
        check_identifier(name, value)?;
        if name.len() > MAX_NAME_LEN {
            return Err(StoreError::Config(format!(
                "table name '{value}' is longer than {MAX_NAME_LEN} characters"
            )));
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

fn check_identifier(ident: &str, full: &str) -> Result<(), StoreError> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "invalid table name '{full}': identifiers must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}
