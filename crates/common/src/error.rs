use thiserror::Error;

/// Errors surfaced by the notification pending store.
///
/// Connectivity problems (`StoreUnavailable`) are kept apart from data
/// problems so CI callers can decide whether a retry makes sense.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(
        "Refusing to delete with an empty filter: set at least one of team_name, branch, build_type or before"
    )]
    RefusedEmptyFilter,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema missing: {0}")]
    SchemaMissing(String),

    #[error("Database error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Only connectivity failures are worth retrying; everything else will
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                classify_sqlstate(&code, db_err.message())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::StoreUnavailable(err.to_string()),
            sqlx::Error::Configuration(_) => StoreError::Config(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Map a PostgreSQL SQLSTATE to the store taxonomy.
fn classify_sqlstate(code: &str, message: &str) -> StoreError {
    match code {
        // undefined_table
        "42P01" => StoreError::SchemaMissing(message.to_string()),
        // invalid_text_representation / invalid json text
        "22P02" | "22032" => StoreError::Serialization(message.to_string()),
        // connection_exception, invalid_authorization_specification,
        // insufficient_resources, operator_intervention
        c if ["08", "28", "53", "57"].iter().any(|class| c.starts_with(class)) => {
            StoreError::StoreUnavailable(format!("{message} (SQLSTATE {code})"))
        }
        _ => StoreError::Backend(format!("{message} (SQLSTATE {code})")),
    }
}
