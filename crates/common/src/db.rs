use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Create a PostgreSQL connection pool.
///
/// Connects eagerly, so an unreachable server or rejected credentials show up
/// here as `StoreError::StoreUnavailable` rather than on the first statement.
pub async fn create_pool(config: &StoreConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&config.database_url)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Config(msg) => StoreError::Config(msg),
            other => StoreError::StoreUnavailable(other.to_string()),
        })?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
