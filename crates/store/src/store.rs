//! Notification pending store: validated put/query/delete over a
//! [`DatabaseClient`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use pending_common::config::{StoreConfig, TableName};
use pending_common::db;
use pending_common::error::StoreError;
use pending_common::types::{DeleteFilter, NewNotification, NotificationRecord, QueryFilter};

use crate::client::{DatabaseClient, DeleteStatement, QueryStatement};
use crate::memory::MemoryClient;
use crate::postgres::PgClient;
use crate::schema;

/// `DATABASE_URL` scheme selecting the in-process backend for dry runs.
pub const MEMORY_URL_SCHEME: &str = "memory:";

/// Table layout and provisioning behaviour.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub table: TableName,
    pub partitions: u32,
    /// Run `ensure_schema` before every `put`.
    pub auto_provision: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table: TableName::default(),
            partitions: 4,
            auto_provision: true,
        }
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            table: config.table.clone(),
            partitions: config.partitions,
            auto_provision: config.auto_provision,
        }
    }
}

/// Queue of pending CI notifications keyed by
/// `(team_name, branch, build_type, created_at)`.
///
/// Holds no record data between calls. Records are never updated; they are
/// put, read any number of times, and deleted explicitly by the caller.
pub struct PendingStore {
    client: Arc<dyn DatabaseClient>,
    options: StoreOptions,
    clock: Timestamps,
}

impl PendingStore {
    /// Connect to the configured backend and verify credentials.
    ///
    /// A `memory://` URL selects an empty in-process store whose contents
    /// are dropped with it; anything else is treated as a PostgreSQL URL.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let options = StoreOptions::from(config);
        if config.database_url.starts_with(MEMORY_URL_SCHEME) {
            tracing::info!(table = %options.table, "Using in-memory pending store");
            return Self::new(Arc::new(MemoryClient::new()), options).await;
        }

        let pool = db::create_pool(config).await?;
        Self::new(Arc::new(PgClient::new(pool)), options).await
    }

    /// Wrap an existing client, verifying that it is reachable.
    pub async fn new(
        client: Arc<dyn DatabaseClient>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let reachable = client
            .check_credentials()
            .await
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        if !reachable {
            return Err(StoreError::StoreUnavailable(
                "database credentials were rejected".to_string(),
            ));
        }

        Ok(Self {
            client,
            options,
            clock: Timestamps::default(),
        })
    }

    pub fn table(&self) -> &TableName {
        &self.options.table
    }

    /// Create the table and its partitions if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements =
            schema::create_table_statements(&self.options.table, self.options.partitions);
        self.client
            .execute_ddl(&self.options.table, &statements)
            .await?;

        tracing::debug!(table = %self.options.table, "Pending table created/verified");
        Ok(())
    }

    /// Queue a notification and return it with its assigned `created_at`.
    pub async fn put(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord, StoreError> {
        notification.validate()?;

        if self.options.auto_provision {
            self.ensure_schema().await?;
        }

        let record = notification.into_record(self.clock.next()?);
        self.client
            .bulk_insert(&self.options.table, std::slice::from_ref(&record))
            .await?;

        tracing::info!(
            team_name = %record.team_name,
            branch = %record.branch,
            build_type = %record.build_type,
            created_at = %record.created_at,
            "Stored pending notification"
        );

        Ok(record)
    }

    /// Read pending notifications ordered by the composite key.
    ///
    /// Absent filter fields match everything; `since` is inclusive.
    pub async fn query(&self, filter: QueryFilter) -> Result<Vec<NotificationRecord>, StoreError> {
        let statement = QueryStatement {
            table: self.options.table.clone(),
            filter: filter.normalized(),
        };
        let records = self.client.execute_query(&statement).await?;

        tracing::debug!(count = records.len(), "Retrieved pending notifications");
        Ok(records)
    }

    /// Delete matching notifications and return how many were removed.
    ///
    /// `before` is exclusive. A filter with no field set is refused before
    /// anything is sent to the database.
    pub async fn delete(&self, filter: DeleteFilter) -> Result<u64, StoreError> {
        let statement = match DeleteStatement::new(self.options.table.clone(), filter) {
            Ok(statement) => statement,
            Err(e) => {
                tracing::warn!(
                    "No delete conditions specified, refusing to delete all notifications"
                );
                return Err(e);
            }
        };

        let deleted = self.client.execute_delete(&statement).await?;

        tracing::info!(
            deleted,
            team_name = ?statement.filter().team_name,
            branch = ?statement.filter().branch,
            build_type = ?statement.filter().build_type,
            before = ?statement.filter().before,
            "Deleted pending notifications"
        );
        Ok(deleted)
    }
}

/// Issues strictly increasing microsecond timestamps.
///
/// Microseconds are the storage resolution; two puts from the same store can
/// never share a `created_at` even when the wall clock has not advanced.
#[derive(Default)]
struct Timestamps {
    last_micros: AtomicI64,
}

impl Timestamps {
    fn next(&self) -> Result<DateTime<Utc>, StoreError> {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let micros = now.max(previous + 1);

        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| StoreError::Validation(format!("timestamp {micros}us is out of range")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    async fn store_with(options: StoreOptions) -> (PendingStore, Arc<MemoryClient>) {
        let client = Arc::new(MemoryClient::new());
        let store = PendingStore::new(client.clone(), options).await.unwrap();
        (store, client)
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let clock = Timestamps::default();
        let mut previous = clock.next().unwrap();
        for _ in 0..1000 {
            let next = clock.next().unwrap();
            assert!(next > previous);
            assert_eq!(next.timestamp_subsec_nanos() % 1000, 0);
            previous = next;
        }
    }

    #[tokio::test]
    async fn test_new_rejects_unreachable_backend() {
        let client = Arc::new(MemoryClient::new());
        client.set_offline(true);
        let err = PendingStore::new(client, StoreOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_put_rejects_empty_key_fields() {
        let (store, client) = store_with(StoreOptions::default()).await;
        let err = store
            .put(NewNotification::new("", "main", "release", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        // Validation happens before provisioning.
        assert_eq!(client.row_count(store.table()).await, None);
    }

    #[tokio::test]
    async fn test_put_without_schema_and_auto_provision_off() {
        let options = StoreOptions {
            auto_provision: false,
            ..StoreOptions::default()
        };
        let (store, _client) = store_with(options).await;
        let err = store
            .put(NewNotification::new("qp", "main", "release", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SchemaMissing(_)));

        store.ensure_schema().await.unwrap();
        store
            .put(NewNotification::new("qp", "main", "release", serde_json::json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_surfaces_unavailable_backend() {
        let (store, client) = store_with(StoreOptions::default()).await;
        client.set_offline(true);
        let err = store
            .put(NewNotification::new("qp", "main", "release", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));

        let err = store.query(QueryFilter::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_with_memory_url() {
        let vars = HashMap::from([
            ("DATABASE_URL", "memory://"),
            ("PENDING_TABLE", "dry_run_pending"),
        ]);
        let config = StoreConfig::from_lookup(move |key: &str| {
            vars.get(key).map(|v| v.to_string())
        })
        .unwrap();

        let store = PendingStore::connect(&config).await.unwrap();
        assert_eq!(store.table().name(), "dry_run_pending");

        let stored = store
            .put(NewNotification::new("qp", "main", "release", serde_json::json!({"n": 1})))
            .await
            .unwrap();
        let rows = store.query(QueryFilter::new().team_name("qp")).await.unwrap();
        assert_eq!(rows, vec![stored]);
    }

    #[tokio::test]
    async fn test_query_before_provisioning_is_schema_missing() {
        let (store, _client) = store_with(StoreOptions::default()).await;
        let err = store.query(QueryFilter::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::SchemaMissing(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_query_on_empty_table_is_empty_not_error() {
        let (store, _client) = store_with(StoreOptions::default()).await;
        store.ensure_schema().await.unwrap();
        let rows = store.query(QueryFilter::new().team_name("nobody")).await.unwrap();
        assert!(rows.is_empty());
    }
}
