//! In-process [`DatabaseClient`] backed by ordered maps.
//!
//! Keeps the same contract as the PostgreSQL client (missing tables,
//! key-ordered reads, upsert on identical keys) without a server, and can be
//! switched offline to exercise connectivity failures.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pending_common::config::TableName;
use pending_common::error::StoreError;
use pending_common::types::{NotificationRecord, RecordKey};

use crate::client::{DatabaseClient, DeleteStatement, QueryStatement};

type Table = BTreeMap<RecordKey, serde_json::Value>;

#[derive(Default)]
pub struct MemoryClient {
    tables: RwLock<HashMap<TableName, Table>>,
    offline: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of rows currently stored in `table`, or `None` if it was never
    /// provisioned.
    pub async fn row_count(&self, table: &TableName) -> Option<usize> {
        self.tables.read().await.get(table).map(BTreeMap::len)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::StoreUnavailable(
                "in-memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn missing(table: &TableName) -> StoreError {
    StoreError::SchemaMissing(format!("relation \"{table}\" does not exist"))
}

#[async_trait]
impl DatabaseClient for MemoryClient {
    async fn check_credentials(&self) -> Result<bool, StoreError> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }

    async fn execute_ddl(
        &self,
        table: &TableName,
        _statements: &[String],
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.tables.write().await.entry(table.clone()).or_default();
        Ok(())
    }

    async fn execute_query(
        &self,
        statement: &QueryStatement,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let rows = tables
            .get(&statement.table)
            .ok_or_else(|| missing(&statement.table))?;

        Ok(rows
            .iter()
            .map(|(key, payload)| key.clone().into_record(payload.clone()))
            .filter(|record| statement.filter.matches(record))
            .collect())
    }

    async fn execute_delete(&self, statement: &DeleteStatement) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(statement.table())
            .ok_or_else(|| missing(statement.table()))?;

        let before = rows.len();
        rows.retain(|key, payload| {
            let record = key.clone().into_record(payload.clone());
            !statement.filter().matches(&record)
        });
        Ok((before - rows.len()) as u64)
    }

    async fn bulk_insert(
        &self,
        table: &TableName,
        records: &[NotificationRecord],
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| missing(table))?;

        for record in records {
            rows.insert(record.key(), record.payload.clone());
        }
        Ok(())
    }
}
