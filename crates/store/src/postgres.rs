//! PostgreSQL implementation of [`DatabaseClient`].
//!
//! Every statement binds its filter values; only the validated, quoted table
//! identifier is formatted into SQL text. Optional filters use the
//! `($n IS NULL OR column = $n)` form so one statement covers every
//! combination of present and absent fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use pending_common::config::TableName;
use pending_common::error::StoreError;
use pending_common::types::NotificationRecord;

use crate::client::{DatabaseClient, DeleteStatement, QueryStatement};

/// [`DatabaseClient`] over a sqlx PostgreSQL pool.
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Text columns sort bytewise so ordering does not depend on the database
/// collation.
fn select_sql(table: &TableName) -> String {
    format!(
        r#"
        SELECT team_name, branch, build_type, created_at, notification_data
        FROM {table}
        WHERE ($1::text IS NULL OR team_name = $1)
          AND ($2::text IS NULL OR branch = $2)
          AND ($3::text IS NULL OR build_type = $3)
          AND ($4::timestamptz IS NULL OR created_at >= $4)
        ORDER BY team_name COLLATE "C", branch COLLATE "C", build_type COLLATE "C", created_at
        "#,
        table = table.quoted()
    )
}

fn delete_sql(table: &TableName) -> String {
    format!(
        r#"
        DELETE FROM {table}
        WHERE ($1::text IS NULL OR team_name = $1)
          AND ($2::text IS NULL OR branch = $2)
          AND ($3::text IS NULL OR build_type = $3)
          AND ($4::timestamptz IS NULL OR created_at < $4)
        "#,
        table = table.quoted()
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        r#"
        INSERT INTO {table} (team_name, branch, build_type, created_at, notification_data)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::timestamptz[], $5::jsonb[])
        ON CONFLICT (team_name, branch, build_type, created_at)
        DO UPDATE SET notification_data = EXCLUDED.notification_data
        "#,
        table = table.quoted()
    )
}

#[async_trait]
impl DatabaseClient for PgClient {
    async fn check_credentials(&self) -> Result<bool, StoreError> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(one == 1)
    }

    async fn execute_ddl(
        &self,
        table: &TableName,
        statements: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent `CREATE TABLE IF NOT EXISTS` can still race on the
        // catalog, so provisioners for the same table take turns.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(table.to_string())
            .execute(&mut *tx)
            .await?;

        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn execute_query(
        &self,
        statement: &QueryStatement,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let sql = select_sql(&statement.table);
        let filter = &statement.filter;

        let records: Vec<NotificationRecord> = sqlx::query_as(&sql)
            .bind(filter.team_name.as_deref())
            .bind(filter.branch.as_deref())
            .bind(filter.build_type.as_deref())
            .bind(filter.since)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn execute_delete(&self, statement: &DeleteStatement) -> Result<u64, StoreError> {
        let sql = delete_sql(statement.table());
        let filter = statement.filter();

        let result = sqlx::query(&sql)
            .bind(filter.team_name.as_deref())
            .bind(filter.branch.as_deref())
            .bind(filter.build_type.as_deref())
            .bind(filter.before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn bulk_insert(
        &self,
        table: &TableName,
        records: &[NotificationRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut team_names = Vec::with_capacity(records.len());
        let mut branches = Vec::with_capacity(records.len());
        let mut build_types = Vec::with_capacity(records.len());
        let mut created_at: Vec<DateTime<Utc>> = Vec::with_capacity(records.len());
        let mut payloads = Vec::with_capacity(records.len());

        for record in records {
            team_names.push(record.team_name.clone());
            branches.push(record.branch.clone());
            build_types.push(record.build_type.clone());
            created_at.push(record.created_at);
            payloads.push(Json(record.payload.clone()));
        }

        sqlx::query(&insert_sql(table))
            .bind(team_names)
            .bind(branches)
            .bind(build_types)
            .bind(created_at)
            .bind(payloads)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
