//! Database client seam.
//!
//! The store never builds SQL from caller input. Reads and deletes are passed
//! to the client as typed statements; the client decides how to execute them
//! with bound parameters.

use async_trait::async_trait;

use pending_common::config::TableName;
use pending_common::error::StoreError;
use pending_common::types::{DeleteFilter, NotificationRecord, QueryFilter};

/// A filtered read against the pending table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatement {
    pub table: TableName,
    pub filter: QueryFilter,
}

/// A filtered delete against the pending table.
///
/// Can only be constructed with at least one filter field set, so no client
/// ever receives an unconditional delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStatement {
    table: TableName,
    filter: DeleteFilter,
}

impl DeleteStatement {
    pub fn new(table: TableName, filter: DeleteFilter) -> Result<Self, StoreError> {
        let filter = filter.normalized();
        if filter.is_empty() {
            return Err(StoreError::RefusedEmptyFilter);
        }
        Ok(Self { table, filter })
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn filter(&self) -> &DeleteFilter {
        &self.filter
    }
}

/// Table-backed database client used by [`crate::PendingStore`].
///
/// Implementations must be safe to share between tasks; each call is a single
/// short round trip and no state is carried between calls.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Probe the connection with the configured credentials.
    async fn check_credentials(&self) -> Result<bool, StoreError>;

    /// Run provisioning statements for `table`. Concurrent callers must not
    /// fail because another caller created the table first.
    async fn execute_ddl(&self, table: &TableName, statements: &[String]) -> Result<(), StoreError>;

    /// Run a filtered read, ordered by the composite key.
    async fn execute_query(
        &self,
        statement: &QueryStatement,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    /// Run a filtered delete and return the number of removed rows.
    async fn execute_delete(&self, statement: &DeleteStatement) -> Result<u64, StoreError>;

    /// Insert records, replacing any row with an identical composite key.
    async fn bulk_insert(
        &self,
        table: &TableName,
        records: &[NotificationRecord],
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_statement_refuses_empty_filter() {
        let err = DeleteStatement::new(TableName::default(), DeleteFilter::new()).unwrap_err();
        assert!(matches!(err, StoreError::RefusedEmptyFilter));
    }

    #[test]
    fn test_delete_statement_refuses_blank_only_filter() {
        let filter = DeleteFilter::new().team_name("").build_type("");
        let err = DeleteStatement::new(TableName::default(), filter).unwrap_err();
        assert!(matches!(err, StoreError::RefusedEmptyFilter));
    }

    #[test]
    fn test_delete_statement_keeps_normalized_filter() {
        let filter = DeleteFilter::new().team_name("qp").branch("");
        let statement = DeleteStatement::new(TableName::default(), filter).unwrap();
        assert_eq!(statement.filter().team_name.as_deref(), Some("qp"));
        assert_eq!(statement.filter().branch, None);
    }
}
