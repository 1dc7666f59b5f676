//! DDL for the `notification_pending` table.
//!
//! The parent table is hash-partitioned on `(team_name, branch)`. Every
//! statement is `IF NOT EXISTS`, so provisioning can be repeated freely.

use pending_common::config::TableName;

/// Statements that create the parent table and its hash partitions.
pub fn create_table_statements(table: &TableName, partitions: u32) -> Vec<String> {
    let parent = table.quoted();
    let mut statements = Vec::with_capacity(partitions as usize + 2);

    if let Some(schema) = table.schema() {
        statements.push(format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""));
    }
    statements.push(format!(
        r#"CREATE TABLE IF NOT EXISTS {parent} (
    team_name         TEXT        NOT NULL,
    branch            TEXT        NOT NULL,
    build_type        TEXT        NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL,
    notification_data JSONB       NOT NULL,
    PRIMARY KEY (team_name, branch, build_type, created_at)
) PARTITION BY HASH (team_name, branch)"#
    ));

    for remainder in 0..partitions {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} PARTITION OF {parent} \
             FOR VALUES WITH (MODULUS {partitions}, REMAINDER {remainder})",
            table.partition(remainder).quoted(),
        ));
    }

    statements
}
