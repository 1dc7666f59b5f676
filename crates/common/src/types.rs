use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A notification produced by a CI job, before the store has stamped it.
///
/// Callers never choose `created_at`; the store assigns it at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub team_name: String,
    pub branch: String,
    pub build_type: String,
    /// Opaque notification content (issues, statistics, ...).
    pub payload: serde_json::Value,
}

impl NewNotification {
    pub fn new(
        team_name: impl Into<String>,
        branch: impl Into<String>,
        build_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            team_name: team_name.into(),
            branch: branch.into(),
            build_type: build_type.into(),
            payload,
        }
    }

    /// Reject blank key fields before anything reaches the database.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (field, value) in [
            ("team_name", &self.team_name),
            ("branch", &self.branch),
            ("build_type", &self.build_type),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }

    /// Attach the store-assigned timestamp.
    pub fn into_record(self, created_at: DateTime<Utc>) -> NotificationRecord {
        NotificationRecord {
            team_name: self.team_name,
            branch: self.branch,
            build_type: self.build_type,
            created_at,
            payload: self.payload,
        }
    }
}

/// A pending notification as persisted in the `notification_pending` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub team_name: String,
    pub branch: String,
    pub build_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "notification_data")]
    #[sqlx(rename = "notification_data")]
    pub payload: serde_json::Value,
}

impl NotificationRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            team_name: self.team_name.clone(),
            branch: self.branch.clone(),
            build_type: self.build_type.clone(),
            created_at: self.created_at,
        }
    }
}

/// Composite primary key. Field order is the result ordering of queries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub team_name: String,
    pub branch: String,
    pub build_type: String,
    pub created_at: DateTime<Utc>,
}

impl RecordKey {
    pub fn into_record(self, payload: serde_json::Value) -> NotificationRecord {
        NotificationRecord {
            team_name: self.team_name,
            branch: self.branch,
            build_type: self.build_type,
            created_at: self.created_at,
            payload,
        }
    }
}

/// Read filter. Absent fields match every value; `since` is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub team_name: Option<String>,
    pub branch: Option<String>,
    pub build_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team_name(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Treat empty strings as "no filter" on that dimension.
    pub fn normalized(self) -> Self {
        Self {
            team_name: non_empty(self.team_name),
            branch: non_empty(self.branch),
            build_type: non_empty(self.build_type),
            since: self.since,
        }
    }

    pub fn matches(&self, record: &NotificationRecord) -> bool {
        field_matches(&self.team_name, &record.team_name)
            && field_matches(&self.branch, &record.branch)
            && field_matches(&self.build_type, &record.build_type)
            && self.since.is_none_or(|since| record.created_at >= since)
    }
}

/// Delete filter. Absent fields match every value; `before` is exclusive.
///
/// A filter with every field absent is refused by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteFilter {
    pub team_name: Option<String>,
    pub branch: Option<String>,
    pub build_type: Option<String>,
    pub before: Option<DateTime<Utc>>,
}

impl DeleteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team_name(mut self, team_name: impl Into<String>) -> Self {
        self.team_name = Some(team_name.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn normalized(self) -> Self {
        Self {
            team_name: non_empty(self.team_name),
            branch: non_empty(self.branch),
            build_type: non_empty(self.build_type),
            before: self.before,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.team_name.is_none()
            && self.branch.is_none()
            && self.build_type.is_none()
            && self.before.is_none()
    }

    pub fn matches(&self, record: &NotificationRecord) -> bool {
        field_matches(&self.team_name, &record.team_name)
            && field_matches(&self.branch, &record.branch)
            && field_matches(&self.build_type, &record.build_type)
            && self.before.is_none_or(|before| record.created_at < before)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn field_matches(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().is_none_or(|expected| expected == value)
}
