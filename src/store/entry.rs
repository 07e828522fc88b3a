use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::Category;

use super::error::StoreError;

/// Bulk inserts above this size are rejected outright.
pub const MAX_BATCH_SIZE: usize = 100;

/// One persisted session. Immutable once written except for the fields an
/// [EntryPatch] can touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: Uuid,
    pub hostname: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub duration_seconds: i64,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An entry as submitted for creation. `timestamp` defaults to the moment of
/// insertion when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub hostname: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub duration_seconds: i64,
    pub category: Category,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl NewEntry {
    /// Normalizes and checks the submitted fields. Nothing invalid is ever
    /// persisted, the error names the offending field.
    pub(crate) fn validated(mut self) -> Result<Self, StoreError> {
        self.hostname = self.hostname.trim().to_string();
        if self.hostname.is_empty() {
            return Err(StoreError::Validation {
                field: "hostname",
                reason: "must not be empty".into(),
            });
        }
        if self.duration_seconds < 1 {
            return Err(StoreError::Validation {
                field: "durationSeconds",
                reason: format!("must be at least 1, got {}", self.duration_seconds),
            });
        }
        Ok(self)
    }
}

/// The mutable subset of an entry. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub category: Option<Category>,
}
