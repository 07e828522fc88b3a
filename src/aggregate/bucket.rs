use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::Category;

/// Running totals for one hostname within one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTotals {
    pub total_time_seconds: i64,
    pub visit_count: u32,
    pub category: Category,
    pub last_visit_at: DateTime<Utc>,
    pub title: String,
}

/// Per-day accumulator of per-hostname totals. Stored as one JSON document so
/// an update is a single read-modify-write of the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    #[serde(default)]
    pub domains: BTreeMap<String, DomainTotals>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            domains: BTreeMap::new(),
        }
    }

    /// Folds one finalized session into the bucket. First observation of a
    /// hostname creates its entry, every call adds the duration, bumps the
    /// visit count and refreshes the last-seen data.
    pub fn add(
        &mut self,
        domain: &str,
        duration_seconds: i64,
        category: Category,
        title: &str,
        at: DateTime<Utc>,
    ) {
        let totals = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainTotals {
                total_time_seconds: 0,
                visit_count: 0,
                category,
                last_visit_at: at,
                title: title.to_string(),
            });
        totals.total_time_seconds += duration_seconds;
        totals.visit_count += 1;
        totals.category = category;
        totals.last_visit_at = at;
        totals.title = title.to_string();
    }

    pub fn total_seconds(&self) -> i64 {
        self.domains.values().map(|v| v.total_time_seconds).sum()
    }
}
