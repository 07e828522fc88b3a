use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::classify::Category;

use super::entry::TimeEntry;

/// Shared filter for list and aggregate queries. Bounds are inclusive, an
/// absent bound is unbounded. The hostname filter is a case-insensitive
/// substring match and only used by the list query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub hostname: Option<String>,
}

/// One page of the entry list plus navigation metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPage {
    pub entries: Vec<TimeEntry>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_entries: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub category: Category,
    pub total_seconds: i64,
    pub entry_count: usize,
    pub unique_hostnames: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTotal {
    pub hostname: String,
    pub category: Category,
    pub total_seconds: i64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_seconds: i64,
    /// Share of tracked time spent productively, 0..=100. Zero when nothing
    /// matched the filter.
    pub productivity_score: u8,
    pub categories: Vec<CategoryTotals>,
    pub top_domains: Vec<DomainTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCategoryTotal {
    pub category: Category,
    pub total_seconds: i64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBreakdown {
    pub date: NaiveDate,
    pub categories: Vec<DailyCategoryTotal>,
}

const TOP_DOMAIN_LIMIT: usize = 10;

/// Reduces the filtered entries to per-category totals, a productivity score
/// and the top domains by tracked time. Entries are expected oldest first;
/// domains tied on total time keep their first-seen order (the sort is
/// stable), which makes the top-10 cutoff deterministic.
pub fn summarize(entries: &[TimeEntry]) -> Summary {
    let mut total_seconds = 0i64;
    let mut productive_seconds = 0i64;

    let mut by_category = HashMap::<Category, (i64, usize, HashSet<&str>)>::new();

    let mut domain_order = HashMap::<(&str, Category), usize>::new();
    let mut domains = Vec::<DomainTotal>::new();

    for entry in entries {
        total_seconds += entry.duration_seconds;
        if entry.category == Category::Productive {
            productive_seconds += entry.duration_seconds;
        }

        let (seconds, count, hostnames) = by_category.entry(entry.category).or_default();
        *seconds += entry.duration_seconds;
        *count += 1;
        hostnames.insert(&entry.hostname);

        let index = *domain_order
            .entry((&entry.hostname, entry.category))
            .or_insert_with(|| {
                domains.push(DomainTotal {
                    hostname: entry.hostname.clone(),
                    category: entry.category,
                    total_seconds: 0,
                    entry_count: 0,
                });
                domains.len() - 1
            });
        domains[index].total_seconds += entry.duration_seconds;
        domains[index].entry_count += 1;
    }

    let categories = Category::ALL
        .into_iter()
        .filter_map(|category| {
            by_category
                .remove(&category)
                .map(|(total_seconds, entry_count, hostnames)| CategoryTotals {
                    category,
                    total_seconds,
                    entry_count,
                    unique_hostnames: hostnames.len(),
                })
        })
        .collect();

    domains.sort_by(|a, b| b.total_seconds.cmp(&a.total_seconds));
    domains.truncate(TOP_DOMAIN_LIMIT);

    let productivity_score = if total_seconds == 0 {
        0
    } else {
        (productive_seconds as f64 / total_seconds as f64 * 100.).round() as u8
    };

    Summary {
        total_seconds,
        productivity_score,
        categories,
        top_domains: domains,
    }
}

/// Groups the filtered entries by UTC calendar day and category. Days come
/// back ascending, each with its per-category subtotals in report order.
pub fn daily_breakdown(entries: &[TimeEntry]) -> Vec<DayBreakdown> {
    let mut by_day = std::collections::BTreeMap::<NaiveDate, HashMap<Category, (i64, usize)>>::new();

    for entry in entries {
        let (seconds, count) = by_day
            .entry(entry.timestamp.date_naive())
            .or_default()
            .entry(entry.category)
            .or_default();
        *seconds += entry.duration_seconds;
        *count += 1;
    }

    by_day
        .into_iter()
        .map(|(date, mut categories)| DayBreakdown {
            date,
            categories: Category::ALL
                .into_iter()
                .filter_map(|category| {
                    categories
                        .remove(&category)
                        .map(|(total_seconds, entry_count)| DailyCategoryTotal {
                            category,
                            total_seconds,
                            entry_count,
                        })
                })
                .collect(),
        })
        .collect()
}
