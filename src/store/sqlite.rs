use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use rusqlite::{
    params,
    types::{Type, Value},
    Connection, OptionalExtension, Row,
};
use uuid::Uuid;

use super::{
    entry::{EntryPatch, NewEntry, TimeEntry, MAX_BATCH_SIZE},
    error::StoreError,
    query::{EntryFilter, EntryPage},
};

/// SQLite-backed entry log. A single connection behind `Arc<Mutex<>>` so the
/// store can be shared across tasks; every operation takes the lock for one
/// statement or transaction, which is all the isolation single-row writes
/// need.
#[derive(Clone)]
pub struct EntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl EntryStore {
    /// Opens (or creates) the file-backed database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory database, used by tests and the store sink smoke tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                hostname TEXT NOT NULL,
                url TEXT,
                title TEXT,
                duration_seconds INTEGER NOT NULL,
                category TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                user_id TEXT,
                updated_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_time_entries_timestamp
                ON time_entries (timestamp);
            CREATE INDEX IF NOT EXISTS idx_time_entries_hostname
                ON time_entries (hostname);
            ",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Storage("entry database lock poisoned".into()))
    }

    /// Persists one entry. The timestamp defaults to now; `updated_at` stays
    /// empty until the first explicit update.
    pub fn insert(&self, entry: NewEntry) -> Result<TimeEntry, StoreError> {
        let entry = Self::materialize(entry.validated()?);
        let conn = self.conn()?;
        Self::insert_with(&conn, &entry)?;
        Ok(entry)
    }

    /// Persists up to [MAX_BATCH_SIZE] entries in one transaction. The batch
    /// is validated up front and written all-or-nothing.
    pub fn insert_bulk(&self, entries: Vec<NewEntry>) -> Result<Vec<TimeEntry>, StoreError> {
        if entries.is_empty() {
            return Err(StoreError::Validation {
                field: "entries",
                reason: "batch must not be empty".into(),
            });
        }
        if entries.len() > MAX_BATCH_SIZE {
            return Err(StoreError::Validation {
                field: "entries",
                reason: format!(
                    "batch of {} exceeds the maximum of {MAX_BATCH_SIZE}",
                    entries.len()
                ),
            });
        }

        let entries = entries
            .into_iter()
            .map(|v| v.validated().map(Self::materialize))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for entry in &entries {
            Self::insert_with(&tx, entry)?;
        }
        tx.commit()?;
        Ok(entries)
    }

    pub fn get(&self, id: Uuid) -> Result<TimeEntry, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM time_entries WHERE id = ?1"),
            params![id.to_string()],
            row_to_entry,
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))
    }

    /// Applies the patch and stamps `updated_at`. Inserts never stamp it, so
    /// the field doubles as an "was this ever edited" marker.
    pub fn update(&self, id: Uuid, patch: EntryPatch) -> Result<TimeEntry, StoreError> {
        let mut entry = self.get(id)?;

        if let Some(hostname) = patch.hostname {
            entry.hostname = hostname;
        }
        if let Some(title) = patch.title {
            entry.title = Some(title);
        }
        if let Some(duration_seconds) = patch.duration_seconds {
            entry.duration_seconds = duration_seconds;
        }
        if let Some(category) = patch.category {
            entry.category = category;
        }

        // Re-run the creation checks so an update can't sneak in values an
        // insert would have rejected.
        entry.hostname = entry.hostname.trim().to_string();
        if entry.hostname.is_empty() {
            return Err(StoreError::Validation {
                field: "hostname",
                reason: "must not be empty".into(),
            });
        }
        if entry.duration_seconds < 1 {
            return Err(StoreError::Validation {
                field: "durationSeconds",
                reason: format!("must be at least 1, got {}", entry.duration_seconds),
            });
        }

        entry.updated_at = Some(whole_seconds(Utc::now()));

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE time_entries
             SET hostname = ?1, title = ?2, duration_seconds = ?3, category = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                entry.hostname,
                entry.title,
                entry.duration_seconds,
                entry.category.as_str(),
                entry.updated_at.map(|v| v.timestamp()),
                id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(entry)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM time_entries WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// All entries matching the filter, oldest first. This is the input for
    /// the aggregate passes; "first seen" in their tie-breaks means first in
    /// this order.
    pub fn fetch(&self, filter: &EntryFilter) -> Result<Vec<TimeEntry>, StoreError> {
        let (clause, params) = filter.to_sql();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM time_entries {clause} ORDER BY timestamp ASC"
        ))?;
        let entries = stmt
            .query_map(rusqlite::params_from_iter(params), row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// One page of entries, newest first. `limit` is clamped to 1..=100 and
    /// `page` to at least 1.
    pub fn list_page(
        &self,
        filter: &EntryFilter,
        page: u32,
        limit: u32,
    ) -> Result<EntryPage, StoreError> {
        let limit = limit.clamp(1, 100) as u64;
        let page = page.max(1) as u64;

        let (clause, params) = filter.to_sql();
        let conn = self.conn()?;

        let total_entries: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM time_entries {clause}"),
            rusqlite::params_from_iter(params.clone()),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM time_entries {clause}
             ORDER BY timestamp DESC LIMIT {limit} OFFSET {offset}",
            offset = (page - 1) * limit,
        ))?;
        let entries = stmt
            .query_map(rusqlite::params_from_iter(params), row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        let total_pages = total_entries.div_ceil(limit);
        Ok(EntryPage {
            entries,
            current_page: page,
            total_pages,
            total_entries,
            has_next: page < total_pages,
            has_prev: page > 1,
        })
    }

    fn materialize(entry: NewEntry) -> TimeEntry {
        TimeEntry {
            id: Uuid::new_v4(),
            hostname: entry.hostname,
            url: entry.url,
            title: entry.title,
            duration_seconds: entry.duration_seconds,
            category: entry.category,
            timestamp: whole_seconds(entry.timestamp.unwrap_or_else(Utc::now)),
            user_id: entry.user_id,
            updated_at: None,
        }
    }

    fn insert_with(conn: &Connection, entry: &TimeEntry) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO time_entries
                (id, hostname, url, title, duration_seconds, category, timestamp, user_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.id.to_string(),
                entry.hostname,
                entry.url,
                entry.title,
                entry.duration_seconds,
                entry.category.as_str(),
                entry.timestamp.timestamp(),
                entry.user_id,
                entry.updated_at.map(|v| v.timestamp()),
            ],
        )?;
        Ok(())
    }
}

/// The column only keeps whole seconds, keep the returned value in line with
/// what a later read will see.
fn whole_seconds(v: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(v.timestamp(), 0).expect("timestamp was valid before truncation")
}

const COLUMNS: &str =
    "id, hostname, url, title, duration_seconds, category, timestamp, user_id, updated_at";

fn row_to_entry(row: &Row) -> rusqlite::Result<TimeEntry> {
    let id: String = row.get("id")?;
    let category: String = row.get("category")?;
    let timestamp: i64 = row.get("timestamp")?;
    let updated_at: Option<i64> = row.get("updated_at")?;

    Ok(TimeEntry {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        hostname: row.get("hostname")?,
        url: row.get("url")?,
        title: row.get("title")?,
        duration_seconds: row.get("duration_seconds")?,
        category: category.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.to_string().into())
        })?,
        timestamp: parse_timestamp(timestamp)?,
        user_id: row.get("user_id")?,
        updated_at: updated_at.map(parse_timestamp).transpose()?,
    })
}

fn parse_timestamp(seconds: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            format!("timestamp {seconds} out of range").into(),
        )
    })
}

impl EntryFilter {
    /// Builds the WHERE clause shared by fetch, count and page queries.
    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::<&str>::new();
        let mut params = Vec::<Value>::new();

        if let Some(start) = self.start {
            params.push(Value::Integer(start.timestamp()));
            conditions.push("timestamp >= ?");
        }
        if let Some(end) = self.end {
            params.push(Value::Integer(end.timestamp()));
            conditions.push("timestamp <= ?");
        }
        if let Some(user_id) = &self.user_id {
            params.push(Value::Text(user_id.clone()));
            conditions.push("user_id = ?");
        }
        if let Some(hostname) = &self.hostname {
            params.push(Value::Text(hostname.to_lowercase()));
            conditions.push("LOWER(hostname) LIKE '%' || ? || '%'");
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::EntryStore;
    use crate::{
        classify::Category,
        store::{
            entry::{EntryPatch, NewEntry},
            error::StoreError,
            query::EntryFilter,
        },
    };

    fn entry(hostname: &str, duration: i64, category: Category) -> NewEntry {
        NewEntry {
            hostname: hostname.into(),
            url: None,
            title: None,
            duration_seconds: duration,
            category,
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap()),
            user_id: None,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = EntryStore::open_in_memory().unwrap();
        let created = store
            .insert(entry("github.com", 120, Category::Productive))
            .unwrap();
        assert!(created.updated_at.is_none());

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn invalid_entries_are_never_persisted() {
        let store = EntryStore::open_in_memory().unwrap();
        let err = store
            .insert(entry("github.com", 0, Category::Productive))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(store.fetch(&EntryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn bulk_insert_of_exactly_100_succeeds() {
        let store = EntryStore::open_in_memory().unwrap();
        let batch = (0..100)
            .map(|i| entry(&format!("host{i}.com"), 10, Category::Neutral))
            .collect();
        let created = store.insert_bulk(batch).unwrap();
        assert_eq!(created.len(), 100);
        assert_eq!(store.fetch(&EntryFilter::default()).unwrap().len(), 100);
    }

    #[test]
    fn bulk_insert_of_101_is_rejected() {
        let store = EntryStore::open_in_memory().unwrap();
        let batch = (0..101)
            .map(|i| entry(&format!("host{i}.com"), 10, Category::Neutral))
            .collect();
        let err = store.insert_bulk(batch).unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "entries", .. }));
        assert!(store.fetch(&EntryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn bulk_insert_is_all_or_nothing() {
        let store = EntryStore::open_in_memory().unwrap();
        let batch = vec![
            entry("github.com", 10, Category::Productive),
            entry("", 10, Category::Neutral),
        ];
        assert!(store.insert_bulk(batch).is_err());
        assert!(store.fetch(&EntryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn update_patches_fields_and_stamps_updated_at() {
        let store = EntryStore::open_in_memory().unwrap();
        let created = store
            .insert(entry("github.com", 120, Category::Neutral))
            .unwrap();

        let updated = store
            .update(
                created.id,
                EntryPatch {
                    category: Some(Category::Productive),
                    title: Some("Pulls".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.category, Category::Productive);
        assert_eq!(updated.title.as_deref(), Some("Pulls"));
        assert_eq!(updated.hostname, "github.com");
        assert!(updated.updated_at.is_some());
        assert_eq!(store.get(created.id).unwrap(), updated);
    }

    #[test]
    fn update_rejects_values_an_insert_would_reject() {
        let store = EntryStore::open_in_memory().unwrap();
        let created = store
            .insert(entry("github.com", 120, Category::Neutral))
            .unwrap();

        let err = store
            .update(
                created.id,
                EntryPatch {
                    duration_seconds: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(store.get(created.id).unwrap(), created);
    }

    #[test]
    fn missing_targets_are_not_found() {
        let store = EntryStore::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id), Err(StoreError::NotFound(v)) if v == id));
        assert!(matches!(
            store.update(id, EntryPatch::default()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.delete(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_the_entry() {
        let store = EntryStore::open_in_memory().unwrap();
        let created = store
            .insert(entry("github.com", 120, Category::Productive))
            .unwrap();
        store.delete(created.id).unwrap();
        assert!(matches!(store.get(created.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn fetch_filters_by_inclusive_date_range_and_user() {
        let store = EntryStore::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, 0).unwrap();
        for (offset, user) in [(0, Some("alice")), (1, Some("alice")), (2, Some("bob"))] {
            let mut v = entry("github.com", 10, Category::Productive);
            v.timestamp = Some(base + Duration::days(offset));
            v.user_id = user.map(String::from);
            store.insert(v).unwrap();
        }

        let filter = EntryFilter {
            start: Some(base),
            end: Some(base + Duration::days(1)),
            user_id: Some("alice".into()),
            hostname: None,
        };
        let entries = store.fetch(&filter).unwrap();
        assert_eq!(entries.len(), 2);
        // Oldest first.
        assert!(entries[0].timestamp < entries[1].timestamp);
    }

    #[test]
    fn hostname_filter_is_case_insensitive_substring() {
        let store = EntryStore::open_in_memory().unwrap();
        store.insert(entry("GitHub.com", 10, Category::Productive)).unwrap();
        store.insert(entry("gitlab.com", 10, Category::Productive)).unwrap();
        store.insert(entry("example.org", 10, Category::Neutral)).unwrap();

        let filter = EntryFilter {
            hostname: Some("GIT".into()),
            ..Default::default()
        };
        let page = store.list_page(&filter, 1, 50).unwrap();
        assert_eq!(page.total_entries, 2);
    }

    #[test]
    fn pagination_pages_through_120_entries() {
        let store = EntryStore::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let batch = (0..100)
            .map(|i| {
                let mut v = entry("github.com", 10, Category::Productive);
                v.timestamp = Some(base + Duration::minutes(i));
                v
            })
            .collect();
        store.insert_bulk(batch).unwrap();
        let batch = (100..120)
            .map(|i| {
                let mut v = entry("github.com", 10, Category::Productive);
                v.timestamp = Some(base + Duration::minutes(i));
                v
            })
            .collect();
        store.insert_bulk(batch).unwrap();

        let filter = EntryFilter::default();

        let first = store.list_page(&filter, 1, 50).unwrap();
        assert_eq!(first.entries.len(), 50);
        assert_eq!(first.total_entries, 120);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);
        // Newest first.
        assert_eq!(
            first.entries[0].timestamp,
            base + Duration::minutes(119)
        );

        let last = store.list_page(&filter, 3, 50).unwrap();
        assert_eq!(last.entries.len(), 20);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn pagination_clamps_limit_and_page() {
        let store = EntryStore::open_in_memory().unwrap();
        store.insert(entry("github.com", 10, Category::Productive)).unwrap();

        let page = store.list_page(&EntryFilter::default(), 0, 0).unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.entries.len(), 1);

        let page = store.list_page(&EntryFilter::default(), 1, 100_000).unwrap();
        assert_eq!(page.total_pages, 1);
    }
}
