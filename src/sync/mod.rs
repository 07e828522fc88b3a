//! Best-effort mirroring of finalized sessions. The local day buckets are
//! written first and stay correct on their own; everything here is detached
//! and failures are logged, never retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    classify::Category,
    store::{EntryStore, NewEntry, StoreError},
};

/// Wire form of one finalized session, as the entry endpoint accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub hostname: String,
    pub duration_seconds: i64,
    pub url: Option<String>,
    pub title: Option<String>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The sink accepted the session.
    Delivered,
    /// The sink couldn't be reached at all.
    Unreachable,
    /// The sink answered and said no.
    Rejected,
}

/// Destination for mirrored sessions. Infallible by contract: whatever goes
/// wrong is folded into the returned [SyncOutcome].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncSink: Send + Sync + 'static {
    async fn send(&self, report: SessionReport) -> SyncOutcome;
}

/// Fires the send off as a detached task. The caller gets the join handle
/// back but is free to drop it, nothing downstream waits on the outcome.
pub fn dispatch(
    sink: Arc<dyn SyncSink>,
    report: SessionReport,
) -> tokio::task::JoinHandle<SyncOutcome> {
    tokio::spawn(async move {
        let hostname = report.hostname.clone();
        let outcome = sink.send(report).await;
        match outcome {
            SyncOutcome::Delivered => debug!("Mirrored session for {hostname}"),
            SyncOutcome::Unreachable => {
                warn!("Sync sink unreachable, dropping session for {hostname}")
            }
            SyncOutcome::Rejected => {
                warn!("Sync sink rejected session for {hostname}")
            }
        }
        outcome
    })
}

/// POSTs reports to a remote entry endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl SyncSink for HttpSink {
    async fn send(&self, report: SessionReport) -> SyncOutcome {
        match self
            .client
            .post(&self.endpoint)
            .json(&report)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => SyncOutcome::Delivered,
            Ok(response) => {
                warn!(
                    "Entry endpoint answered {} for {}",
                    response.status(),
                    report.hostname
                );
                SyncOutcome::Rejected
            }
            Err(e) => {
                debug!("Entry endpoint unreachable: {e}");
                SyncOutcome::Unreachable
            }
        }
    }
}

/// Delivers reports straight into the embedded entry store. Used when no
/// remote endpoint is configured, so the aggregate queries still have data.
pub struct StoreSink {
    store: EntryStore,
}

impl StoreSink {
    pub fn new(store: EntryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SyncSink for StoreSink {
    async fn send(&self, report: SessionReport) -> SyncOutcome {
        let entry = NewEntry {
            hostname: report.hostname,
            url: report.url,
            title: report.title,
            duration_seconds: report.duration_seconds,
            category: report.category,
            timestamp: None,
            user_id: report.user_id,
        };
        match self.store.insert(entry) {
            Ok(_) => SyncOutcome::Delivered,
            Err(e @ StoreError::Validation { .. }) => {
                warn!("Entry store rejected session: {e}");
                SyncOutcome::Rejected
            }
            Err(e) => {
                warn!("Entry store write failed: {e}");
                SyncOutcome::Unreachable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::always;

    use super::{dispatch, MockSyncSink, SessionReport, StoreSink, SyncOutcome, SyncSink};
    use crate::{classify::Category, store::EntryStore};

    fn report() -> SessionReport {
        SessionReport {
            hostname: "github.com".into(),
            duration_seconds: 120,
            url: Some("https://github.com/pulls".into()),
            title: Some("Pulls".into()),
            category: Category::Productive,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn dispatch_reports_the_sink_outcome() {
        let mut sink = MockSyncSink::new();
        sink.expect_send()
            .with(always())
            .times(1)
            .returning(|_| SyncOutcome::Unreachable);

        let outcome = dispatch(Arc::new(sink), report()).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unreachable);
    }

    #[tokio::test]
    async fn store_sink_delivers_into_the_entry_log() {
        let store = EntryStore::open_in_memory().unwrap();
        let sink = StoreSink::new(store.clone());

        assert_eq!(sink.send(report()).await, SyncOutcome::Delivered);

        let entries = store.fetch(&Default::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hostname, "github.com");
        assert_eq!(entries[0].duration_seconds, 120);
    }

    #[tokio::test]
    async fn store_sink_rejects_invalid_sessions() {
        let store = EntryStore::open_in_memory().unwrap();
        let sink = StoreSink::new(store.clone());

        let mut bad = report();
        bad.duration_seconds = 0;
        assert_eq!(sink.send(bad).await, SyncOutcome::Rejected);
        assert!(store.fetch(&Default::default()).unwrap().is_empty());
    }

    #[test]
    fn report_serializes_in_wire_form() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["hostname"], "github.com");
        assert_eq!(json["durationSeconds"], 120);
        assert_eq!(json["category"], "productive");
        assert!(json.get("userId").is_none());
    }
}
