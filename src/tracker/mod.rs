//! The watcher side: browser signals in, finalized sessions out.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    aggregate::{
        purge_sweep,
        recorder::Recorder,
        store::{BucketStore, JsonBucketStore},
        SWEEP_INTERVAL,
    },
    classify::CategoryConfig,
    store::EntryStore,
    sync::{HttpSink, StoreSink, SyncSink},
    utils::clock::{Clock, DefaultClock},
};

pub mod machine;
pub mod module;
pub mod pipeline;
pub mod shutdown;
pub mod signal;

use machine::ClosedSession;
use module::SignalModule;
use pipeline::SessionPipeline;
use signal::{SignalSource, StdinSignalSource};

pub struct WatchConfig {
    /// Application directory holding buckets, categories and the entry log.
    pub dir: PathBuf,
    /// Remote entry endpoint. When absent, sessions are mirrored into the
    /// embedded entry log instead.
    pub endpoint: Option<String>,
    pub user_id: Option<String>,
    pub retention_days: u64,
}

/// Represents the starting point for the watcher. Runs until the signal
/// stream ends or ctrl-c is received.
pub async fn run_watcher(config: WatchConfig) -> Result<()> {
    let categories = CategoryConfig::load(&config.dir.join("categories.json"))?;

    let sink: Arc<dyn SyncSink> = match &config.endpoint {
        Some(endpoint) => Arc::new(HttpSink::new(endpoint.clone())),
        None => Arc::new(StoreSink::new(EntryStore::open(
            config.dir.join("entries.db"),
        )?)),
    };

    let (sender, receiver) = mpsc::channel::<ClosedSession>(10);
    let shutdown_token = CancellationToken::new();

    let bucket_store = Arc::new(JsonBucketStore::new(config.dir.join("buckets"))?);

    let collector = create_collector(
        sender,
        Box::new(StdinSignalSource::new()),
        &shutdown_token,
        DefaultClock,
    );
    let pipeline = create_pipeline(
        receiver,
        bucket_store.clone(),
        categories,
        sink,
        config.user_id.clone(),
        DefaultClock,
    );
    let sweep = purge_sweep(
        bucket_store,
        Box::new(DefaultClock),
        config.retention_days,
        SWEEP_INTERVAL,
        shutdown_token.clone(),
    );

    let (_, collection_result, pipeline_result, sweep_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            // The collector also finishes on its own when the host closes the
            // stream, release the other tasks in that case.
            let result = collector.run().await;
            shutdown_token.cancel();
            result
        },
        pipeline.run(),
        sweep,
    );

    if let Err(e) = collection_result {
        error!("Signal module got an error {:?}", e);
    }
    if let Err(e) = pipeline_result {
        error!("Session pipeline got an error {:?}", e);
    }
    if let Err(e) = sweep_result {
        error!("Purge sweep got an error {:?}", e);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<ClosedSession>,
    source: Box<dyn SignalSource>,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> SignalModule {
    SignalModule::new(sender, source, shutdown_token.clone(), Box::new(clock))
}

fn create_pipeline<S: BucketStore>(
    receiver: mpsc::Receiver<ClosedSession>,
    bucket_store: S,
    categories: CategoryConfig,
    sink: Arc<dyn SyncSink>,
    user_id: Option<String>,
    clock: impl Clock,
) -> SessionPipeline<S> {
    let recorder = Recorder::new(bucket_store, Box::new(clock));
    SessionPipeline::new(receiver, recorder, categories, sink, user_id)
}

#[cfg(test)]
mod watcher_tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        aggregate::store::{BucketStore, JsonBucketStore},
        classify::CategoryConfig,
        store::{EntryFilter, EntryStore},
        sync::StoreSink,
        tracker::{
            create_collector, create_pipeline,
            machine::ClosedSession,
            signal::{BrowserSignal, MockSignalSource},
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    /// Advances ten seconds on every reading, so each applied signal closes
    /// a ten second session deterministically.
    struct SteppingClock {
        current: Mutex<DateTime<Utc>>,
    }

    impl SteppingClock {
        fn new() -> Self {
            Self {
                current: Mutex::new(Utc.from_utc_datetime(&TEST_START_DATE)),
            }
        }
    }

    #[async_trait]
    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut current = self.current.lock().unwrap();
            let value = *current;
            *current += ChronoDuration::seconds(10);
            value
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    fn test_signals() -> Vec<BrowserSignal> {
        vec![
            BrowserSignal::FocusGained {
                url: "https://github.com/pulls".into(),
                title: "Pulls".into(),
            },
            BrowserSignal::FocusGained {
                url: "https://www.youtube.com/watch".into(),
                title: "Cats".into(),
            },
            BrowserSignal::FocusLost,
        ]
    }

    /// Very simple smoke test wiring mock signals through the collector and
    /// pipeline down to the bucket store and the embedded entry log.
    #[tokio::test]
    async fn smoke_test_watcher() -> Result<()> {
        *TEST_LOGGING;

        let mut source = MockSignalSource::new();
        let mut items = test_signals().into_iter();
        source
            .expect_next_signal()
            .returning(move || Ok(items.next()))
            .times(4);

        let dir = tempdir()?;
        let bucket_store = Arc::new(JsonBucketStore::new(dir.path().to_path_buf())?);
        let entry_store = EntryStore::open_in_memory()?;

        let mut categories = CategoryConfig::default();
        categories.assign("github.com", crate::classify::Category::Productive);

        let shutdown_token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel::<ClosedSession>(10);

        let collector = create_collector(
            sender,
            Box::new(source),
            &shutdown_token,
            SteppingClock::new(),
        );
        let pipeline = create_pipeline(
            receiver,
            bucket_store.clone(),
            categories,
            Arc::new(StoreSink::new(entry_store.clone())),
            Some("tester".into()),
            crate::utils::clock::DefaultClock,
        );

        let (collection_result, pipeline_result) = tokio::join!(collector.run(), pipeline.run());
        collection_result?;
        pipeline_result?;

        let bucket = bucket_store.load(Utc::now().date_naive()).await?;
        assert_eq!(bucket.domains.len(), 2);
        assert_eq!(bucket.domains["github.com"].total_time_seconds, 10);
        assert_eq!(bucket.domains["youtube.com"].total_time_seconds, 10);

        // The mirror writes are detached, give them a moment.
        let mut entries = vec![];
        for _ in 0..50 {
            entries = entry_store.fetch(&EntryFilter::default())?;
            if entries.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|v| v.user_id.as_deref() == Some("tester")));

        Ok(())
    }
}
