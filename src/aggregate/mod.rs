//! Local accumulation of finalized sessions.
//! The basic idea is:
//!  - There is a directory with one bucket file per UTC day.
//!  - A bucket maps hostnames to their running totals for that day.
//!  - Buckets are a denormalized view for fast local lookups, the entry log
//!    stays authoritative.
//!  - Buckets older than the retention horizon are swept periodically.

pub mod bucket;
pub mod recorder;
pub mod store;

use std::time::Duration;

use anyhow::Result;
use chrono::Days;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::utils::clock::Clock;

use store::BucketStore;

pub const DEFAULT_RETENTION_DAYS: u64 = 30;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60 * 24);

/// Periodically removes day buckets older than `retention_days`. Runs until
/// cancelled. Sweep failures are logged and retried on the next tick, they
/// don't stop the watcher.
pub async fn purge_sweep(
    store: impl BucketStore,
    clock: Box<dyn Clock>,
    retention_days: u64,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let cutoff = clock
            .now()
            .date_naive()
            .checked_sub_days(Days::new(retention_days))
            .expect("Retention horizon before the start of the calendar");

        match store.purge_older_than(cutoff).await {
            Ok(0) => {}
            Ok(removed) => info!("Swept {removed} day buckets older than {cutoff}"),
            Err(e) => error!("Failed to sweep old day buckets {e:?}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = clock.sleep(interval) => ()
        }
    }
}
