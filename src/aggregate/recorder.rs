use anyhow::Result;

use crate::{classify::Category, utils::clock::Clock};

use super::{bucket::DayBucket, store::BucketStore};

/// Bridges the session pipeline and the [BucketStore]. Keeps the current
/// day's bucket in memory and persists it on every recorded session, so the
/// on-disk state is never more than one session behind.
pub struct Recorder<S: BucketStore> {
    store: S,
    current: Option<DayBucket>,
    clock: Box<dyn Clock>,
}

impl<S: BucketStore> Recorder<S> {
    pub fn new(store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            current: None,
            clock,
        }
    }

    /// Accumulates one finalized session into today's bucket and writes the
    /// bucket back out. A failed write is the caller's problem, local
    /// accumulation is the source of truth.
    pub async fn record(
        &mut self,
        domain: &str,
        duration_seconds: i64,
        category: Category,
        title: &str,
    ) -> Result<()> {
        let now = self.clock.now();
        let today = now.date_naive();

        let mut bucket = match self.current.take() {
            Some(bucket) if bucket.date == today => bucket,
            // Day rolled over (or first session). Picks up whatever an
            // earlier run already stored for today.
            _ => self.store.load(today).await?,
        };

        bucket.add(domain, duration_seconds, category, title, now);
        self.store.save(&bucket).await?;
        self.current = Some(bucket);
        Ok(())
    }
}
