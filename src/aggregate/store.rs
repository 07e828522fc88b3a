use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::utils::time::{bucket_name_to_date, date_to_bucket_name};

use super::bucket::DayBucket;

/// Interface for abstracting storage of day buckets. One bucket per day,
/// keyed by date, loaded and saved as a whole.
pub trait BucketStore: Send + Sync + 'static {
    /// Loads the bucket for `date`. A date that was never written yields an
    /// empty bucket.
    fn load(&self, date: NaiveDate) -> impl Future<Output = Result<DayBucket>> + Send;

    /// Persists the bucket, replacing whatever was stored for its date.
    fn save(&self, bucket: &DayBucket) -> impl Future<Output = Result<()>> + Send;

    /// Removes every bucket whose date precedes `cutoff`. Returns how many
    /// were removed. Running it twice in a row removes nothing the second
    /// time.
    fn purge_older_than(&self, cutoff: NaiveDate) -> impl Future<Output = Result<usize>> + Send;
}

impl<T: Deref + Send + Sync + 'static> BucketStore for T
where
    T::Target: BucketStore,
{
    fn load(&self, date: NaiveDate) -> impl Future<Output = Result<DayBucket>> + Send {
        self.deref().load(date)
    }

    fn save(&self, bucket: &DayBucket) -> impl Future<Output = Result<()>> + Send {
        self.deref().save(bucket)
    }

    fn purge_older_than(&self, cutoff: NaiveDate) -> impl Future<Output = Result<usize>> + Send {
        self.deref().purge_older_than(cutoff)
    }
}

/// The main realization of [BucketStore]. Each bucket is a `YYYY-MM-DD.json`
/// file, read and rewritten under a file lock so a concurrent sweep never
/// observes a torn write.
pub struct JsonBucketStore {
    bucket_dir: PathBuf,
}

impl JsonBucketStore {
    pub fn new(bucket_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&bucket_dir)?;

        Ok(Self { bucket_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.bucket_dir
            .join(format!("{}.json", date_to_bucket_name(date)))
    }

    async fn read_bucket(path: &Path, date: NaiveDate) -> Result<DayBucket> {
        debug!("Extracting {path:?}");
        let file = File::open(path).await;
        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DayBucket::new(date)),
            Err(e) => return Err(e.into()),
        };

        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read?;

        match serde_json::from_str::<DayBucket>(&content) {
            Ok(bucket) => Ok(bucket),
            Err(e) => {
                // Might happen after a shutdown cut a write short.
                warn!("Bucket file {path:?} was corrupted, starting over: {e}");
                Ok(DayBucket::new(date))
            }
        }
    }
}

impl BucketStore for JsonBucketStore {
    async fn load(&self, date: NaiveDate) -> Result<DayBucket> {
        Self::read_bucket(&self.path_for(date), date).await
    }

    async fn save(&self, bucket: &DayBucket) -> Result<()> {
        let path = self.path_for(bucket.date);
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.write_all(&serde_json::to_vec(bucket)?).await?;
            file.flush().await?;
            Ok::<_, anyhow::Error>(())
        }
        .await;
        file.unlock_async().await?;
        result
    }

    async fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.bucket_dir).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(date) = Path::new(&name)
                .file_stem()
                .and_then(|v| v.to_str())
                .and_then(bucket_name_to_date)
            else {
                // Not one of ours, leave it alone.
                continue;
            };

            if date < cutoff {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
