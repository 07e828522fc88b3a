use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Represents an entity responsible for providing dates across the
/// application. This allows time-dependent logic to be driven by a fake clock
/// in tests.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
