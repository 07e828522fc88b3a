use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::{
    aggregate::{recorder::Recorder, store::BucketStore},
    classify::{classify, CategoryConfig},
    sync::{dispatch, SessionReport, SyncSink},
};

use super::machine::ClosedSession;

/// Receives finalized sessions, classifies them, folds them into the local
/// day buckets and mirrors them to the sync sink. The local write always
/// happens first; the sink send is dispatched detached and never awaited
/// here.
pub struct SessionPipeline<S: BucketStore> {
    receiver: Receiver<ClosedSession>,
    recorder: Recorder<S>,
    categories: CategoryConfig,
    sink: Arc<dyn SyncSink>,
    user_id: Option<String>,
}

impl<S: BucketStore> SessionPipeline<S> {
    pub fn new(
        receiver: Receiver<ClosedSession>,
        recorder: Recorder<S>,
        categories: CategoryConfig,
        sink: Arc<dyn SyncSink>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            receiver,
            recorder,
            categories,
            sink,
            user_id,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(session) = self.receiver.recv().await {
            debug!("Processing session {:?}", session);
            let category = classify(&session.domain, &self.categories);

            match self
                .recorder
                .record(
                    &session.domain,
                    session.duration_seconds,
                    category,
                    &session.title,
                )
                .await
            {
                Ok(()) => {
                    info!(
                        "Recorded {}s on {} as {category}",
                        session.duration_seconds, session.domain
                    );
                    let _ = dispatch(
                        self.sink.clone(),
                        SessionReport {
                            hostname: session.domain,
                            duration_seconds: session.duration_seconds,
                            url: Some(session.url),
                            title: Some(session.title),
                            category,
                            user_id: self.user_id.clone(),
                        },
                    );
                }
                Err(e) => {
                    // Losing the local write breaks the source of truth, the
                    // session is not mirrored either.
                    error!("Failed to persist session for {}: {e:?}", session.domain)
                }
            }
        }

        self.receiver.close();
        Ok(())
    }
}
