use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::{
    machine::{ClosedSession, TrackerState},
    signal::SignalSource,
};

/// Drives the session state machine from a stream of browser signals.
/// Finalized sessions are handed over a channel to the processing side, so a
/// slow write never delays the next incoming signal.
pub struct SignalModule {
    next: mpsc::Sender<ClosedSession>,
    source: Box<dyn SignalSource>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl SignalModule {
    pub fn new(
        next: mpsc::Sender<ClosedSession>,
        source: Box<dyn SignalSource>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            source,
            shutdown,
            clock,
        }
    }

    /// Executes the signal event loop. Signals are applied one at a time in
    /// delivery order. Returns once the host closes the stream or shutdown is
    /// requested, closing any open session on the way out.
    pub async fn run(mut self) -> Result<()> {
        let mut state = TrackerState::default();
        loop {
            tokio::select! {
                // Cancelation stops the event loop. Dropping the sender also
                // stops the processing module once it drains the channel.
                _ = self.shutdown.cancelled() => {
                    return Self::flush(&self.next, self.clock.as_ref(), state).await;
                }
                signal = self.source.next_signal() => {
                    match signal {
                        Ok(Some(signal)) => {
                            debug!("Applying signal {:?}", signal);
                            let (next_state, closed) = state.apply(signal, self.clock.now());
                            state = next_state;
                            if let Some(closed) = closed {
                                self.next
                                    .send(closed)
                                    .await
                                    .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                            }
                        }
                        Ok(None) => {
                            info!("Signal stream ended");
                            return Self::flush(&self.next, self.clock.as_ref(), state).await;
                        }
                        Err(e) => {
                            error!("Encountered an error reading signals {:?}", e);
                        }
                    }
                }
            }
        }
    }

    /// Closes whatever session is still open before shutting down.
    async fn flush(
        next: &mpsc::Sender<ClosedSession>,
        clock: &dyn Clock,
        state: TrackerState,
    ) -> Result<()> {
        if let Some(closed) = state.finish(clock.now()) {
            next.send(closed)
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        }
        Ok(())
    }
}
