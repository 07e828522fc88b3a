use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process and flips the cancellation token so
/// the watcher can close its open session before exiting.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
