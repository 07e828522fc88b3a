use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::{format::FmtSpan, writer::MakeWriterExt};

pub const CLI_PREFIX: &str = "cli";
pub const WATCHER_PREFIX: &str = "watcher";

const KEPT_LOG_FILES: usize = 5;

/// Initializes tracing with a daily-rotated file under `<dir>/logs`, one file
/// series per command prefix. Stdout output is opt-in: the watcher shares its
/// stdout with the host protocol and has to keep it clean by default.
pub fn enable_logging(
    prefix: &str,
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .build(application_data_path.join("logs"))?;

    let stdout = std::io::stdout.with_filter(move |_| show_std);

    // An explicit level beats RUST_LOG, which beats the debug default.
    let level = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".into()),
    };
    let directive = format!("{}={level}", env!("CARGO_PKG_NAME").replace("-", "_"));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directive))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(file_appender))
        .pretty()
        .init();
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
