use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

/// A focus or navigation change delivered by the browser host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserSignal {
    /// A tab gained focus.
    FocusGained {
        url: String,
        #[serde(default)]
        title: String,
    },
    /// The focused tab navigated to a new url.
    Navigated {
        url: String,
        #[serde(default)]
        title: String,
    },
    /// The focused tab lost focus.
    FocusLost,
    /// The whole browser window went to the background.
    BrowserFocusLost,
    /// The browser window came back. The host is expected to follow up with a
    /// FocusGained for whichever tab is active, so this carries no data.
    BrowserFocusGained,
}

/// Produces browser signals in delivery order. Abstracted so tests can drive
/// the tracker without a live browser host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send {
    /// Returns the next signal, or None once the host closed the stream.
    async fn next_signal(&mut self) -> Result<Option<BrowserSignal>>;
}

/// Reads newline-delimited JSON signals from stdin, which is how a browser
/// extension feeds its native host. Unparsable lines are logged and skipped.
pub struct StdinSignalSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSignalSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSignalSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalSource for StdinSignalSource {
    async fn next_signal(&mut self) -> Result<Option<BrowserSignal>> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BrowserSignal>(&line) {
                Ok(signal) => return Ok(Some(signal)),
                Err(e) => {
                    warn!("Skipping malformed signal {line}: {e}");
                }
            }
        }
        Ok(None)
    }
}
