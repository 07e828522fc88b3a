use chrono::{DateTime, Duration, Utc};

use super::signal::BrowserSignal;

/// Sessions shorter than this are treated as focus noise and dropped.
pub const ACTIVATION_THRESHOLD: Duration = Duration::seconds(1);

/// The session currently accumulating time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub domain: String,
    pub url: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
}

/// A finished session that cleared the activation threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSession {
    pub domain: String,
    pub url: String,
    pub title: String,
    pub duration_seconds: i64,
}

/// Explicit tracker state. At most one session is ever open, and every
/// transition goes through [TrackerState::apply] with an externally supplied
/// `now`, so the machine is deterministic under test.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Idle,
    Tracking(OpenSession),
}

impl TrackerState {
    /// Advances the machine by one signal. Returns the next state together
    /// with the finalized session, if this signal closed one that cleared
    /// the activation threshold.
    pub fn apply(
        self,
        signal: BrowserSignal,
        now: DateTime<Utc>,
    ) -> (TrackerState, Option<ClosedSession>) {
        match signal {
            BrowserSignal::FocusGained { url, title }
            | BrowserSignal::Navigated { url, title } => self.focus_domain(url, title, now),
            BrowserSignal::FocusLost | BrowserSignal::BrowserFocusLost => {
                let closed = self.close(now);
                (TrackerState::Idle, closed)
            }
            // The host follows up with a FocusGained carrying the active tab,
            // nothing to do here.
            BrowserSignal::BrowserFocusGained => (self, None),
        }
    }

    /// Closes any open session when the watcher itself shuts down.
    pub fn finish(self, now: DateTime<Utc>) -> Option<ClosedSession> {
        self.close(now)
    }

    fn focus_domain(
        self,
        url: String,
        title: String,
        now: DateTime<Utc>,
    ) -> (TrackerState, Option<ClosedSession>) {
        let Some(domain) = hostname_of(&url) else {
            // Browser-internal pages never start a session.
            let closed = self.close(now);
            return (TrackerState::Idle, closed);
        };

        match self {
            TrackerState::Tracking(mut open) if open.domain == domain => {
                // Navigation within the same domain keeps the session going.
                open.url = url;
                open.title = title;
                (TrackerState::Tracking(open), None)
            }
            other => {
                let closed = other.close(now);
                (
                    TrackerState::Tracking(OpenSession {
                        domain,
                        url,
                        title,
                        started_at: now,
                    }),
                    closed,
                )
            }
        }
    }

    /// Closing while Idle is a no-op. Sub-threshold sessions are discarded.
    fn close(self, now: DateTime<Utc>) -> Option<ClosedSession> {
        match self {
            TrackerState::Idle => None,
            TrackerState::Tracking(open) => {
                let duration = now - open.started_at;
                if duration < ACTIVATION_THRESHOLD {
                    return None;
                }
                Some(ClosedSession {
                    domain: open.domain,
                    url: open.url,
                    title: open.title,
                    duration_seconds: duration.num_seconds(),
                })
            }
        }
    }
}

/// Extracts the registrable host from a url, normalized by lowercasing and
/// stripping a leading "www.". Returns None for anything that isn't a regular
/// web page (about:, chrome:, file:, malformed input).
pub fn hostname_of(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    // Drop userinfo and port.
    let host = authority.rsplit('@').next().unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}
