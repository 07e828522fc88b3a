//! Tracks which website currently holds browser focus, turns focus changes
//! into timed sessions, and keeps per-day statistics about where the time
//! went. Sessions are mirrored to an entry log that answers summary, daily
//! breakdown and top-domain queries.

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod utils;
