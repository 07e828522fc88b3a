//! The durable entry log and the read-only queries over it.
//! The basic idea is:
//!  - Every finalized session becomes a TimeEntry row in SQLite.
//!  - Writes touch one row at a time: create, bulk create, update, delete.
//!  - Aggregates (summary, daily breakdown, top domains) are explicit
//!    group-by/reduce passes over the filtered rows.

pub mod entry;
pub mod error;
pub mod query;
pub mod sqlite;

pub use entry::{EntryPatch, NewEntry, TimeEntry, MAX_BATCH_SIZE};
pub use error::StoreError;
pub use query::{daily_breakdown, summarize, DayBreakdown, EntryFilter, EntryPage, Summary};
pub use sqlite::EntryStore;
