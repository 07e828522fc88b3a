use thiserror::Error;
use uuid::Uuid;

/// Failures at the entry-log boundary. Validation and missing targets are
/// reported with enough detail to tell the caller what to fix; everything
/// the storage backend throws at us collapses into [StoreError::Storage].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: String,
    },
    #[error("no entry with id {0}")]
    NotFound(Uuid),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}
