//! Conditions callers need to tell apart from ordinary failures.
//!
//! Everything in the crate returns `anyhow::Result`; these variants travel
//! inside the `anyhow::Error` and are recovered with
//! `err.downcast_ref::<StoreError>()`.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database was written by a newer build. Nothing can be done short
    /// of upgrading the application.
    #[error("SQL: User version is {current} but the expected maximum version is {max}.")]
    VersionFromFuture { current: i64, max: i64 },

    #[error("Migration versions are not monotonic: {prev} >= {next}")]
    NonMonotonicCatalogue { prev: i64, next: i64 },

    #[error("unknown store operation: {0}")]
    UnknownOperation(String),

    #[error("invalid database key")]
    InvalidKey,

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::VersionFromFuture { .. })
    }
}

/// Returns the `StoreError` carried by `err`, if any.
pub fn store_error(err: &anyhow::Error) -> Option<&StoreError> {
    err.downcast_ref::<StoreError>()
}
