//! Crate-wide error kinds.
//!
//! Mirrors the abstract error kinds from the categorization/bulk-mutation design:
//! entry points reject on `AuthInvalid`/`UserMismatch`, reads return `NotFound` as
//! `None` rather than raising, and `CacheError`/`AnalyzerTimeout` are recovered
//! locally by the caller instead of propagating.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailIndexError {
    #[error("auth invalid: {0}")]
    AuthInvalid(String),

    #[error("user mismatch: resolved user does not match session user")]
    UserMismatch,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("remote transient error: {0}")]
    RemoteTransient(String),

    #[error("remote permanent error: Insufficient permissions ({0})")]
    RemotePermanent(String),

    #[error("analyzer timed out after {0:?}")]
    AnalyzerTimeout(std::time::Duration),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("cache error: {0}")]
    CacheError(String),
}

pub type Result<T> = std::result::Result<T, MailIndexError>;

impl From<sqlx::Error> for MailIndexError {
    fn from(e: sqlx::Error) -> Self {
        MailIndexError::StoreError(e.to_string())
    }
}

impl From<std::io::Error> for MailIndexError {
    fn from(e: std::io::Error) -> Self {
        MailIndexError::StoreError(e.to_string())
    }
}

impl MailIndexError {
    /// True for kinds the design says are swallowed by the caller (cache misses,
    /// per-email analyzer timeouts) rather than surfaced.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MailIndexError::CacheError(_) | MailIndexError::AnalyzerTimeout(_)
        )
    }
}
