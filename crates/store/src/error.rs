//! Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, following the same shape as every other crate in the
//! workspace.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally. "Record not found" is deliberately absent: point queries
/// return `Option` because an unknown id is an expected outcome.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Underlying SQLite/pool error.
    #[display("database error")]
    Database,
    /// Schema migration failed on connect.
    #[display("database migration error")]
    Migration,
    /// A write referenced an album that does not exist in the final state
    /// of its transaction. The whole transaction was rolled back.
    #[display("constraint violation: photo references a missing album")]
    Constraint,
    /// A pager was used after the table it reads from changed. Recover by
    /// constructing a fresh pager and restarting from the first page.
    #[display("stale pager: table changed since this pager was created")]
    StaleReader,
}

impl ErrorKind {
    /// Returns `true` if retrying the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
