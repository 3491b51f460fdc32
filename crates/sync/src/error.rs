//! Sync Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the shape of the store crate's errors.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The remote fetch failed at the network/protocol level.
    #[display("transport error: {_0}")]
    Transport(#[error(not(source))] String),
    /// A refresh failed end to end. Wraps the transport or store error that
    /// caused it; the local cache is guaranteed untouched, so callers can
    /// keep serving the last good snapshot.
    #[display("refresh failed")]
    Refresh,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Refresh)
    }
}
