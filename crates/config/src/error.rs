//! Configuration Error Types
//!
//! Structured errors using `exn` for automatic location tracking, matching
//! the error shape of the other crates in the workspace.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A provider (file, environment) could not be read or deserialized.
    #[display("failed to load configuration")]
    Load,
}
