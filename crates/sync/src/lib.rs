//! Refresh orchestration for the shoebox album cache.
//!
//! The remote collection is a single abstract collaborator
//! ([`PhotoSource`]) serving flat photo records; this crate turns its
//! response into the parent/child shape the store expects and commits it as
//! one replace-all transaction. See [`Syncer::refresh`] for the exact
//! protocol, including the empty-remote and failure cases.

pub mod error;
mod refresh;
mod source;

pub use crate::refresh::Syncer;
#[cfg(any(test, feature = "mock"))]
pub use crate::source::MockSource;
pub use crate::source::{FlatPhoto, PhotoSource};
