//! SQLite cache database for mirrored album data.
//!
//! This crate is the storage half of an offline-first mirror of a remote
//! photo collection. The database is not the source of truth - the remote
//! endpoint is. A refresh replaces the whole dataset in one transaction, so
//! a reader only ever sees a complete pre-refresh or post-refresh state.
//!
//! # Architecture
//! Two entity kinds and one relationship:
//! - **Albums**: grouping records synthesized during refresh from the flat
//!   remote records.
//! - **Photos**: the leaf records, each belonging to exactly one album
//!   (enforced with a foreign key, deleted by cascade).
//!
//! On top of the plain reads the crate offers two reactive surfaces, both
//! driven by per-table commit notifications:
//! - live queries ([`Repository::watch_albums_with_photos`] and friends)
//!   that re-emit fresh results after each relevant commit;
//! - single-use keyset pagers ([`AlbumPager`], [`PhotoPager`]) that refuse
//!   to mix pages from different table generations.

mod db;
pub mod error;
mod live;
mod models;
mod page;
mod repo;
mod watch;

pub use crate::db::Database;
pub use crate::models::{Album, AlbumWithPhotos, Photo};
pub use crate::page::{AlbumPager, Page, PageRequest, PhotoPager};
pub use crate::repo::Repository;
