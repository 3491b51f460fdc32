//! Keyset pagination over the ordered album and photo listings.
//!
//! A pager is pinned to the generation of its backing table at construction.
//! Once any write touches that table the pager is permanently stale: `load`
//! fails with [`ErrorKind::StaleReader`] and the owner must build a fresh
//! pager from the repository and restart from the first page. This is what
//! stops a consumer from stitching together pages computed against two
//! different generations of the table.

use exn::ResultExt;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::models::{Album, Photo};
use crate::watch::{ChangeBus, Table};

/// What to load: the first page, or the page after a previously seen key.
///
/// The key is the id of the last record of the previous page; records are
/// keyed and ordered by id ascending. A `limit` of zero is served as one:
/// a page always carries at least one record while any remain, so walking
/// pages always terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub after: Option<i64>,
}

impl PageRequest {
    /// Request the first page.
    pub fn initial(limit: u32) -> Self {
        Self { limit, after: None }
    }

    /// Request the page following the record with id `after`.
    pub fn append(limit: u32, after: i64) -> Self {
        Self { limit, after: Some(after) }
    }
}

/// One bounded page of an ordered listing.
///
/// `next_key` is the key to append after for the following page; `None`
/// means the listing is exhausted. Exhaustion is not an error: loading past
/// the end simply yields an empty page with no next key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub next_key: Option<i64>,
}

impl<T> Page<T> {
    pub fn is_exhausted(&self) -> bool {
        self.next_key.is_none()
    }
}

/// Fetching limit+1 rows tells us whether a further page exists without a
/// second COUNT query; the surplus row is dropped from the returned page.
fn assemble<T>(mut rows: Vec<T>, limit: usize, key_of: impl Fn(&T) -> i64) -> Page<T> {
    let next_key = if rows.len() > limit {
        rows.truncate(limit);
        rows.last().map(key_of)
    } else {
        None
    };
    Page { records: rows, next_key }
}

fn guard_fresh(bus: &ChangeBus, table: Table, generation: u64) -> Result<()> {
    if bus.generation(table) != generation {
        exn::bail!(ErrorKind::StaleReader);
    }
    Ok(())
}

/// Single-use keyset pager over all albums, id ascending.
#[derive(Debug)]
pub struct AlbumPager {
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
    generation: u64,
}

impl AlbumPager {
    pub(crate) fn new(pool: SqlitePool, bus: Arc<ChangeBus>) -> Self {
        let generation = bus.generation(Table::Albums);
        Self { pool, bus, generation }
    }

    /// Load one page. Fails with [`ErrorKind::StaleReader`] once the albums
    /// table has changed since this pager was constructed.
    pub async fn load(&self, request: PageRequest) -> Result<Page<Album>> {
        guard_fresh(&self.bus, Table::Albums, self.generation)?;
        let limit = request.limit.max(1);
        let rows: Vec<Album> = sqlx::query_as(
            "SELECT id, name, cover_url FROM albums WHERE id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(request.after.unwrap_or(i64::MIN))
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        // A write may have committed between the first guard and the SELECT
        // acquiring a connection; writers move the generation before their
        // commit, so re-checking here catches any rows from a newer dataset.
        guard_fresh(&self.bus, Table::Albums, self.generation)?;
        Ok(assemble(rows, limit as usize, |album| album.id))
    }
}

/// Single-use keyset pager over one album's photos, id ascending.
#[derive(Debug)]
pub struct PhotoPager {
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
    generation: u64,
    album_id: i64,
}

impl PhotoPager {
    pub(crate) fn new(pool: SqlitePool, bus: Arc<ChangeBus>, album_id: i64) -> Self {
        let generation = bus.generation(Table::Photos);
        Self { pool, bus, generation, album_id }
    }

    /// Load one page. Fails with [`ErrorKind::StaleReader`] once the photos
    /// table has changed since this pager was constructed.
    pub async fn load(&self, request: PageRequest) -> Result<Page<Photo>> {
        guard_fresh(&self.bus, Table::Photos, self.generation)?;
        let limit = request.limit.max(1);
        let rows: Vec<Photo> = sqlx::query_as(
            "SELECT id, album_id, title, url, thumbnail_url FROM photos \
             WHERE album_id = ? AND id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(self.album_id)
        .bind(request.after.unwrap_or(i64::MIN))
        .bind(i64::from(limit) + 1)
        .fetch_all(&self.pool)
        .await
        .or_raise(|| ErrorKind::Database)?;
        // Same post-SELECT re-check as the album pager.
        guard_fresh(&self.bus, Table::Photos, self.generation)?;
        Ok(assemble(rows, limit as usize, |photo| photo.id))
    }
}
