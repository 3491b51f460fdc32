//! Repository for album and photo entities.
//!
//! Albums and photos are tightly coupled: a photo cannot exist without its
//! album, and albums are only ever written alongside the photos they were
//! synthesized from. The repository therefore exposes whole-dataset writes
//! (`replace_all`, the clears) rather than row-level patching.

use exn::ResultExt;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Album, AlbumWithPhotos, LeftJoinRow, Photo, group_photos_by_album};
use crate::page::{AlbumPager, PhotoPager};
use crate::watch::{ChangeBus, Table};

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.kind() == sqlx::error::ErrorKind::ForeignKeyViolation)
}

/// Repository over the album cache.
///
/// # Relationships
///
/// - Every photo references exactly one album; the reference must resolve
///   within the final state of the writing transaction or the whole write
///   fails with [`ErrorKind::Constraint`].
/// - Deleting an album cascades to its photos in the same transaction.
/// - Re-inserting an id replaces the whole row (last write wins, no merge).
///
/// Reads hand out copies; no caller ever holds a live handle into storage.
/// Committed writes are announced on the database's change bus, which drives
/// the live queries in [`watch`](Self::watch_albums_with_photos) and
/// invalidates any pagers built before the write.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), bus: Arc::clone(db.bus()) }
    }
}

impl Repository {
    // =========================================================================
    // Write
    // =========================================================================

    /// Replace the entire dataset in one transaction.
    ///
    /// Deletes everything, then inserts the given albums followed by the
    /// given photos. If the same id appears twice in either input, the later
    /// occurrence wins. Readers concurrent with the call see either the full
    /// pre-replace dataset or the full post-replace dataset, never a mix.
    ///
    /// Returns [`ErrorKind::Constraint`] (and leaves the prior dataset fully
    /// intact) if any photo's `album_id` has no matching album.
    pub async fn replace_all(&self, albums: &[Album], photos: &[Photo]) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM photos").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        sqlx::query("DELETE FROM albums").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        for album in albums {
            sqlx::query("INSERT OR REPLACE INTO albums (id, name, cover_url) VALUES (?, ?, ?)")
                .bind(album.id)
                .bind(&album.name)
                .bind(&album.cover_url)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        for photo in photos {
            let inserted = sqlx::query(
                "INSERT OR REPLACE INTO photos (id, album_id, title, url, thumbnail_url) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(photo.id)
            .bind(photo.album_id)
            .bind(&photo.title)
            .bind(&photo.url)
            .bind(&photo.thumbnail_url)
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(_) => {},
                // Dropping `tx` on the error path rolls the whole write back.
                Err(err) if is_foreign_key_violation(&err) => {
                    return Err(err).or_raise(|| ErrorKind::Constraint);
                },
                Err(err) => return Err(err).or_raise(|| ErrorKind::Database),
            }
        }
        // Bump the generations before the commit so no pager can observe
        // this write's data under the old generation; wake subscribers only
        // once the commit has succeeded.
        self.bus.invalidate(Table::Albums);
        self.bus.invalidate(Table::Photos);
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        debug!(albums = albums.len(), photos = photos.len(), "replaced cache dataset");
        self.bus.notify(Table::Albums);
        self.bus.notify(Table::Photos);
        Ok(())
    }

    /// Delete all photos. Albums are left in place. No-op on an empty table.
    pub async fn clear_photos(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result =
            sqlx::query("DELETE FROM photos").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() > 0 {
            self.bus.invalidate(Table::Photos);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() > 0 {
            self.bus.notify(Table::Photos);
        }
        Ok(())
    }

    /// Delete all albums, cascading to their photos. No-op on an empty table.
    pub async fn clear_albums(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let result =
            sqlx::query("DELETE FROM albums").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() > 0 {
            self.bus.invalidate(Table::Albums);
            // The cascade may have touched photos; announce it either way
            // rather than tracking cascade counts.
            self.bus.invalidate(Table::Photos);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() > 0 {
            self.bus.notify(Table::Albums);
            self.bus.notify(Table::Photos);
        }
        Ok(())
    }

    /// Delete everything: photos first, then albums, in one transaction.
    pub async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let photos =
            sqlx::query("DELETE FROM photos").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        let albums =
            sqlx::query("DELETE FROM albums").execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        if photos.rows_affected() > 0 {
            self.bus.invalidate(Table::Photos);
        }
        if albums.rows_affected() > 0 {
            self.bus.invalidate(Table::Albums);
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        if photos.rows_affected() > 0 {
            self.bus.notify(Table::Photos);
        }
        if albums.rows_affected() > 0 {
            self.bus.notify(Table::Albums);
        }
        Ok(())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// All albums, ordered by id ascending.
    pub async fn albums_ordered(&self) -> Result<Vec<Album>> {
        query_albums_ordered(&self.pool).await
    }

    /// Photos of one album, ordered by id ascending.
    ///
    /// An unknown album id yields an empty vec, not an error.
    pub async fn photos_of_album(&self, album_id: i64) -> Result<Vec<Photo>> {
        query_photos_of_album(&self.pool, album_id).await
    }

    /// Point lookup of one photo. `None` when the id is unknown.
    pub async fn photo_by_id(&self, id: i64) -> Result<Option<Photo>> {
        query_photo_by_id(&self.pool, id).await
    }

    /// All albums paired with their photos, ordered by album id then photo id.
    pub async fn albums_with_photos(&self) -> Result<Vec<AlbumWithPhotos>> {
        query_albums_with_photos(&self.pool).await
    }

    /// One album paired with its photos. `None` when the id is unknown.
    pub async fn album_with_photos(&self, album_id: i64) -> Result<Option<AlbumWithPhotos>> {
        query_album_with_photos(&self.pool, album_id).await
    }

    // =========================================================================
    // Pagers
    // =========================================================================

    /// A keyset pager over all albums, id ascending.
    ///
    /// The pager is pinned to the current state of the `albums` table: any
    /// later write to it invalidates the pager, and `load` then fails with
    /// [`ErrorKind::StaleReader`] until a fresh pager is constructed.
    pub fn album_pager(&self) -> AlbumPager {
        AlbumPager::new(self.pool.clone(), Arc::clone(&self.bus))
    }

    /// A keyset pager over one album's photos, id ascending.
    ///
    /// Same invalidation rules as [`album_pager`](Self::album_pager), keyed
    /// off the `photos` table.
    pub fn photo_pager(&self, album_id: i64) -> PhotoPager {
        PhotoPager::new(self.pool.clone(), Arc::clone(&self.bus), album_id)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }
}

// Free query functions so live queries can run them from an owned pool
// without borrowing a repository.

pub(crate) async fn query_albums_ordered(pool: &SqlitePool) -> Result<Vec<Album>> {
    sqlx::query_as("SELECT id, name, cover_url FROM albums ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .or_raise(|| ErrorKind::Database)
}

pub(crate) async fn query_photos_of_album(pool: &SqlitePool, album_id: i64) -> Result<Vec<Photo>> {
    sqlx::query_as(
        "SELECT id, album_id, title, url, thumbnail_url FROM photos WHERE album_id = ? ORDER BY id ASC",
    )
    .bind(album_id)
    .fetch_all(pool)
    .await
    .or_raise(|| ErrorKind::Database)
}

pub(crate) async fn query_photo_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Photo>> {
    sqlx::query_as("SELECT id, album_id, title, url, thumbnail_url FROM photos WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .or_raise(|| ErrorKind::Database)
}

pub(crate) async fn query_albums_with_photos(pool: &SqlitePool) -> Result<Vec<AlbumWithPhotos>> {
    let rows: Vec<LeftJoinRow> = sqlx::query_as(
        r#"
        SELECT a.id, a.name, a.cover_url, p.id AS photo_id, p.title, p.url, p.thumbnail_url
        FROM albums a
        LEFT JOIN photos p ON p.album_id = a.id
        ORDER BY a.id ASC, p.id ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .or_raise(|| ErrorKind::Database)?;
    Ok(group_photos_by_album(rows))
}

pub(crate) async fn query_album_with_photos(pool: &SqlitePool, album_id: i64) -> Result<Option<AlbumWithPhotos>> {
    let rows: Vec<LeftJoinRow> = sqlx::query_as(
        r#"
        SELECT a.id, a.name, a.cover_url, p.id AS photo_id, p.title, p.url, p.thumbnail_url
        FROM albums a
        LEFT JOIN photos p ON p.album_id = a.id
        WHERE a.id = ?
        ORDER BY p.id ASC
        "#,
    )
    .bind(album_id)
    .fetch_all(pool)
    .await
    .or_raise(|| ErrorKind::Database)?;
    Ok(group_photos_by_album(rows).into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn album(id: i64) -> Album {
        Album { id, name: format!("Album {id}"), cover_url: format!("cover-{id}") }
    }

    fn photo(id: i64, album_id: i64) -> Photo {
        Photo {
            id,
            album_id,
            title: format!("photo {id}"),
            url: format!("url-{id}"),
            thumbnail_url: format!("thumb-{id}"),
        }
    }

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[tokio::test]
    async fn test_replace_all_and_read_back() {
        let repo = repo().await;
        repo.replace_all(&[album(1), album(2)], &[photo(10, 1), photo(11, 1), photo(20, 2)])
            .await
            .unwrap();
        let albums = repo.albums_ordered().await.unwrap();
        assert_eq!(albums.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
        let photos = repo.photos_of_album(1).await.unwrap();
        assert_eq!(photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(repo.photo_by_id(20).await.unwrap().unwrap().album_id, 2);
    }

    #[tokio::test]
    async fn test_replace_all_swaps_whole_dataset() {
        let repo = repo().await;
        repo.replace_all(&[album(1)], &[photo(10, 1)]).await.unwrap();
        repo.replace_all(&[album(2)], &[photo(20, 2)]).await.unwrap();
        let albums = repo.albums_ordered().await.unwrap();
        assert_eq!(albums.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
        assert!(repo.photo_by_id(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_all_rejects_orphan_photo_atomically() {
        let repo = repo().await;
        repo.replace_all(&[album(1)], &[photo(10, 1)]).await.unwrap();
        // Photo 99 references album 5 which is not part of the new dataset.
        let err = repo
            .replace_all(&[album(2)], &[photo(20, 2), photo(99, 5)])
            .await
            .unwrap_err();
        assert!(matches!(*err, ErrorKind::Constraint), "got: {err}");
        // The failed refresh left the previous generation fully intact.
        let albums = repo.albums_ordered().await.unwrap();
        assert_eq!(albums.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1]);
        assert!(repo.photo_by_id(10).await.unwrap().is_some());
        assert!(repo.photo_by_id(20).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_input_last_occurrence_wins() {
        let repo = repo().await;
        let mut replacement = album(1);
        replacement.name = "second".to_string();
        let mut replacement_photo = photo(10, 1);
        replacement_photo.title = "second".to_string();
        repo.replace_all(&[album(1), replacement], &[photo(10, 1), replacement_photo])
            .await
            .unwrap();
        assert_eq!(repo.albums_ordered().await.unwrap()[0].name, "second");
        assert_eq!(repo.photo_by_id(10).await.unwrap().unwrap().title, "second");
    }

    #[tokio::test]
    async fn test_clear_albums_cascades_to_photos() {
        let repo = repo().await;
        repo.replace_all(&[album(1), album(2)], &[photo(10, 1), photo(20, 2)]).await.unwrap();
        repo.clear_albums().await.unwrap();
        assert!(repo.albums_ordered().await.unwrap().is_empty());
        assert!(repo.photo_by_id(10).await.unwrap().is_none());
        assert!(repo.photo_by_id(20).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_on_empty_store_is_a_noop() {
        let repo = repo().await;
        repo.clear_photos().await.unwrap();
        repo.clear_albums().await.unwrap();
        repo.clear_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_errors() {
        let repo = repo().await;
        assert!(repo.photos_of_album(404).await.unwrap().is_empty());
        assert!(repo.photo_by_id(404).await.unwrap().is_none());
        assert!(repo.album_with_photos(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_composite_views_join_and_order() {
        let repo = repo().await;
        repo.replace_all(
            &[album(2), album(1)],
            &[photo(21, 2), photo(11, 1), photo(10, 1)],
        )
        .await
        .unwrap();
        let composites = repo.albums_with_photos().await.unwrap();
        assert_eq!(composites.len(), 2);
        assert_eq!(composites[0].album.id, 1);
        assert_eq!(composites[0].photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![10, 11]);
        let single = repo.album_with_photos(2).await.unwrap().unwrap();
        assert_eq!(single.photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![21]);
    }

    #[tokio::test]
    async fn test_album_without_photos_appears_in_composites() {
        let repo = repo().await;
        repo.replace_all(&[album(1)], &[]).await.unwrap();
        let composites = repo.albums_with_photos().await.unwrap();
        assert_eq!(composites.len(), 1);
        assert!(composites[0].photos.is_empty());
    }
}
