//! The refresh pass: fetch, group, replace.

use exn::ResultExt;
use shoebox_store::{Album, Photo, Repository};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

use crate::error::{ErrorKind, Result};
use crate::source::{FlatPhoto, PhotoSource};

/// Orchestrates reconciliation between the remote collection and the local
/// cache.
///
/// A refresh is all-or-nothing from the consumer's perspective: either the
/// whole dataset is swapped for the remote's current state in one
/// transaction, or the error is reported and the previous dataset stays
/// fully intact. Running it again against an unchanged remote is a no-op in
/// effect (though it still performs a full replace).
///
/// The syncer holds no state and performs no locking; callers triggering
/// refreshes concurrently are expected to guard with their own
/// "refresh in progress" flag and drop the second trigger, as the original
/// application's view-model does.
#[derive(Debug, Clone)]
pub struct Syncer<S> {
    source: S,
    repo: Repository,
}

impl<S: PhotoSource> Syncer<S> {
    pub fn new(source: S, repo: Repository) -> Self {
        Self { source, repo }
    }

    /// Fetch the remote collection and replace the local dataset with it.
    ///
    /// An empty remote collection empties the local cache. Any failure,
    /// transport or storage, is raised as [`ErrorKind::Refresh`] wrapping
    /// the cause, with local state untouched. On success the store's change
    /// notifications drive live queries and invalidate open pagers.
    #[instrument(name = "refresh_albums", skip_all)]
    pub async fn refresh(&self) -> Result<()> {
        let records = self.source.fetch().await.or_raise(|| ErrorKind::Refresh)?;
        if records.is_empty() {
            warn!("remote collection is empty; clearing local cache");
            return self.repo.clear_all().await.or_raise(|| ErrorKind::Refresh);
        }
        let (albums, photos) = group_into_albums(records);
        debug!(albums = albums.len(), photos = photos.len(), "storing refreshed dataset");
        self.repo.replace_all(&albums, &photos).await.or_raise(|| ErrorKind::Refresh)
    }
}

/// Group flat records by album id and synthesize the album rows.
///
/// The remote serves no album metadata, so `name` is the placeholder
/// `"Album {id}"` and `cover_url` is the thumbnail of the group's first
/// record in fetch order. Fetch order is not guaranteed stable upstream, so
/// which photo provides the cover is inherited implementation-defined
/// behaviour, not a deterministic tie-break.
fn group_into_albums(records: Vec<FlatPhoto>) -> (Vec<Album>, Vec<Photo>) {
    let mut albums: Vec<Album> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut photos: Vec<Photo> = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.album_id) {
            albums.push(Album {
                id: record.album_id,
                name: format!("Album {}", record.album_id),
                cover_url: record.thumbnail_url.clone(),
            });
        }
        photos.push(Photo {
            id: record.id,
            album_id: record.album_id,
            title: record.title,
            url: record.url,
            thumbnail_url: record.thumbnail_url,
        });
    }
    (albums, photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockSource;
    use futures::StreamExt;
    use futures::pin_mut;
    use shoebox_store::Database;
    use std::time::Duration;
    use tokio::time::timeout;

    fn flat(id: i64, album_id: i64, thumbnail: &str) -> FlatPhoto {
        FlatPhoto {
            id,
            album_id,
            title: format!("photo {id}"),
            url: format!("u{id}"),
            thumbnail_url: thumbnail.to_string(),
        }
    }

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[test]
    fn test_grouping_synthesizes_album_from_first_record() {
        let (albums, photos) = group_into_albums(vec![flat(10, 1, "t1"), flat(11, 1, "t2")]);
        assert_eq!(albums, vec![Album {
            id: 1,
            name: "Album 1".to_string(),
            cover_url: "t1".to_string()
        }]);
        assert_eq!(photos.len(), 2);
        assert!(photos.iter().all(|p| p.album_id == 1));
    }

    #[test]
    fn test_grouping_cover_follows_fetch_order_not_id_order() {
        // Photo 11 arrives first, so its thumbnail wins even though 10 < 11.
        let (albums, _) = group_into_albums(vec![flat(11, 1, "first"), flat(10, 1, "second")]);
        assert_eq!(albums[0].cover_url, "first");
    }

    #[test]
    fn test_grouping_interleaved_albums() {
        let records = vec![flat(10, 1, "a"), flat(20, 2, "b"), flat(11, 1, "c")];
        let (albums, photos) = group_into_albums(records);
        assert_eq!(albums.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(photos.len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_stores_grouped_dataset() {
        let repo = repo().await;
        let syncer = Syncer::new(MockSource::with_photos([flat(10, 1, "t1"), flat(11, 1, "t2")]), repo.clone());
        syncer.refresh().await.unwrap();
        let albums = repo.albums_ordered().await.unwrap();
        assert_eq!(albums, vec![Album {
            id: 1,
            name: "Album 1".to_string(),
            cover_url: "t1".to_string()
        }]);
        let photos = repo.photos_of_album(1).await.unwrap();
        assert_eq!(photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_refresh_from_empty_remote_clears_cache() {
        let repo = repo().await;
        let source = MockSource::with_photos([flat(10, 1, "t1")]);
        let syncer = Syncer::new(source, repo.clone());
        syncer.refresh().await.unwrap();
        syncer.source.set_photos([]);
        syncer.refresh().await.unwrap();
        assert!(repo.albums_ordered().await.unwrap().is_empty());
        assert!(repo.photo_by_id(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_preserves_local_state() {
        let repo = repo().await;
        let source = MockSource::with_photos([flat(10, 1, "t1")]);
        let syncer = Syncer::new(source, repo.clone());
        syncer.refresh().await.unwrap();
        syncer.source.set_failing(true);
        let err = syncer.refresh().await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Refresh), "got: {err}");
        // The last good snapshot is still served.
        assert_eq!(repo.albums_ordered().await.unwrap().len(), 1);
        assert!(repo.photo_by_id(10).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_replaces_stale_records_entirely() {
        let repo = repo().await;
        let source = MockSource::with_photos([flat(10, 1, "t1")]);
        let syncer = Syncer::new(source, repo.clone());
        syncer.refresh().await.unwrap();
        // Remote now serves a different dataset; id 10 changed album & title.
        syncer.source.set_photos([flat(10, 2, "t9"), flat(20, 2, "t2")]);
        syncer.refresh().await.unwrap();
        let albums = repo.albums_ordered().await.unwrap();
        assert_eq!(albums.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
        let moved = repo.photo_by_id(10).await.unwrap().unwrap();
        assert_eq!(moved.album_id, 2);
        assert_eq!(moved.thumbnail_url, "t9");
    }

    #[tokio::test]
    async fn test_refresh_drives_live_queries() {
        let repo = repo().await;
        let source = MockSource::with_photos([flat(10, 1, "t1")]);
        let syncer = Syncer::new(source, repo.clone());
        let stream = repo.watch_albums_with_photos();
        pin_mut!(stream);
        let initial = timeout(Duration::from_secs(5), stream.next()).await.unwrap().unwrap().unwrap();
        assert!(initial.is_empty());
        syncer.refresh().await.unwrap();
        let refreshed = timeout(Duration::from_secs(5), stream.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].album.name, "Album 1");
    }
}
