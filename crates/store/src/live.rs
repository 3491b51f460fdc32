//! Live queries: point reads turned into auto-refreshing streams.
//!
//! Each stream re-runs its query after every committed write to the tables
//! it depends on, and suppresses emissions that are structurally equal to
//! the previous one so consumers never re-render on no-op refreshes.
//! Dropping the stream cancels the subscription and releases its receiver
//! on the change bus.

use async_stream::stream;
use futures::Stream;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{Receiver, error::RecvError};

use crate::Repository;
use crate::error::Result;
use crate::models::{AlbumWithPhotos, Photo};
use crate::repo::{query_album_with_photos, query_albums_with_photos, query_photo_by_id};
use crate::watch::{ChangeBus, Table};

/// The tables a live query's result can be affected by.
enum DependsOn {
    Photos,
    AlbumsAndPhotos,
}

enum Signal {
    Changed,
    Closed,
}

async fn next_change(albums: Option<&mut Receiver<()>>, photos: Option<&mut Receiver<()>>) -> Signal {
    let received = match (albums, photos) {
        (Some(albums), Some(photos)) => tokio::select! {
            received = albums.recv() => received,
            received = photos.recv() => received,
        },
        (Some(albums), None) => albums.recv().await,
        (None, Some(photos)) => photos.recv().await,
        (None, None) => return Signal::Closed,
    };
    match received {
        // A lagged receiver missed events, but recomputing now still lands
        // on the latest committed state.
        Ok(()) | Err(RecvError::Lagged(_)) => Signal::Changed,
        Err(RecvError::Closed) => Signal::Closed,
    }
}

/// Emit the query's current result, then re-emit after every commit to the
/// dependent tables, skipping results equal to the last emission.
fn watch<T, F, Fut>(
    pool: SqlitePool,
    bus: Arc<ChangeBus>,
    depends: DependsOn,
    query: F,
) -> impl Stream<Item = Result<T>>
where
    T: PartialEq + Clone,
    F: Fn(SqlitePool) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    stream! {
        // Subscribe before the first query so commits that land while the
        // query runs are buffered rather than missed.
        let (mut albums_rx, mut photos_rx) = match depends {
            DependsOn::Photos => (None, Some(bus.subscribe(Table::Photos))),
            DependsOn::AlbumsAndPhotos => {
                (Some(bus.subscribe(Table::Albums)), Some(bus.subscribe(Table::Photos)))
            },
        };
        let mut last: Option<T> = None;
        loop {
            match query(pool.clone()).await {
                Ok(value) => {
                    if last.as_ref() != Some(&value) {
                        last = Some(value.clone());
                        yield Ok(value);
                    }
                },
                // Errors are delivered but don't poison the subscription:
                // the next commit triggers a fresh attempt. Forget the last
                // value so the first successful recompute is always emitted
                // and the consumer is never left on the error.
                Err(err) => {
                    last = None;
                    yield Err(err);
                },
            }
            match next_change(albums_rx.as_mut(), photos_rx.as_mut()).await {
                Signal::Changed => continue,
                Signal::Closed => break,
            }
        }
    }
}

impl Repository {
    /// Live view of all albums with their photos, ordered by album id then
    /// photo id. Emits the current result immediately.
    pub fn watch_albums_with_photos(&self) -> impl Stream<Item = Result<Vec<AlbumWithPhotos>>> + use<> {
        watch(self.pool().clone(), Arc::clone(self.bus()), DependsOn::AlbumsAndPhotos, |pool| async move {
            query_albums_with_photos(&pool).await
        })
    }

    /// Live view of one album with its photos. Emits `None` while the id is
    /// unknown, and a value as soon as a refresh provides one.
    pub fn watch_album(&self, album_id: i64) -> impl Stream<Item = Result<Option<AlbumWithPhotos>>> + use<> {
        watch(
            self.pool().clone(),
            Arc::clone(self.bus()),
            DependsOn::AlbumsAndPhotos,
            move |pool| async move { query_album_with_photos(&pool, album_id).await },
        )
    }

    /// Live view of one photo. Emits `None` while the id is unknown.
    pub fn watch_photo(&self, id: i64) -> impl Stream<Item = Result<Option<Photo>>> + use<> {
        watch(self.pool().clone(), Arc::clone(self.bus()), DependsOn::Photos, move |pool| async move {
            query_photo_by_id(&pool, id).await
        })
    }
}
