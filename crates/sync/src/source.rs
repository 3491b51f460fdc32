//! The remote collection as an abstract collaborator.
//!
//! The orchestrator only ever asks for "the whole flat record list, or a
//! transport error". Protocol, headers, and retry policy belong to whatever
//! implements [`PhotoSource`] in the embedding application.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

/// One flat record as served by the remote endpoint.
///
/// Field names follow the wire's camelCase (`albumId`, `thumbnailUrl`).
/// Records arrive ungrouped; the refresh pass groups them by `album_id` and
/// synthesizes the album rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatPhoto {
    pub id: i64,
    pub album_id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}

/// Fetches the complete remote collection.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Fetch every flat record, in the remote's own order.
    ///
    /// Failures surface as [`ErrorKind::Transport`](crate::error::ErrorKind::Transport);
    /// an empty list is a valid response meaning the remote collection is
    /// empty.
    async fn fetch(&self) -> Result<Vec<FlatPhoto>>;
}

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::RwLock;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::{FlatPhoto, PhotoSource};
    use crate::error::{ErrorKind, Result};

    /// In-memory remote source for testing.
    ///
    /// Serves a preloaded record list, or a transport error when switched
    /// into failure mode. Interior mutability keeps the trait's `&self`
    /// contract without external synchronisation.
    #[derive(Debug, Default)]
    pub struct MockSource {
        photos: RwLock<Vec<FlatPhoto>>,
        failing: AtomicBool,
    }

    impl MockSource {
        /// A source that serves the given records on every fetch.
        pub fn with_photos(photos: impl IntoIterator<Item = FlatPhoto>) -> Self {
            Self { photos: RwLock::new(photos.into_iter().collect()), failing: AtomicBool::new(false) }
        }

        /// A source whose every fetch fails with a transport error.
        pub fn failing() -> Self {
            Self { photos: RwLock::new(Vec::new()), failing: AtomicBool::new(true) }
        }

        /// Swap the served records, e.g. to simulate remote churn between
        /// refreshes.
        pub fn set_photos(&self, photos: impl IntoIterator<Item = FlatPhoto>) {
            *self.photos.write().expect("mock source lock poisoned") = photos.into_iter().collect();
        }

        /// Toggle failure mode.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PhotoSource for MockSource {
        async fn fetch(&self) -> Result<Vec<FlatPhoto>> {
            if self.failing.load(Ordering::SeqCst) {
                exn::bail!(ErrorKind::Transport("mock source in failure mode".to_string()));
            }
            Ok(self.photos.read().expect("mock source lock poisoned").clone())
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockSource;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_flat_photo_decodes_wire_shape() {
        let json = r#"{
            "albumId": 1,
            "id": 10,
            "title": "accusamus beatae ad facilis",
            "url": "https://placehold.co/600x600",
            "thumbnailUrl": "https://placehold.co/150x150"
        }"#;
        let photo: FlatPhoto = serde_json::from_str(json).unwrap();
        assert_eq!(photo.album_id, 1);
        assert_eq!(photo.id, 10);
        assert_eq!(photo.thumbnail_url, "https://placehold.co/150x150");
    }

    #[tokio::test]
    async fn test_mock_source_serves_and_fails() {
        let source = MockSource::with_photos([FlatPhoto {
            id: 1,
            album_id: 1,
            title: String::new(),
            url: String::new(),
            thumbnail_url: String::new(),
        }]);
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        source.set_failing(true);
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Transport(_)), "got: {err}");
    }
}
