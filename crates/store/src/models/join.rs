use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::models::{Album, Photo};

/// An album paired with its photos, ordered by photo id ascending.
///
/// Assembled at query time from an explicit LEFT JOIN; an album with no
/// photos has an empty `photos` vec rather than being absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumWithPhotos {
    pub album: Album,
    pub photos: Vec<Photo>,
}

/// One row of `albums LEFT JOIN photos`.
///
/// The photo side is NULL for albums with no photos, so its columns decode
/// as one unit: either all present or all absent. The photo id is selected
/// as `photo_id` to avoid clashing with the album's `id` column.
pub(crate) struct LeftJoinRow {
    pub(crate) album: Album,
    pub(crate) photo: Option<Photo>,
}

impl sqlx::FromRow<'_, SqliteRow> for LeftJoinRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let album = Album {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            cover_url: row.try_get("cover_url")?,
        };
        let photo_id: Option<i64> = row.try_get("photo_id")?;
        let title: Option<String> = row.try_get("title")?;
        let url: Option<String> = row.try_get("url")?;
        let thumbnail_url: Option<String> = row.try_get("thumbnail_url")?;
        let photo = match (photo_id, title, url, thumbnail_url) {
            (Some(photo_id), Some(title), Some(url), Some(thumbnail_url)) => Some(Photo {
                id: photo_id,
                album_id: album.id,
                title,
                url,
                thumbnail_url,
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "photo columns".to_string(),
                    source: Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "LEFT JOIN photo columns are partially NULL",
                    )),
                });
            },
        };
        Ok(LeftJoinRow { album, photo })
    }
}

/// Group ordered join rows into composite views.
///
/// Relies on the rows arriving ordered by album id (then photo id), which
/// the join queries guarantee; grouping is a single sequential pass so the
/// ordering survives.
pub(crate) fn group_photos_by_album(rows: Vec<LeftJoinRow>) -> Vec<AlbumWithPhotos> {
    let mut grouped: Vec<AlbumWithPhotos> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some(current) if current.album.id == row.album.id => {
                if let Some(photo) = row.photo {
                    current.photos.push(photo);
                }
            },
            _ => {
                grouped.push(AlbumWithPhotos {
                    album: row.album,
                    photos: row.photo.into_iter().collect(),
                });
            },
        }
    }
    grouped
}
