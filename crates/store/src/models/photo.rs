/// A single photo belonging to exactly one album.
///
/// Mirrors the flat remote record unchanged in shape. `album_id` must
/// reference an existing album at commit time; the schema enforces this and
/// cascades album deletion onto photos.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Photo {
    pub id: i64,
    pub album_id: i64,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
}
