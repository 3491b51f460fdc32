/// A group of photos mirrored from the remote collection.
///
/// Albums are synthesized during refresh rather than fetched: the remote
/// source only serves flat photo records, so `name` is a placeholder derived
/// from the id and `cover_url` is borrowed from one of the album's photos.
///
/// The column layout matches the struct 1:1, so the model doubles as its own
/// database row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub cover_url: String,
}
