mod album;
mod join;
mod photo;

pub use self::album::Album;
pub use self::join::AlbumWithPhotos;
pub(crate) use self::join::{LeftJoinRow, group_photos_by_album};
pub use self::photo::Photo;
