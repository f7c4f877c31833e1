pub mod album;
pub mod artist;
pub mod artist_track;
pub mod track;
