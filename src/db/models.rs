use diesel::prelude::*;

use crate::matcher::SongMetadata;

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::db::schema::songs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SongRow {
    pub id: i32,
    pub title: String,
    pub artists: String,
    pub album: String,
    pub lyrics: String,
    pub cover: String,
    pub url: String,
}

impl From<SongRow> for SongMetadata {
    fn from(row: SongRow) -> Self {
        SongMetadata {
            title: row.title,
            artists: row.artists,
            album: row.album,
            lyrics: row.lyrics,
            cover: row.cover,
            url: row.url,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::db::schema::songs)]
pub struct NewSong<'a> {
    pub title: &'a str,
    pub artists: &'a str,
    pub album: &'a str,
    pub lyrics: &'a str,
    pub cover: &'a str,
    pub url: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = crate::db::schema::fingerprints)]
pub struct NewFingerprintRow<'a> {
    pub song_id: i32,
    pub hash: &'a str,
    pub offset: f64,
}
