use std::collections::HashSet;
use std::env;

use diesel::prelude::*;
use dotenvy::dotenv;
use tracing::{debug, info};

use crate::db::models::{NewFingerprintRow, NewSong, SongRow};
use crate::db::schema::{fingerprints, songs};
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::matcher::{HashIndex, IndexRow, SongId, SongMetadata};

// Keeps each statement well under the Postgres bind-parameter limit.
const BATCH_SIZE: usize = 10_000;

/// Postgres-backed hash index. Owns its connection; acquire one per thread.
pub struct PgIndex {
    conn: PgConnection,
}

impl PgIndex {
    /// Connects using `DATABASE_URL`, read from the environment or a `.env`
    /// file next to the binary.
    pub fn connect() -> Result<Self, EngineError> {
        dotenv().ok();

        let url = env::var("DATABASE_URL").map_err(|_| EngineError::MissingDatabaseUrl)?;
        let conn = PgConnection::establish(&url)?;
        Ok(Self { conn })
    }

    /// Creates the catalog tables and the lookup index if they are missing.
    pub fn setup(&mut self) -> Result<(), EngineError> {
        diesel::sql_query(
            "CREATE TABLE IF NOT EXISTS songs (
                id SERIAL PRIMARY KEY,
                title VARCHAR(50) NOT NULL,
                artists VARCHAR(50) NOT NULL,
                album VARCHAR(50) NOT NULL,
                lyrics VARCHAR(10000) NOT NULL,
                cover VARCHAR(500) NOT NULL,
                url VARCHAR(500) NOT NULL
            )",
        )
        .execute(&mut self.conn)?;

        diesel::sql_query(
            "CREATE TABLE IF NOT EXISTS fingerprints (
                id SERIAL PRIMARY KEY,
                song_id INTEGER NOT NULL REFERENCES songs(id),
                hash VARCHAR(150) NOT NULL,
                \"offset\" FLOAT NOT NULL
            )",
        )
        .execute(&mut self.conn)?;

        diesel::sql_query(
            "CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints(hash)",
        )
        .execute(&mut self.conn)?;

        info!("catalog schema ready");
        Ok(())
    }

    /// True when a song with this title and artists is already cataloged.
    pub fn song_exists(&mut self, title: &str, artists: &str) -> Result<bool, EngineError> {
        let count: i64 = songs::table
            .filter(songs::title.eq(title))
            .filter(songs::artists.eq(artists))
            .count()
            .get_result(&mut self.conn)?;
        Ok(count > 0)
    }
}

impl HashIndex for PgIndex {
    fn insert_song(&mut self, metadata: &SongMetadata) -> Result<SongId, EngineError> {
        let new_song = NewSong {
            title: &metadata.title,
            artists: &metadata.artists,
            album: &metadata.album,
            lyrics: &metadata.lyrics,
            cover: &metadata.cover,
            url: &metadata.url,
        };

        let id = diesel::insert_into(songs::table)
            .values(&new_song)
            .returning(songs::id)
            .get_result::<i32>(&mut self.conn)?;
        Ok(id)
    }

    fn insert_fingerprint(&mut self, fingerprint: &Fingerprint) -> Result<(), EngineError> {
        let song_id = fingerprint.song_id().ok_or(EngineError::UnboundFingerprint)?;

        let rows: Vec<NewFingerprintRow> = fingerprint
            .iter()
            .map(|pair| NewFingerprintRow {
                song_id,
                hash: &pair.hash,
                offset: pair.offset,
            })
            .collect();

        let inserted = self.conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let mut total = 0;
            for batch in rows.chunks(BATCH_SIZE) {
                total += diesel::insert_into(fingerprints::table)
                    .values(batch)
                    .execute(conn)?;
            }
            Ok(total)
        })?;

        debug!(song_id, rows = inserted, "fingerprint persisted");
        Ok(())
    }

    fn lookup_hashes(&mut self, hashes: &HashSet<String>) -> Result<Vec<IndexRow>, EngineError> {
        let query_hashes: Vec<&str> = hashes.iter().map(String::as_str).collect();

        let mut rows = Vec::new();
        for batch in query_hashes.chunks(BATCH_SIZE) {
            let matches: Vec<(i32, f64)> = fingerprints::table
                .filter(fingerprints::hash.eq_any(batch.to_vec()))
                .select((fingerprints::song_id, fingerprints::offset))
                .load(&mut self.conn)?;

            rows.extend(
                matches
                    .into_iter()
                    .map(|(song_id, offset)| IndexRow { song_id, offset }),
            );
        }

        debug!(queried = query_hashes.len(), matched = rows.len(), "hash lookup");
        Ok(rows)
    }

    fn get_song(&mut self, song_id: SongId) -> Result<Option<SongMetadata>, EngineError> {
        let row = songs::table
            .find(song_id)
            .select(SongRow::as_select())
            .first::<SongRow>(&mut self.conn)
            .optional()?;
        Ok(row.map(SongMetadata::from))
    }
}
