use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::fingerprint::Fingerprint;

pub type SongId = i32;

/// Catalog-facing description of a song. The core never inspects these
/// fields; the importer validates them before they reach the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub artists: String,
    pub album: String,
    pub lyrics: String,
    pub cover: String,
    pub url: String,
}

/// One stored pair returned by a hash lookup.
#[derive(Debug, Clone, Copy)]
pub struct IndexRow {
    pub song_id: SongId,
    pub offset: f64,
}

/// Contract of the persistent hash store.
///
/// Hashes are opaque byte strings; `lookup_hashes` must be sub-linear in
/// catalog size. Duplicate `(song_id, hash, offset)` rows are allowed, and
/// every duplicate counts as its own collision. Methods take `&mut self` so
/// one connection is never re-entered concurrently.
pub trait HashIndex {
    fn insert_song(&mut self, metadata: &SongMetadata) -> Result<SongId, EngineError>;

    /// Persists every pair of a fingerprint. The fingerprint must already be
    /// bound to a song id.
    fn insert_fingerprint(&mut self, fingerprint: &Fingerprint) -> Result<(), EngineError>;

    /// Returns one row per stored pair whose hash appears in `hashes`.
    /// Row order is unspecified.
    fn lookup_hashes(&mut self, hashes: &HashSet<String>) -> Result<Vec<IndexRow>, EngineError>;

    fn get_song(&mut self, song_id: SongId) -> Result<Option<SongMetadata>, EngineError>;
}

/// Result of an identification: the best-scoring song and, when a second
/// distinct song collided at all, the runner-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub best: SongId,
    pub runner_up: Option<SongId>,
}

/// Collision counts per song, highest first. Equal counts are ordered by
/// ascending song id, so a tie resolves to the oldest catalog entry instead
/// of whatever order the store returned its rows in.
pub fn rank(rows: &[IndexRow]) -> Vec<(SongId, usize)> {
    let mut counts: HashMap<SongId, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.song_id).or_default() += 1;
    }

    let mut ranked: Vec<(SongId, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

/// Scores a query fingerprint against the catalog.
///
/// The distinct hashes of the query are looked up as a set; every stored row
/// matching any of them counts one collision for its song. `Ok(None)` means
/// no stored hash collided, which is a normal outcome, while a query with no
/// hashes at all is an error.
pub fn identify(
    query: &Fingerprint,
    index: &mut impl HashIndex,
) -> Result<Option<MatchOutcome>, EngineError> {
    let hashes: HashSet<String> = query.iter().map(|p| p.hash.clone()).collect();
    if hashes.is_empty() {
        return Err(EngineError::EmptyFingerprint);
    }

    let rows = index.lookup_hashes(&hashes)?;
    if rows.is_empty() {
        return Ok(None);
    }

    let ranked = rank(&rows);
    debug!(
        candidates = ranked.len(),
        best_score = ranked[0].1,
        "collision counts tallied"
    );

    Ok(Some(MatchOutcome {
        best: ranked[0].0,
        runner_up: ranked.get(1).map(|r| r.0),
    }))
}

/// Stores a song and its fingerprint: the index assigns a fresh id, the
/// fingerprint is bound to it and persisted.
pub fn register(
    metadata: &SongMetadata,
    mut fingerprint: Fingerprint,
    index: &mut impl HashIndex,
) -> Result<SongId, EngineError> {
    let song_id = index.insert_song(metadata)?;
    fingerprint.bind_song(song_id);
    index.insert_fingerprint(&fingerprint)?;
    Ok(song_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineParams, SAMPLING_RATE};
    use crate::fingerprint::{self, HashPair};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    /// Reference in-memory implementation of the index contract.
    #[derive(Default)]
    struct MemoryIndex {
        songs: Vec<SongMetadata>,
        postings: HashMap<String, Vec<(SongId, f64)>>,
    }

    impl HashIndex for MemoryIndex {
        fn insert_song(&mut self, metadata: &SongMetadata) -> Result<SongId, EngineError> {
            self.songs.push(metadata.clone());
            Ok(self.songs.len() as SongId)
        }

        fn insert_fingerprint(&mut self, fingerprint: &Fingerprint) -> Result<(), EngineError> {
            let song_id = fingerprint.song_id().ok_or(EngineError::UnboundFingerprint)?;
            for pair in fingerprint {
                self.postings
                    .entry(pair.hash.clone())
                    .or_default()
                    .push((song_id, pair.offset));
            }
            Ok(())
        }

        fn lookup_hashes(
            &mut self,
            hashes: &HashSet<String>,
        ) -> Result<Vec<IndexRow>, EngineError> {
            let mut rows = Vec::new();
            for hash in hashes {
                if let Some(entries) = self.postings.get(hash) {
                    rows.extend(
                        entries
                            .iter()
                            .map(|&(song_id, offset)| IndexRow { song_id, offset }),
                    );
                }
            }
            Ok(rows)
        }

        fn get_song(&mut self, song_id: SongId) -> Result<Option<SongMetadata>, EngineError> {
            Ok(self.songs.get(song_id as usize - 1).cloned())
        }
    }

    fn metadata(title: &str) -> SongMetadata {
        SongMetadata {
            title: title.to_string(),
            artists: "Test Artist".to_string(),
            album: "Test Album".to_string(),
            lyrics: "la la la".to_string(),
            cover: "https://example.com/cover.png".to_string(),
            url: "https://example.com/song".to_string(),
        }
    }

    fn pair(hash: &str, offset: f64) -> HashPair {
        HashPair {
            hash: hash.to_string(),
            offset,
        }
    }

    /// An eight-note ascending melody. Tones sit exactly on even FFT bins
    /// and are synthesized from an integer phase index, so consecutive
    /// analysis frames are bit-identical and tie as local maxima. Each
    /// catalog song gets its own bin offset so no two songs share a
    /// frequency.
    fn melody(bin_offset: usize, noise_amp: f64, seed: u64) -> Vec<f32> {
        let seg_samples = (0.6 * SAMPLING_RATE as f64) as usize;
        let mut rng = StdRng::seed_from_u64(seed);

        let mut pcm = Vec::with_capacity(8 * seg_samples);
        for seg in 0..8usize {
            let bin = 150 + bin_offset + seg * 60;
            for i in 0..seg_samples {
                let phase = (bin * i) % 4096;
                let mut sample = (2.0 * PI * phase as f64 / 4096.0).sin();
                if noise_amp > 0.0 {
                    sample += rng.random_range(-noise_amp..noise_amp);
                }
                pcm.push(sample as f32);
            }
        }
        pcm
    }

    fn ingest_catalog(index: &mut MemoryIndex, songs: usize) -> Vec<SongId> {
        let params = PipelineParams::ingest();
        (0..songs)
            .map(|k| {
                let pcm = melody(8 * k, 0.0, 0);
                let fp = fingerprint::from_pcm(&pcm, SAMPLING_RATE, &params);
                assert!(!fp.is_empty(), "catalog clip {k} fingerprinted to nothing");
                register(&metadata(&format!("song-{k}")), fp, index).unwrap()
            })
            .collect()
    }

    #[test]
    fn empty_fingerprint_is_rejected() {
        let mut index = MemoryIndex::default();
        let err = identify(&Fingerprint::new(), &mut index).unwrap_err();
        assert!(matches!(err, EngineError::EmptyFingerprint));
    }

    #[test]
    fn unknown_hashes_yield_no_match() {
        let mut index = MemoryIndex::default();
        let mut query = Fingerprint::new();
        query.push(pair("1.00|2.00|0.5", 0.0));

        assert_eq!(identify(&query, &mut index).unwrap(), None);
    }

    #[test]
    fn unbound_fingerprint_cannot_be_inserted() {
        let mut index = MemoryIndex::default();
        let mut fp = Fingerprint::new();
        fp.push(pair("1.00|2.00|0.5", 0.0));

        let err = index.insert_fingerprint(&fp).unwrap_err();
        assert!(matches!(err, EngineError::UnboundFingerprint));
    }

    #[test]
    fn rank_orders_by_count_then_song_id() {
        let rows = [
            IndexRow { song_id: 9, offset: 0.0 },
            IndexRow { song_id: 9, offset: 1.0 },
            IndexRow { song_id: 3, offset: 0.0 },
            IndexRow { song_id: 3, offset: 2.0 },
            IndexRow { song_id: 5, offset: 0.0 },
        ];

        let ranked = rank(&rows);
        // 3 and 9 tie on two collisions; the smaller id wins.
        assert_eq!(ranked, vec![(3, 2), (9, 2), (5, 1)]);
    }

    #[test]
    fn tied_songs_resolve_to_the_smallest_id() {
        let mut index = MemoryIndex::default();

        let mut fp = Fingerprint::new();
        fp.push(pair("100.00|200.00|0.5", 0.0));
        fp.push(pair("200.00|300.00|0.5", 0.5));

        let a = register(&metadata("twin-a"), fp.clone(), &mut index).unwrap();
        let b = register(&metadata("twin-b"), fp.clone(), &mut index).unwrap();
        assert!(a < b);

        let outcome = identify(&fp, &mut index).unwrap().unwrap();
        assert_eq!(outcome.best, a);
        assert_eq!(outcome.runner_up, Some(b));
    }

    #[test]
    fn duplicate_rows_each_count_as_a_collision() {
        let mut index = MemoryIndex::default();

        let mut loud = Fingerprint::new();
        for _ in 0..3 {
            loud.push(pair("100.00|200.00|0.5", 0.0));
        }
        let mut quiet = Fingerprint::new();
        quiet.push(pair("100.00|200.00|0.5", 0.0));
        quiet.push(pair("900.00|901.00|0.1", 0.0));

        let a = register(&metadata("repeats"), loud, &mut index).unwrap();
        let b = register(&metadata("distinct"), quiet, &mut index).unwrap();

        let mut query = Fingerprint::new();
        query.push(pair("100.00|200.00|0.5", 0.0));

        let rows = index
            .lookup_hashes(&query.iter().map(|p| p.hash.clone()).collect())
            .unwrap();
        let ranked = rank(&rows);
        assert_eq!(ranked[0], (a, 3));
        assert_eq!(ranked[1], (b, 1));
    }

    #[test]
    fn round_trip_wins_with_a_strict_margin() {
        let mut index = MemoryIndex::default();
        let ids = ingest_catalog(&mut index, 10);

        let params = PipelineParams::ingest();
        let query_pcm = melody(0, 0.0, 0);
        let query = fingerprint::from_pcm(&query_pcm, SAMPLING_RATE, &params);

        let rows = index
            .lookup_hashes(&query.iter().map(|p| p.hash.clone()).collect())
            .unwrap();
        let ranked = rank(&rows);

        assert_eq!(ranked[0].0, ids[0]);
        if let Some(second) = ranked.get(1) {
            assert!(ranked[0].1 > second.1, "no strict margin: {ranked:?}");
        }

        let outcome = identify(&query, &mut index).unwrap().unwrap();
        assert_eq!(outcome.best, ids[0]);
    }

    #[test]
    fn noisy_query_still_finds_its_song() {
        let mut index = MemoryIndex::default();
        let ids = ingest_catalog(&mut index, 10);

        // Uniform white noise sized for -20 dB SNR against a unit sine:
        // signal power 0.5, noise power a^2 / 3 = 50.
        let noise_amp = 150.0f64.sqrt();
        let noisy_pcm = melody(0, noise_amp, 42);
        let query = fingerprint::from_pcm(&noisy_pcm, SAMPLING_RATE, &PipelineParams::ingest());
        assert!(!query.is_empty());

        let outcome = identify(&query, &mut index).unwrap();
        assert_eq!(outcome.map(|o| o.best), Some(ids[0]));
    }

    #[test]
    fn register_binds_and_stores() {
        let mut index = MemoryIndex::default();
        let mut fp = Fingerprint::new();
        fp.push(pair("440.00|880.00|1.5", 0.25));

        let id = register(&metadata("bound"), fp, &mut index).unwrap();
        assert_eq!(index.get_song(id).unwrap().unwrap().title, "bound");

        let mut query = Fingerprint::new();
        query.push(pair("440.00|880.00|1.5", 0.0));
        let rows = index
            .lookup_hashes(&query.iter().map(|p| p.hash.clone()).collect())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].song_id, id);
        assert_eq!(rows[0].offset, 0.25);
    }
}
