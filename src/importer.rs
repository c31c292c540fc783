//! Folder ingestion and file identification drivers.
//!
//! Song metadata travels with the audio as a `song_details.json` next to the
//! files, keyed by file stem. Missing entries are bootstrapped with
//! placeholder values; a song is only stored once its entry has been filled
//! in and passes the length and URL checks. The core pipeline never sees any
//! of this.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::audio;
use crate::config::{PipelineParams, SAMPLING_RATE};
use crate::db::PgIndex;
use crate::error::EngineError;
use crate::fingerprint;
use crate::matcher::{self, HashIndex, MatchOutcome, SongMetadata};

pub const METADATA_FILE: &str = "song_details.json";
const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "flac"];

// Placeholder values written when an entry is bootstrapped; an entry still
// carrying any of them is considered unfilled and will not be imported.
const DEFAULT_ARTISTS: &str = "Unknown";
const DEFAULT_ALBUM: &str = "Unknown";
const DEFAULT_LYRICS: &str = "Lyrics not available";
const DEFAULT_COVER: &str = "URL for cover image";
const DEFAULT_URL: &str = "URL for song video";

const MAX_TITLE: usize = 50;
const MAX_ARTISTS: usize = 50;
const MAX_ALBUM: usize = 50;
const MAX_LYRICS: usize = 10_000;
const MAX_COVER: usize = 500;
const MAX_URL: usize = 500;

#[derive(Debug, Default)]
pub struct IngestReport {
    pub stored: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum IdentifyOutcome {
    /// The clip produced no hashes at all (silence, or too short).
    NoFingerprint,
    /// Hashes were produced but nothing in the catalog collided.
    NoMatch,
    Match {
        outcome: MatchOutcome,
        metadata: Option<SongMetadata>,
    },
}

fn default_metadata(stem: &str) -> SongMetadata {
    SongMetadata {
        title: stem.to_string(),
        artists: DEFAULT_ARTISTS.to_string(),
        album: DEFAULT_ALBUM.to_string(),
        lyrics: DEFAULT_LYRICS.to_string(),
        cover: DEFAULT_COVER.to_string(),
        url: DEFAULT_URL.to_string(),
    }
}

fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => rest.split('/').next().is_some_and(|host| host.contains('.')),
        None => false,
    }
}

/// Checks an entry is complete: placeholders replaced, lengths within the
/// catalog column limits, cover and url pointing somewhere real.
pub fn validate(metadata: &SongMetadata) -> std::result::Result<(), String> {
    for (field, value, default) in [
        ("artists", &metadata.artists, DEFAULT_ARTISTS),
        ("album", &metadata.album, DEFAULT_ALBUM),
        ("lyrics", &metadata.lyrics, DEFAULT_LYRICS),
        ("cover", &metadata.cover, DEFAULT_COVER),
        ("url", &metadata.url, DEFAULT_URL),
    ] {
        if value == default {
            return Err(format!("{field} still has its placeholder value"));
        }
    }

    for (field, value, max) in [
        ("title", &metadata.title, MAX_TITLE),
        ("artists", &metadata.artists, MAX_ARTISTS),
        ("album", &metadata.album, MAX_ALBUM),
        ("lyrics", &metadata.lyrics, MAX_LYRICS),
        ("cover", &metadata.cover, MAX_COVER),
        ("url", &metadata.url, MAX_URL),
    ] {
        let len = value.chars().count();
        if len > max {
            return Err(format!("{field} exceeds the maximum length of {max} ({len})"));
        }
    }

    if !is_valid_url(&metadata.cover) {
        return Err("cover is not a valid URL".to_string());
    }
    if !is_valid_url(&metadata.url) {
        return Err("url is not a valid URL".to_string());
    }
    Ok(())
}

pub fn load_metadata(folder: &Path) -> Result<BTreeMap<String, SongMetadata>> {
    let path = folder.join(METADATA_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn save_metadata(folder: &Path, metadata: &BTreeMap<String, SongMetadata>) -> Result<()> {
    let path = folder.join(METADATA_FILE);
    let contents = serde_json::to_string_pretty(metadata)?;
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub(crate) fn audio_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("reading directory {}", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Fingerprints every audio file in a folder and stores the ones with
/// complete metadata.
///
/// `verbose` levels: 0 is silent, 1 logs one line per song, 2 additionally
/// dumps every hash pair. Anything else is refused.
pub fn ingest_folder(index: &mut PgIndex, folder: &Path, verbose: u8) -> Result<IngestReport> {
    if verbose > 2 {
        return Err(EngineError::InvalidVerbose(verbose).into());
    }

    let files = audio_files(folder)?;
    let mut report = IngestReport::default();
    if files.is_empty() {
        println!("No audio files found in {}", folder.display());
        return Ok(report);
    }

    // Bootstrap metadata entries for new files so there is something to edit.
    let mut metadata = load_metadata(folder)?;
    let mut bootstrapped = false;
    for file in &files {
        let stem = file_stem(file);
        if !metadata.contains_key(&stem) {
            metadata.insert(stem.clone(), default_metadata(&stem));
            bootstrapped = true;
        }
    }
    if bootstrapped {
        save_metadata(folder, &metadata)?;
    }

    let params = PipelineParams::ingest();
    for file in &files {
        let stem = file_stem(file);
        let entry = metadata
            .get(&stem)
            .with_context(|| format!("no metadata entry for {stem}"))?;

        if let Err(reason) = validate(entry) {
            println!("Skipping {stem}: {reason}. Edit {METADATA_FILE} and re-run.");
            report.skipped += 1;
            continue;
        }

        if index.song_exists(&entry.title, &entry.artists)? {
            if verbose >= 1 {
                println!("Skipping {stem}: already in the catalog.");
            }
            report.skipped += 1;
            continue;
        }

        let pcm = audio::load_mono(file, SAMPLING_RATE)
            .with_context(|| format!("decoding {}", file.display()))?;
        let fingerprint = fingerprint::from_pcm(&pcm, SAMPLING_RATE, &params);

        if fingerprint.is_empty() {
            println!("Skipping {stem}: no fingerprint could be extracted.");
            report.skipped += 1;
            continue;
        }

        if verbose >= 1 {
            println!(
                "Generated fingerprint for {} ({} pairs).",
                stem,
                fingerprint.len()
            );
        }
        if verbose == 2 {
            for pair in &fingerprint {
                println!("Time: {} - Hash: {}", pair.offset, pair.hash);
            }
        }

        let song_id = matcher::register(entry, fingerprint, index)?;
        info!(song_id, title = %entry.title, "stored fingerprint");
        if verbose >= 1 {
            println!("Stored {} as song {}.", entry.title, song_id);
        }
        report.stored += 1;
    }

    Ok(report)
}

/// Identifies a single audio file against the catalog using the query
/// presets.
pub fn identify_file(index: &mut PgIndex, file: &Path) -> Result<IdentifyOutcome> {
    let pcm = audio::load_mono(file, SAMPLING_RATE)
        .with_context(|| format!("decoding {}", file.display()))?;
    let fingerprint = fingerprint::from_pcm(&pcm, SAMPLING_RATE, &PipelineParams::query());

    if fingerprint.is_empty() {
        return Ok(IdentifyOutcome::NoFingerprint);
    }

    match matcher::identify(&fingerprint, index)? {
        None => Ok(IdentifyOutcome::NoMatch),
        Some(outcome) => {
            let metadata = index.get_song(outcome.best)?;
            Ok(IdentifyOutcome::Match { outcome, metadata })
        }
    }
}
