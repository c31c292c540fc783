//! Recognition accuracy harness: cut random snippets out of every cataloged
//! file and check the matcher finds the right song. Snippets are sliced from
//! the decoded PCM directly, so the whole pipeline after decoding is
//! exercised exactly as a real query would be.

use std::path::Path;

use anyhow::Result;
use rand::Rng;

use crate::audio;
use crate::config::{PipelineParams, SAMPLING_RATE};
use crate::db::PgIndex;
use crate::fingerprint;
use crate::importer;
use crate::matcher::{self, HashIndex};

pub fn run_snippet_test(
    index: &mut PgIndex,
    folder: &Path,
    snippets_per_song: u32,
    snippet_secs: u32,
) -> Result<()> {
    let metadata = importer::load_metadata(folder)?;
    let files = importer::audio_files(folder)?;
    let params = PipelineParams::query();
    let mut rng = rand::rng();

    let snippet_len = (snippet_secs as usize) * SAMPLING_RATE as usize;
    let mut total = 0u32;
    let mut correct = 0u32;

    println!("Starting random snippet test...");
    println!("   Snippets per song: {snippets_per_song}");
    println!("   Snippet duration: {snippet_secs}s");

    for file in &files {
        let stem = importer::file_stem(file);
        let expected_title = metadata
            .get(&stem)
            .map(|entry| entry.title.clone())
            .unwrap_or_else(|| stem.clone());

        println!("\n--- Testing: {stem} ---");

        let pcm = match audio::load_mono(file, SAMPLING_RATE) {
            Ok(pcm) => pcm,
            Err(err) => {
                println!("   -> Skipping, decode failed: {err}");
                continue;
            }
        };

        // Leave a little headroom so a snippet never hugs the very end.
        if pcm.len() < snippet_len + 5 * SAMPLING_RATE as usize {
            println!("   -> Skipping, song is too short.");
            continue;
        }

        for i in 0..snippets_per_song {
            total += 1;

            let start = rng.random_range(0..=pcm.len() - snippet_len);
            let start_secs = start as f64 / SAMPLING_RATE as f64;
            print!("   Snippet #{} (starts at {:.1}s): ", i + 1, start_secs);

            let snippet = &pcm[start..start + snippet_len];
            let query = fingerprint::from_pcm(snippet, SAMPLING_RATE, &params);
            if query.is_empty() {
                println!("❌ No fingerprint generated.");
                continue;
            }

            match matcher::identify(&query, index)? {
                Some(outcome) => {
                    let predicted = index
                        .get_song(outcome.best)?
                        .map(|meta| meta.title)
                        .unwrap_or_else(|| format!("song {}", outcome.best));

                    if predicted == expected_title {
                        println!("✅ Correct.");
                        correct += 1;
                    } else {
                        println!("❌ Incorrect, matched '{predicted}'.");
                    }
                }
                None => println!("❌ No match found."),
            }
        }
    }

    println!("\n--- Test finished ---");
    if total > 0 {
        let accuracy = correct as f64 / total as f64 * 100.0;
        println!("   Correct matches: {correct} / {total}");
        println!("   Accuracy: {accuracy:.2}%");
    } else {
        println!("No snippets were tested. Check the folder path.");
    }
    Ok(())
}
