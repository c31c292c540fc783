mod audio;
mod config;
mod db;
mod error;
mod evaluate;
mod fingerprint;
mod importer;
mod matcher;
mod peaks;
mod spectrogram;
mod visualization;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{PipelineParams, SAMPLING_RATE};
use crate::db::PgIndex;
use crate::importer::IdentifyOutcome;

#[derive(Parser)]
#[command(name = "hibiki", version, about = "Constellation-based music recognition")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the catalog tables in the configured Postgres database.
    Setup,
    /// Fingerprint every audio file in a folder and store the catalog.
    Ingest {
        folder: PathBuf,
        /// 0 = silent, 1 = per-song summary, 2 = dump every hash pair.
        #[arg(short, long, default_value_t = 1)]
        verbose: u8,
    },
    /// Identify an audio clip against the catalog.
    Identify { file: PathBuf },
    /// Measure recognition accuracy with random snippets from a folder.
    Evaluate {
        folder: PathBuf,
        /// Snippets cut from each song.
        #[arg(long, default_value_t = 3)]
        snippets: u32,
        /// Snippet duration in seconds.
        #[arg(long, default_value_t = 10)]
        seconds: u32,
    },
    /// Render a clip's spectrogram and detected peaks to an SVG file.
    Visualize {
        file: PathBuf,
        #[arg(short, long, default_value = "spectrogram.svg")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Setup => {
            let mut index = PgIndex::connect()?;
            index.setup()?;
            println!("Catalog schema is ready.");
        }
        Command::Ingest { folder, verbose } => {
            let mut index = PgIndex::connect()?;
            let report = importer::ingest_folder(&mut index, &folder, verbose)?;
            println!(
                "Ingest finished: {} stored, {} skipped.",
                report.stored, report.skipped
            );
        }
        Command::Identify { file } => {
            let mut index = PgIndex::connect()?;
            match importer::identify_file(&mut index, &file)? {
                IdentifyOutcome::NoFingerprint => println!("No fingerprint detected..."),
                IdentifyOutcome::NoMatch => println!("No song detected..."),
                IdentifyOutcome::Match { outcome, metadata } => {
                    match metadata {
                        Some(meta) => {
                            println!("Song identified: {} - {}", meta.title, meta.artists);
                            println!("   album: {}", meta.album);
                            println!("   cover: {}", meta.cover);
                            println!("   url:   {}", meta.url);
                        }
                        None => println!("Song identified: id {}", outcome.best),
                    }
                    if let Some(runner_up) = outcome.runner_up {
                        println!("   runner-up: song {runner_up}");
                    }
                }
            }
        }
        Command::Evaluate {
            folder,
            snippets,
            seconds,
        } => {
            let mut index = PgIndex::connect()?;
            evaluate::run_snippet_test(&mut index, &folder, snippets, seconds)?;
        }
        Command::Visualize { file, output } => {
            let pcm = audio::load_mono(&file, SAMPLING_RATE)?;
            let params = PipelineParams::ingest();
            let spec = spectrogram::build(&pcm, SAMPLING_RATE, params.window_size, params.overlap_ratio);
            let constellation =
                peaks::find(&spec.data, params.neighborhood_size, params.amp_threshold_db);

            let name = file
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            visualization::write_spectrogram_svg(&spec, &constellation, &output, &name)?;
            println!("Wrote {} ({} peaks).", output.display(), constellation.len());
        }
    }
    Ok(())
}
