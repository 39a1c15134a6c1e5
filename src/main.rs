//! `sivana` — landmark-pair acoustic fingerprinting CLI (spec.md §6.4).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sivana::config::EngineConfig;
use sivana::error::EngineError;
use sivana::index::FingerprintIndex;
use sivana::ingest::ingest_folder;
use sivana::matcher::MatchOutcome;
use sivana::query::identify_clip;

#[derive(Parser)]
#[command(name = "sivana", author, version, about = "Landmark-pair acoustic fingerprinting engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint every recording in a folder into a reference index.
    Ingest {
        /// Folder of reference recordings to decode and fingerprint.
        folder: PathBuf,
        /// Path to the fingerprint index (created if it doesn't exist).
        index_path: PathBuf,
        /// Optional TOML file overriding the default fingerprinting parameters.
        #[arg(long)]
        config: Option<String>,
    },
    /// Identify a query clip against an existing reference index.
    Identify {
        /// Audio file to identify.
        audio_path: PathBuf,
        /// Path to an existing fingerprint index.
        index_path: PathBuf,
        /// Seconds of the query clip to use, starting from its beginning.
        /// Defaults to the configured `clip_len` (spec.md §6.3).
        #[arg(long)]
        clip_len: Option<f32>,
        /// Optional TOML file overriding the default fingerprinting parameters.
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() -> ExitCode {
    sivana::logging::init();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Ingest { folder, index_path, config } => run_ingest(&folder, &index_path, config.as_deref()),
        Command::Identify { audio_path, index_path, clip_len, config } => {
            run_identify(&audio_path, &index_path, clip_len, config.as_deref())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    }
}

/// Maps the CLI boundary's `anyhow::Error` to the exit codes spec.md §6.4
/// assigns: 3 I/O, 4 decode, 5 index (downcast to the engine's own
/// taxonomy); anything else — including a malformed `--config` file, which
/// never downcasts to `EngineError` — falls into 2, the same bucket clap
/// itself uses for argument errors.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Io(_)) => ExitCode::from(3),
        Some(EngineError::Decode(_)) => ExitCode::from(4),
        Some(EngineError::Index(_)) => ExitCode::from(5),
        None => ExitCode::from(2),
    }
}

fn run_ingest(folder: &Path, index_path: &Path, config_file: Option<&str>) -> anyhow::Result<()> {
    let config = EngineConfig::load(config_file).context("loading fingerprinting configuration")?;
    let mut index = FingerprintIndex::open(index_path)?;
    let report = ingest_folder(folder, &mut index, &config, &|| false)?;

    println!(
        "ingested {} recording(s): {} fingerprints written, {} corrupt, {} too thin, {} already present",
        report.songs_ingested,
        report.fingerprints_written,
        report.corrupt_files,
        report.empty_fingerprints,
        report.duplicates_skipped,
    );
    Ok(())
}

fn run_identify(
    audio_path: &Path,
    index_path: &Path,
    clip_len: Option<f32>,
    config_file: Option<&str>,
) -> anyhow::Result<()> {
    let config = EngineConfig::load(config_file).context("loading fingerprinting configuration")?;
    let clip_len = clip_len.unwrap_or(config.clip_len);
    let index = FingerprintIndex::open(index_path)?;

    match identify_clip(audio_path, &index, clip_len, &config)? {
        MatchOutcome::Match { song_name, score, alignment_confidence, density_confidence, .. } => {
            println!(
                "best match: {song_name} (score={score}, alignment_confidence={alignment_confidence:.3}, density_confidence={density_confidence:.3})"
            );
        }
        MatchOutcome::NoMatch => {
            println!("no match (score=0, confidence=0.000)");
        }
    }
    Ok(())
}
