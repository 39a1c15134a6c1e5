//! C7: orchestrates C1 -> C2 -> C3 -> C4 -> C5 over a folder of reference
//! recordings (spec.md §4.7).

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::audio_loader;
use crate::config::{EngineConfig, MIN_PEAKS};
use crate::error::{EngineError, EngineResult};
use crate::hashing;
use crate::index::FingerprintIndex;
use crate::peaks;
use crate::spectrogram;

/// Cooperative cancellation hook, consulted once per file (spec.md §5 —
/// ingest is cancellable "between files").
pub type CancelCheck<'a> = dyn Fn() -> bool + 'a;

/// Summary of one [`ingest_folder`] run (spec.md §4.7, §7, §8 scenario S5).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub songs_ingested: usize,
    pub fingerprints_written: usize,
    pub corrupt_files: usize,
    pub empty_fingerprints: usize,
    pub duplicates_skipped: usize,
    pub cancelled: bool,
}

enum IngestOutcome {
    Ingested { fingerprints_written: usize },
    Empty,
    Duplicate,
}

/// Ingests every regular file in `dir` into `index`, in the order
/// `std::fs::read_dir` yields them (spec.md §4.7 — "undefined order").
///
/// Per file: decode -> spectrogram -> peaks -> fingerprint -> persist, with
/// the recording's fingerprints committed in a single transaction (spec.md
/// §4.5) so partial failures never leave a half-ingested recording. A
/// `DecodeError` increments `corrupt_files` and the loop continues (spec.md
/// §7 — "ingest treats this ... as a warning, not an error"); every other
/// error propagates and aborts the whole ingest. A recording already present
/// under the same file-stem name is skipped entirely, matching the
/// idempotent-ingest caller contract of spec.md §8 property 2.
pub fn ingest_folder(
    dir: &Path,
    index: &mut FingerprintIndex,
    config: &EngineConfig,
    cancel: &CancelCheck,
) -> EngineResult<IngestReport> {
    let mut report = IngestReport::default();

    for entry in fs::read_dir(dir)? {
        if cancel() {
            info!("ingest cancelled between files");
            report.cancelled = true;
            return Ok(report);
        }

        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        match ingest_one(&path, index, config) {
            Ok(IngestOutcome::Ingested { fingerprints_written }) => {
                report.songs_ingested += 1;
                report.fingerprints_written += fingerprints_written;
            }
            Ok(IngestOutcome::Empty) => {
                report.empty_fingerprints += 1;
                warn!(path = %path.display(), "recording produced too few peaks, skipped");
            }
            Ok(IngestOutcome::Duplicate) => {
                report.duplicates_skipped += 1;
                debug!(path = %path.display(), "recording already ingested, skipped");
            }
            Err(EngineError::Decode(reason)) => {
                report.corrupt_files += 1;
                warn!(path = %path.display(), reason, "skipping undecodable file");
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        songs = report.songs_ingested,
        fingerprints = report.fingerprints_written,
        corrupt = report.corrupt_files,
        empty = report.empty_fingerprints,
        duplicates = report.duplicates_skipped,
        "ingest complete"
    );
    Ok(report)
}

fn ingest_one(path: &Path, index: &mut FingerprintIndex, config: &EngineConfig) -> EngineResult<IngestOutcome> {
    let song_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    if let Some(existing_id) = index.song_id_by_name(&song_name)? {
        if index.hash_count(existing_id)? > 0 {
            return Ok(IngestOutcome::Duplicate);
        }
    }

    let (samples, rate) = audio_loader::load(path, None, None)?;
    let duration_seconds = samples.len() as f64 / rate as f64;

    let spectrogram = spectrogram::stft(&samples, rate);
    let peak_list = peaks::peaks(&spectrogram, config.peak_min_dist, config.peak_min_amp as f32);

    if peak_list.len() < MIN_PEAKS {
        return Ok(IngestOutcome::Empty);
    }

    let fingerprints = hashing::fingerprint(&peak_list);
    let file_path = path.to_str();

    let song_id = index.add_recording(&song_name, file_path, duration_seconds)?;
    let written = index.add_fingerprints(song_id, &fingerprints)?;

    Ok(IngestOutcome::Ingested { fingerprints_written: written })
}
