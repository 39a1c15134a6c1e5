//! Query-side orchestration: C1 -> C2 -> C3 -> C4 -> C6 (spec.md §2 control
//! flow, §6.4's `identify(...)` CLI/programmatic surface).

use std::path::Path;

use tracing::{debug, info};

use crate::audio_loader;
use crate::config::{EngineConfig, MIN_PEAKS};
use crate::error::EngineResult;
use crate::index::FingerprintIndex;
use crate::matcher::{self, MatchOutcome};
use crate::peaks;
use crate::spectrogram;
use crate::hashing;

/// Seconds by which the query window slides forward when a clip's peak count
/// falls below [`MIN_PEAKS`] (spec.md §7 — `EmptyFingerprint` recovery).
pub const SLIDE_STEP_SECONDS: f32 = 0.5;

/// Decodes `audio_path` windowed to `clip_len` seconds and matches it against
/// `index`.
///
/// If a window yields fewer than [`MIN_PEAKS`] peaks, the start is slid
/// forward by [`SLIDE_STEP_SECONDS`] and retried, until either a usable
/// window is found or the remaining audio is shorter than `clip_len`, at
/// which point the result is [`MatchOutcome::NoMatch`] (spec.md §7).
pub fn identify_clip(
    audio_path: &Path,
    index: &FingerprintIndex,
    clip_len: f32,
    config: &EngineConfig,
) -> EngineResult<MatchOutcome> {
    let mut offset = 0.0f32;
    loop {
        let (samples, rate) = audio_loader::load(audio_path, Some(offset), Some(clip_len))?;
        let window_seconds = samples.len() as f32 / rate as f32;
        if window_seconds < clip_len {
            info!(offset, window_seconds, clip_len, "remaining window shorter than clip_len, giving up");
            return Ok(MatchOutcome::NoMatch);
        }

        let spectrogram = spectrogram::stft(&samples, rate);
        let peak_list = peaks::peaks(&spectrogram, config.peak_min_dist, config.peak_min_amp as f32);

        if peak_list.len() < MIN_PEAKS {
            debug!(offset, peaks = peak_list.len(), "too few peaks, sliding query window");
            offset += SLIDE_STEP_SECONDS;
            continue;
        }

        let fingerprint = hashing::fingerprint(&peak_list);
        return matcher::match_query(index, &fingerprint, window_seconds, &|| false);
    }
}
