//! C6: offset-histogram matching against the fingerprint index (spec.md §4.6).

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::EngineResult;
use crate::index::{FingerprintIndex, SongId};

/// Width of an offset-delta histogram bin, in seconds (spec.md §4.6).
pub const OFFSET_BIN_WIDTH: f32 = 0.1;

/// Outcome of matching one query fingerprint against the index.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Match {
        song_id: SongId,
        song_name: String,
        score: u32,
        density_confidence: f64,
        alignment_confidence: f64,
    },
    NoMatch,
}

/// Cooperative cancellation hook: called between hash lookups, return `true`
/// to abort (spec.md §5 — matching is cancellable between lookups).
pub type CancelCheck<'a> = dyn Fn() -> bool + 'a;

/// Matches `query_hashes` (as produced by [`crate::hashing::fingerprint`])
/// against `index`, returning the best-scoring candidate or [`MatchOutcome::NoMatch`]
/// if the index holds no candidate at all.
///
/// For each query hash, every `(song_id, recording_time)` row returned by the
/// index is combined with every query anchor time for that hash to form a
/// `delta = recording_time - query_time` offset, which is rounded to the
/// nearest [`OFFSET_BIN_WIDTH`] and accumulated in a per-song histogram. The winning
/// song is the one with the single largest bin count; ties break on lowest
/// `song_id`, then lowest bin value (spec.md §4.6 step 4).
///
/// `sample_duration_s` is the length of the query window; it feeds only the
/// diagnostic `density_confidence` field, never the ranking itself (spec.md
/// §4.6 step 4 and §9's resolution that this value is always supplied by the
/// caller, never inferred).
pub fn match_query(
    index: &FingerprintIndex,
    query_hashes: &HashMap<u64, Vec<f32>>,
    sample_duration_s: f32,
    cancel: &CancelCheck,
) -> EngineResult<MatchOutcome> {
    // song_id -> offset_bin -> count
    let mut histograms: HashMap<SongId, HashMap<i64, u32>> = HashMap::new();
    let mut total_matches: HashMap<SongId, u32> = HashMap::new();

    for (&hash, query_times) in query_hashes {
        if cancel() {
            debug!("match_query cancelled mid-scan");
            return Ok(MatchOutcome::NoMatch);
        }

        let rows = index.lookup(hash)?;
        if rows.is_empty() {
            continue;
        }

        for (song_id, recording_time) in rows {
            for &query_time in query_times {
                let delta = recording_time - query_time;
                let bin = (delta / OFFSET_BIN_WIDTH).round() as i64;
                *histograms.entry(song_id).or_default().entry(bin).or_insert(0) += 1;
                *total_matches.entry(song_id).or_insert(0) += 1;
            }
        }
    }

    if histograms.is_empty() {
        info!("no candidate songs shared any hash with the query");
        return Ok(MatchOutcome::NoMatch);
    }

    let mut best: Option<(SongId, i64, u32)> = None;
    for (&song_id, bins) in &histograms {
        for (&bin, &count) in bins {
            let better = match best {
                None => true,
                Some((best_song, best_bin, best_count)) => {
                    count > best_count
                        || (count == best_count && song_id < best_song)
                        || (count == best_count && song_id == best_song && bin < best_bin)
                }
            };
            if better {
                best = Some((song_id, bin, count));
            }
        }
    }

    let (song_id, _bin, score) = best.expect("histograms is non-empty");
    let song_name = index
        .song_name(song_id)?
        .unwrap_or_else(|| format!("song#{song_id}"));

    let total_for_song = *total_matches.get(&song_id).unwrap_or(&0);

    // expected = hash_count(song_id) * sample_duration_s / song_duration(song_id)
    // (spec.md §4.6 step 4); undefined (reported as 0.0) if song_duration is
    // unknown or zero, matching the spec's "undefined if expected = 0" note.
    let song_hash_count = index.hash_count(song_id)? as f64;
    let song_duration = index.song_duration(song_id)?.unwrap_or(0.0);
    let expected = song_hash_count * sample_duration_s as f64 / song_duration;
    let density_confidence = if expected > 0.0 { score as f64 / expected } else { 0.0 };

    let alignment_confidence = if total_for_song > 0 {
        score as f64 / total_for_song as f64
    } else {
        0.0
    };

    info!(
        song_id,
        %song_name,
        score,
        density_confidence,
        alignment_confidence,
        "resolved best match"
    );

    Ok(MatchOutcome::Match {
        song_id,
        song_name,
        score,
        density_confidence,
        alignment_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_cancel() -> bool {
        false
    }

    #[test]
    fn no_candidates_returns_no_match() {
        let index = FingerprintIndex::open_in_memory().unwrap();
        let query = HashMap::from([(1u64, vec![0.0f32])]);
        let outcome = match_query(&index, &query, 5.0, &never_cancel).unwrap();
        assert_eq!(outcome, MatchOutcome::NoMatch);
    }

    #[test]
    fn single_strong_candidate_wins() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        let song_id = index.add_recording("A.wav", None, 10.0).unwrap();
        let mut fps = HashMap::new();
        fps.insert(100u64, vec![0.0, 1.0, 2.0]);
        index.add_fingerprints(song_id, &fps).unwrap();

        // query anchors land exactly at the recording offsets, so delta == 0
        // for every pair -> all three hits land in the same bin.
        let query = HashMap::from([(100u64, vec![0.0f32, 1.0, 2.0])]);
        let outcome = match_query(&index, &query, 3.0, &never_cancel).unwrap();
        match outcome {
            MatchOutcome::Match { song_id: id, score, .. } => {
                assert_eq!(id, song_id);
                assert_eq!(score, 3);
            }
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn tie_breaks_on_lowest_song_id() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        let a = index.add_recording("A.wav", None, 10.0).unwrap();
        let b = index.add_recording("B.wav", None, 10.0).unwrap();

        let mut fps_a = HashMap::new();
        fps_a.insert(1u64, vec![0.0]);
        index.add_fingerprints(a, &fps_a).unwrap();

        let mut fps_b = HashMap::new();
        fps_b.insert(1u64, vec![0.0]);
        index.add_fingerprints(b, &fps_b).unwrap();

        let query = HashMap::from([(1u64, vec![0.0f32])]);
        let outcome = match_query(&index, &query, 5.0, &never_cancel).unwrap();
        match outcome {
            MatchOutcome::Match { song_id, .. } => assert_eq!(song_id, a),
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn cancellation_short_circuits_to_no_match() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        let song_id = index.add_recording("A.wav", None, 10.0).unwrap();
        let mut fps = HashMap::new();
        fps.insert(1u64, vec![0.0]);
        index.add_fingerprints(song_id, &fps).unwrap();

        let query = HashMap::from([(1u64, vec![0.0f32])]);
        let outcome = match_query(&index, &query, 5.0, &|| true).unwrap();
        assert_eq!(outcome, MatchOutcome::NoMatch);
    }

    #[test]
    fn density_confidence_follows_expected_hash_ratio() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        // 10s recording with 10 fingerprints total -> a 5s sample "expects"
        // 5 matching hashes; all 5 query hashes align to the same bin.
        let song_id = index.add_recording("A.wav", None, 10.0).unwrap();
        let mut fps = HashMap::new();
        for h in 0..10u64 {
            fps.insert(h, vec![0.0]);
        }
        index.add_fingerprints(song_id, &fps).unwrap();

        let query = HashMap::from([
            (0u64, vec![0.0f32]),
            (1u64, vec![0.0f32]),
            (2u64, vec![0.0f32]),
            (3u64, vec![0.0f32]),
            (4u64, vec![0.0f32]),
        ]);
        let outcome = match_query(&index, &query, 5.0, &never_cancel).unwrap();
        match outcome {
            MatchOutcome::Match { score, density_confidence, .. } => {
                assert_eq!(score, 5);
                assert!((density_confidence - 1.0).abs() < 1e-9);
            }
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }
}
