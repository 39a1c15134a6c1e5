//! C3: sparse (time, frequency) peak extraction (spec.md §4.3).

use tracing::debug;

use crate::spectrogram::Spectrogram;

/// A spectral peak in absolute seconds/Hz (spec.md §3, `SpectralPeak`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    pub time_s: f32,
    pub freq_hz: f32,
}

/// Default neighborhood radius for peak picking (spec.md §4.3).
pub const DEFAULT_MIN_DISTANCE: usize = 15;
/// Default amplitude threshold in dB relative to the global maximum (spec.md §4.3).
pub const DEFAULT_AMP_THRESHOLD_DB: f32 = -30.0;

/// Extracts peaks from a dB-normalized spectrogram.
///
/// A cell `(k, t)` is a peak iff it equals the maximum of its square
/// `min_distance`-radius neighborhood (edge cells use a truncated
/// neighborhood) AND it exceeds `max(S) + amp_threshold_db` (spec.md §4.3).
/// Condition (a) is an equality test against the neighborhood max, not a
/// strict local-maximum test, so tied cells within one neighborhood are all
/// reported — duplicates are expected and tolerated downstream by the hasher.
pub fn peaks(
    spectrogram: &Spectrogram,
    min_distance: usize,
    amp_threshold_db: f32,
) -> Vec<SpectralPeak> {
    let num_frames = spectrogram.num_frames();
    let num_bins = spectrogram.freq_bins();

    if num_frames == 0 || num_bins == 0 {
        return Vec::new();
    }

    let d = min_distance;
    let mut found = Vec::new();

    for t in 0..num_frames {
        for k in 0..num_bins {
            let value = spectrogram.frames[t][k];
            if value <= amp_threshold_db {
                continue;
            }

            let t_start = t.saturating_sub(d);
            let t_end = (t + d + 1).min(num_frames);
            let k_start = k.saturating_sub(d);
            let k_end = (k + d + 1).min(num_bins);

            let mut neighborhood_max = f32::MIN;
            for nt in t_start..t_end {
                for nk in k_start..k_end {
                    neighborhood_max = neighborhood_max.max(spectrogram.frames[nt][nk]);
                }
            }

            if value == neighborhood_max {
                found.push(SpectralPeak {
                    time_s: spectrogram.time_seconds(t),
                    freq_hz: spectrogram.freq_hz(k),
                });
            }
        }
    }

    debug!(count = found.len(), "extracted spectral peaks");
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(frames: Vec<Vec<f32>>, rate: u32) -> Spectrogram {
        Spectrogram { frames, rate }
    }

    #[test]
    fn empty_spectrogram_yields_no_peaks() {
        let s = flat(Vec::new(), 22_050);
        assert!(peaks(&s, DEFAULT_MIN_DISTANCE, DEFAULT_AMP_THRESHOLD_DB).is_empty());
    }

    #[test]
    fn single_global_max_is_found() {
        // one frame, a clear single peak at bin 2
        let s = flat(vec![vec![-80.0, -20.0, 0.0, -20.0, -80.0]], 22_050);
        let p = peaks(&s, 1, -30.0);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].freq_hz, s.freq_hz(2));
    }

    #[test]
    fn below_amplitude_threshold_is_excluded() {
        let s = flat(vec![vec![-80.0, -50.0, -80.0]], 22_050);
        let p = peaks(&s, 1, -30.0);
        assert!(p.is_empty());
    }

    #[test]
    fn ties_in_a_neighborhood_all_pass() {
        let s = flat(vec![vec![0.0, 0.0, -80.0]], 22_050);
        let p = peaks(&s, 1, -30.0);
        // both tied maxima at bins 0 and 1 should be reported
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn returned_peaks_are_within_threshold_of_max() {
        let s = flat(
            vec![vec![-80.0, -5.0, -40.0, -60.0, 0.0, -20.0, -90.0]],
            22_050,
        );
        for p in peaks(&s, 1, -30.0) {
            let bin = (p.freq_hz / s.freq_hz(1)).round() as usize;
            assert!(s.frames[0][bin] >= -30.0);
        }
    }
}
