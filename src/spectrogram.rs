//! C2: log-amplitude magnitude spectrogram (spec.md §4.2).

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use tracing::debug;

use crate::config::{DB_FLOOR, FRAME_LEN, HOP_SIZE, TARGET_SAMPLE_RATE};

/// A dB-normalized magnitude spectrogram: one `Vec<f32>` of `freq_bins` values
/// per time frame, such that `max(S) == 0.0`.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub frames: Vec<Vec<f32>>,
    pub rate: u32,
}

impl Spectrogram {
    pub fn freq_bins(&self) -> usize {
        self.frames.first().map_or(0, |f| f.len())
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// `t_seconds(frame) = frame * H / rate` (spec.md §4.2).
    pub fn time_seconds(&self, frame: usize) -> f32 {
        (frame * HOP_SIZE) as f32 / self.rate as f32
    }

    /// `f_hz(k) = k * rate / N` (spec.md §4.2).
    pub fn freq_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.rate as f32 / FRAME_LEN as f32
    }
}

fn hann_window(window_size: usize) -> Vec<f32> {
    if window_size <= 1 {
        return vec![1.0; window_size];
    }
    (0..window_size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (window_size - 1) as f32).cos()))
        .collect()
}

/// Computes the one-sided, dB-normalized STFT magnitude spectrogram.
///
/// Frame length and hop are fixed to the spec's `N = 2048`, `H = 512`
/// regardless of the caller's sample rate, since `rate` is always
/// [`TARGET_SAMPLE_RATE`] after the audio loader resamples (spec.md §4.1–§4.2).
pub fn stft(samples: &[f32], rate: u32) -> Spectrogram {
    debug_assert_eq!(
        rate, TARGET_SAMPLE_RATE,
        "spectrogram expects samples already resampled to the target rate"
    );

    if samples.len() < FRAME_LEN {
        debug!(len = samples.len(), "not enough samples for a single frame");
        return Spectrogram { frames: Vec::new(), rate };
    }

    let num_frames = (samples.len() - FRAME_LEN) / HOP_SIZE + 1;
    let window = hann_window(FRAME_LEN);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_LEN);
    let num_bins = FRAME_LEN / 2 + 1;

    let mut frames: Vec<Vec<f32>> = Vec::with_capacity(num_frames);
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); FRAME_LEN];
    let mut global_max = f32::MIN;

    for frame_idx in 0..num_frames {
        let start = frame_idx * HOP_SIZE;
        let chunk = &samples[start..start + FRAME_LEN];

        for (j, (&sample, &w)) in chunk.iter().zip(window.iter()).enumerate() {
            buffer[j] = Complex::new(sample * w, 0.0);
        }

        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..num_bins].iter().map(|c| c.norm()).collect();
        global_max = global_max.max(magnitudes.iter().cloned().fold(f32::MIN, f32::max));
        frames.push(magnitudes);
    }

    if global_max <= 0.0 {
        for frame in &mut frames {
            frame.iter_mut().for_each(|v| *v = DB_FLOOR);
        }
        return Spectrogram { frames, rate };
    }

    for frame in &mut frames {
        for v in frame.iter_mut() {
            let db = 20.0 * (*v / global_max).max(1e-12).log10();
            *v = db.max(DB_FLOOR);
        }
    }

    debug!(num_frames, num_bins, "computed spectrogram");
    Spectrogram { frames, rate }
}
