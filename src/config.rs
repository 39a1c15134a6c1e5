//! Fingerprinting parameters (spec.md §6.3) and config-file/env loading.

use serde::{Deserialize, Serialize};

/// Target sample rate the audio loader resamples every input to (spec.md §4.1).
pub const TARGET_SAMPLE_RATE: u32 = 22_050;
/// STFT frame length (spec.md §4.2).
pub const FRAME_LEN: usize = 2048;
/// STFT hop size (spec.md §4.2).
pub const HOP_SIZE: usize = 512;
/// Floor applied to the dB-normalized spectrogram (spec.md §4.2).
pub const DB_FLOOR: f32 = -80.0;
/// Minimum peak count below which a fingerprint is considered empty (spec.md §7).
pub const MIN_PEAKS: usize = 10;

/// Per-experiment tunables (spec.md §6.3). Deserializable from a TOML file or
/// `SIVANA_`-prefixed environment variables via the `config` crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Spectrogram-cell neighborhood radius for peak picking.
    pub peak_min_dist: usize,
    /// Negative dB threshold relative to the frame-set maximum.
    pub peak_min_amp: i32,
    /// Seconds of audio to use for a query sample.
    pub clip_len: f32,
    /// Seed for pseudo-random relative start offsets in batched testing.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            peak_min_dist: 15,
            peak_min_amp: -30,
            clip_len: 10.0,
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Load configuration, overlaying an optional file on top of the defaults
    /// and then applying `SIVANA_*` environment variable overrides.
    ///
    /// Mirrors the load order used throughout the example pack's `config.rs`
    /// modules: defaults, then file, then environment.
    pub fn load(config_file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("peak_min_dist", 15i64)?
            .set_default("peak_min_amp", -30i64)?
            .set_default("clip_len", 10.0f64)?
            .set_default("seed", 0i64)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SIVANA").separator("_"),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.peak_min_dist, 15);
        assert_eq!(cfg.peak_min_amp, -30);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let cfg = EngineConfig::load(None).expect("defaults should always deserialize");
        assert_eq!(cfg, EngineConfig::default());
    }
}
