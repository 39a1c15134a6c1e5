//! Landmark-pair acoustic fingerprinting engine.
//!
//! Ingest (`ingest::ingest_folder`) walks a folder of reference recordings
//! through decode -> spectrogram -> peaks -> hash -> persist. Query
//! (`query::identify_clip`) runs the same first four stages on a short clip
//! and matches the result against a [`index::FingerprintIndex`].

pub mod audio_loader;
pub mod config;
pub mod error;
pub mod hashing;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod matcher;
pub mod peaks;
pub mod query;
pub mod spectrogram;
