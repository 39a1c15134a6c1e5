//! C1: decode a file to mono PCM at the fixed target rate (spec.md §4.1).

use std::fs::File;
use std::path::Path;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::config::TARGET_SAMPLE_RATE;
use crate::error::{EngineError, EngineResult};

/// Decodes `path` to mono PCM at [`TARGET_SAMPLE_RATE`], optionally windowed
/// to `[offset_s, offset_s + duration_s)`. When `duration_s` is `None` the
/// whole (post-offset) file is returned.
pub fn load(path: &Path, offset_s: Option<f32>, duration_s: Option<f32>) -> EngineResult<(Vec<f32>, u32)> {
    let (samples, native_rate) = decode_to_mono(path)?;

    let offset = offset_s.unwrap_or(0.0);
    let offset_idx = (offset * native_rate as f32) as usize;
    if offset_idx > samples.len() {
        return Err(EngineError::Decode(format!(
            "offset {offset}s exceeds decoded audio length ({} samples at {native_rate} Hz)",
            samples.len()
        )));
    }

    let windowed = match duration_s {
        Some(duration) => {
            let end = (offset_idx + (duration * native_rate as f32) as usize).min(samples.len());
            &samples[offset_idx..end]
        }
        None => &samples[offset_idx..],
    };

    let resampled = resample(windowed, native_rate, TARGET_SAMPLE_RATE)?;
    debug!(
        path = %path.display(),
        native_rate,
        out_samples = resampled.len(),
        "loaded audio"
    );
    Ok((resampled, TARGET_SAMPLE_RATE))
}

fn decode_to_mono(path: &Path) -> EngineResult<(Vec<f32>, u32)> {
    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| EngineError::Decode(format!("unsupported format or probe error: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| EngineError::Decode("no compatible audio track found".to_string()))?;

    let native_rate = track.codec_params.sample_rate.unwrap();
    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| EngineError::Decode(format!("failed to make decoder: {e}")))?;

    let track_id = track.id;
    let mut decoded_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                let params = format
                    .tracks()
                    .iter()
                    .find(|t| t.id == track_id)
                    .map(|t| t.codec_params.clone())
                    .ok_or_else(|| EngineError::Decode("track disappeared after reset".to_string()))?;
                decoder = symphonia::default::get_codecs()
                    .make(&params, &dec_opts)
                    .map_err(|e| EngineError::Decode(format!("failed to remake decoder after reset: {e}")))?;
                continue;
            }
            Err(err) => return Err(EngineError::Decode(format!("error reading next packet: {err}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded_packet_ref) => {
                let spec = *decoded_packet_ref.spec();
                let mut sample_buf =
                    SampleBuffer::<f32>::new(decoded_packet_ref.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded_packet_ref);

                let samples_this_packet = sample_buf.samples();
                let channels = spec.channels.count().max(1);
                match channels {
                    1 => decoded_samples.extend_from_slice(samples_this_packet),
                    _ => decoded_samples.extend(
                        samples_this_packet
                            .chunks_exact(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    ),
                }
            }
            Err(SymphoniaError::DecodeError(err)) => {
                warn!(%err, "skipping undecodable packet");
            }
            Err(err) => return Err(EngineError::Decode(format!("fatal decoding error: {err}"))),
        }
    }

    if decoded_samples.is_empty() {
        return Err(EngineError::Decode("no samples decoded".to_string()));
    }

    Ok((decoded_samples, native_rate))
}

/// Resamples mono PCM to `to_rate` using a windowed-sinc resampler. Per
/// spec.md §4.1 this must not alias above `to_rate / 2`; `rubato`'s sinc
/// interpolator with a Blackman-Harris window provides that anti-aliasing.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> EngineResult<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| EngineError::Decode(format!("failed to build resampler: {e}")))?;

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| EngineError::Decode(format!("resampling failed: {e}")))?;

    Ok(output.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_when_rates_match() {
        let samples = vec![0.1, 0.2, -0.3];
        let out = resample(&samples, TARGET_SAMPLE_RATE, TARGET_SAMPLE_RATE).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn resample_empty_is_empty() {
        let out = resample(&[], 44_100, TARGET_SAMPLE_RATE).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn resample_changes_length_proportionally() {
        let samples: Vec<f32> = (0..4410).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&samples, 44_100, TARGET_SAMPLE_RATE).unwrap();
        let expected = samples.len() / 2;
        assert!((out.len() as isize - expected as isize).unsigned_abs() < 32);
    }
}
