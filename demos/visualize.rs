//! Dev-only spectrogram/peak heatmap writer (spec.md §1 — out of core scope,
//! kept as an opt-in `viz`-gated aid). Not part of the library's public API.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use sivana::audio_loader;
use sivana::config::{EngineConfig, FRAME_LEN, HOP_SIZE};
use sivana::peaks::{self, SpectralPeak};
use sivana::spectrogram::{self, Spectrogram};

fn main() -> ExitCode {
    sivana::logging::init();
    let mut args = env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        eprintln!("usage: sivana-visualize <audio-file> <output.svg>");
        return ExitCode::from(2);
    };

    let config = EngineConfig::default();
    let (samples, rate) = match audio_loader::load(Path::new(&input), None, None) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(4);
        }
    };

    let spectrogram = spectrogram::stft(&samples, rate);
    let found_peaks = peaks::peaks(&spectrogram, config.peak_min_dist, config.peak_min_amp as f32);

    let svg = render_svg(&spectrogram, &found_peaks, &input);
    if let Err(err) = File::create(&output).and_then(|mut f| f.write_all(svg.as_bytes())) {
        eprintln!("error writing {output}: {err}");
        return ExitCode::from(3);
    }

    println!("wrote {} ({} frames, {} peaks)", output, spectrogram.num_frames(), found_peaks.len());
    ExitCode::SUCCESS
}

/// Renders a black-background heatmap of `spectrogram` (dB -> color via a
/// black/blue/cyan/yellow/red ramp) with `peaks` overlaid as white dots.
fn render_svg(spectrogram: &Spectrogram, found_peaks: &[SpectralPeak], title: &str) -> String {
    let (width, height) = (1200.0f32, 700.0f32);
    let num_frames = spectrogram.num_frames();
    let num_bins = spectrogram.freq_bins();

    if num_frames == 0 || num_bins == 0 {
        return format!(
            "<svg xmlns='http://www.w3.org/2000/svg' width='{width}' height='{height}'>\
             <rect width='100%' height='100%' fill='black'/>\
             <text x='{cx}' y='{cy}' fill='white' font-family='monospace' font-size='18' text-anchor='middle'>no data</text>\
             </svg>",
            cx = width / 2.0,
            cy = height / 2.0,
        );
    }

    let cell_w = width / num_frames as f32;
    let cell_h = height / num_bins as f32;

    let mut cells = String::new();
    for t in 0..num_frames {
        for k in 0..num_bins {
            let db = spectrogram.frames[t][k];
            // db is in [DB_FLOOR, 0.0]; normalize to [0, 1] for the color ramp.
            let normalized = ((db + 80.0) / 80.0).clamp(0.0, 1.0);
            if normalized <= 0.0 {
                continue;
            }
            let x = t as f32 * cell_w;
            let y = height - (k as f32 + 1.0) * cell_h;
            cells.push_str(&format!(
                "<rect x='{x:.2}' y='{y:.2}' width='{cell_w:.2}' height='{cell_h:.2}' fill='{}'/>\n",
                magnitude_to_color(normalized)
            ));
        }
    }

    let mut dots = String::new();
    for p in found_peaks {
        let frame = (p.time_s * spectrogram.rate as f32 / HOP_SIZE as f32).round() as usize;
        let bin = (p.freq_hz * FRAME_LEN as f32 / spectrogram.rate as f32).round() as usize;
        if frame >= num_frames || bin >= num_bins {
            continue;
        }
        let x = frame as f32 * cell_w + cell_w / 2.0;
        let y = height - (bin as f32 + 0.5) * cell_h;
        dots.push_str(&format!("<circle cx='{x:.2}' cy='{y:.2}' r='1.5' fill='white'/>\n"));
    }

    format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{width}' height='{height}'>\n\
         <rect width='100%' height='100%' fill='black'/>\n\
         <g>{cells}</g>\n\
         <g>{dots}</g>\n\
         <text x='10' y='20' fill='white' font-family='monospace' font-size='14'>{}</text>\n\
         </svg>",
        svg_escape(title)
    )
}

fn magnitude_to_color(normalized: f32) -> &'static str {
    if normalized < 0.25 {
        "#00008b"
    } else if normalized < 0.5 {
        "#0080ff"
    } else if normalized < 0.75 {
        "#ffff00"
    } else {
        "#ff0000"
    }
}

fn svg_escape(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            other => other.to_string(),
        })
        .collect()
}
