//! CLI entry point: offline pitch analysis of a WAV file, and a tone
//! generator for exercising the detector/confirmation pipeline without
//! a microphone (§9 "Testing hooks").

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use staccato_core::confirmation::{ConfirmationConfig, ConfirmationEngine};
use staccato_core::music;
use staccato_core::onset::OnsetDetector;
use staccato_core::pitch_detector::{PitchDetector, PitchDetectorConfig, HOP_SAMPLES, WINDOW_STANDARD};
use staccato_core::ring_buffer::RingBuffer;
use staccato_core::snapper;
use staccato_core::testing::piano_like_tone;

#[derive(Parser)]
#[command(name = "phonon-practice", version, about = "Pitch detection and score-following for piano practice")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector/confirmation pipeline over a mono WAV file and
    /// print each confirmed note.
    Analyze {
        path: PathBuf,

        /// Pitches (e.g. "C4,D4,E4") the score-aware snapper should
        /// bias detections towards. Omit to disable snapping.
        #[arg(long, value_delimiter = ',')]
        expect: Vec<String>,
    },
    /// Synthesize a piano-like tone and write it to a WAV file.
    Tone {
        /// Note name, e.g. "A4".
        note: String,
        /// Duration in seconds.
        #[arg(default_value_t = 1.0)]
        duration_secs: f64,
        #[arg(long, default_value = "tone.wav")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze { path, expect } => analyze(&path, &expect),
        Commands::Tone {
            note,
            duration_secs,
            out,
        } => tone(&note, duration_secs, &out),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn analyze(path: &PathBuf, expect: &[String]) -> Result<()> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate as f64;
    info!(sample_rate, channels = spec.channels, "opened wav file");

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
            .collect::<Result<_, _>>()?,
    };

    let expected_pitches: Vec<i32> = expect
        .iter()
        .filter(|s| !s.is_empty())
        .map(|name| music::pitch_from_name(name))
        .collect::<Result<_, _>>()
        .context("failed to parse --expect note list")?;

    let mut ring = RingBuffer::new(WINDOW_STANDARD * 2);
    let detector = PitchDetector::new(PitchDetectorConfig {
        sample_rate,
        ..Default::default()
    });
    let mut onset_detector = OnsetDetector::new();
    let mut engine = ConfirmationEngine::new(ConfirmationConfig::default());

    let mut timestamp_ms: u64 = 0;
    let hop_ms = (HOP_SAMPLES as f64 / sample_rate * 1000.0) as u64;

    for chunk in samples.chunks(HOP_SAMPLES) {
        ring.append(chunk);
        if !ring.has_at_least(WINDOW_STANDARD) {
            timestamp_ms += hop_ms;
            continue;
        }
        let frame = ring.latest(WINDOW_STANDARD);
        let onset_result = onset_detector.detect(chunk);
        let rms = staccato_core::onset::rms(chunk);

        let raw = detector.detect(&frame);
        let snapped = raw.map(|d| {
            if expected_pitches.is_empty() {
                d
            } else {
                snapper::snap(&d, &expected_pitches)
            }
        });

        for message in engine.process(snapped, onset_result, rms, timestamp_ms) {
            if let staccato_core::messages::CoreMessage::Confirmed(detection) = message {
                println!(
                    "{:>8}ms  {:<4} {:>7.2}Hz  confidence={:.2}",
                    detection.timestamp_ms, detection.note_name, detection.frequency, detection.confidence
                );
            }
        }

        timestamp_ms += hop_ms;
    }

    Ok(())
}

fn tone(note: &str, duration_secs: f64, out: &PathBuf) -> Result<()> {
    let pitch = music::pitch_from_name(note).with_context(|| format!("invalid note name {note:?}"))?;
    let freq = music::freq_from_pitch(pitch);
    let sample_rate = 44100.0;
    let samples = piano_like_tone(freq, sample_rate, duration_secs, 0.8);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out, spec)
        .with_context(|| format!("failed to create {}", out.display()))?;
    for sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!(note, freq, out = %out.display(), "wrote tone");
    Ok(())
}
