//! Score-aware snapping (§4.4.1).
//!
//! Wraps a raw pitch-detector output and, given the set of pitches the
//! exercise currently expects, nudges ambiguous detections onto the
//! nearest expected note — correcting for the detector's own known
//! failure modes (octave slips, harmonic lock-on) rather than trusting
//! the raw frequency blindly. A detection far from every expected note
//! passes through unchanged.

use crate::music;
use crate::pitch_detector::RawDetection;

const EXACT_TOLERANCE_CENTS: f64 = 35.0;
const OCTAVE_TOLERANCE_CENTS: f64 = 50.0;
const HARMONIC_TOLERANCE_CENTS: f64 = 80.0;
const SEMITONE_SNAP_TOLERANCE_CENTS: f64 = 150.0;
const HARMONIC_RATIOS: [f64; 4] = [2.0, 2.5, 3.0, 4.0];
const OCTAVE_OFFSETS: [i32; 4] = [12, -12, 24, -24];

/// Confidence multipliers applied when a tier other than `Exact` wins:
/// each rung down the priority order is a little less sure of itself.
const OCTAVE_CONFIDENCE_MULTIPLIER: f64 = 0.9;
const HARMONIC_CONFIDENCE_MULTIPLIER: f64 = 0.85;
const SEMITONE_CONFIDENCE_MULTIPLIER: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    Exact,
    Octave,
    Harmonic,
    Semitone,
}

struct Candidate {
    tier: MatchTier,
    expected_pitch: i32,
    abs_cents: f64,
}

/// Snap `raw` against `expected_pitches`, in priority order exact >
/// octave-equivalent > harmonic > semitone-snap, ties broken by
/// smallest absolute cents error. Returns `raw` unchanged (with
/// `octave_corrected` left `false`) if nothing matches.
pub fn snap(raw: &RawDetection, expected_pitches: &[i32]) -> RawDetection {
    let mut best: Option<Candidate> = None;

    for &expected in expected_pitches {
        for candidate in candidates_for(raw.frequency, expected) {
            best = match best {
                None => Some(candidate),
                Some(ref current) if is_better(&candidate, current) => Some(candidate),
                some => some,
            };
        }
    }

    match best {
        None => raw.clone(),
        Some(candidate) => {
            let snapped_freq = music::freq_from_pitch(candidate.expected_pitch);
            let mut snapped = raw.clone();
            snapped.pitch = candidate.expected_pitch;
            snapped.note_name = music::name_from_pitch(candidate.expected_pitch);
            snapped.frequency = snapped_freq;
            snapped.octave_corrected = matches!(candidate.tier, MatchTier::Octave | MatchTier::Harmonic);
            snapped.confidence *= match candidate.tier {
                MatchTier::Exact => 1.0,
                MatchTier::Octave => OCTAVE_CONFIDENCE_MULTIPLIER as f32,
                MatchTier::Harmonic => HARMONIC_CONFIDENCE_MULTIPLIER as f32,
                MatchTier::Semitone => SEMITONE_CONFIDENCE_MULTIPLIER as f32,
            };
            snapped
        }
    }
}

fn is_better(a: &Candidate, b: &Candidate) -> bool {
    (a.tier, a.abs_cents.abs() as i64) < (b.tier, b.abs_cents.abs() as i64)
        || (a.tier == b.tier && a.abs_cents.abs() < b.abs_cents.abs())
}

fn candidates_for(detected_freq: f64, expected: i32) -> Vec<Candidate> {
    let mut out = Vec::new();
    let expected_freq = music::freq_from_pitch(expected);

    let exact_cents = music::cents_error(detected_freq, expected_freq);
    if exact_cents.abs() <= EXACT_TOLERANCE_CENTS {
        out.push(Candidate {
            tier: MatchTier::Exact,
            expected_pitch: expected,
            abs_cents: exact_cents,
        });
    }

    for &offset in &OCTAVE_OFFSETS {
        let shifted_freq = music::freq_from_pitch(expected + offset);
        let cents = music::cents_error(detected_freq, shifted_freq);
        if cents.abs() <= OCTAVE_TOLERANCE_CENTS {
            out.push(Candidate {
                tier: MatchTier::Octave,
                expected_pitch: expected,
                abs_cents: cents,
            });
        }
    }

    for &ratio in &HARMONIC_RATIOS {
        let harmonic_freq = expected_freq * ratio;
        let cents = music::cents_error(detected_freq, harmonic_freq);
        if cents.abs() <= HARMONIC_TOLERANCE_CENTS {
            out.push(Candidate {
                tier: MatchTier::Harmonic,
                expected_pitch: expected,
                abs_cents: cents,
            });
        }
    }

    let detected_pitch = music::pitch_from_freq(detected_freq);
    let semitone_distance = (detected_pitch - expected).abs();
    if semitone_distance == 1 || semitone_distance == 2 {
        let cents = music::cents_error(detected_freq, expected_freq);
        if cents.abs() <= SEMITONE_SNAP_TOLERANCE_CENTS {
            out.push(Candidate {
                tier: MatchTier::Semitone,
                expected_pitch: expected,
                abs_cents: cents,
            });
        }
    }

    out
}
