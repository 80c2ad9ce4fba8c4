//! End-to-end scenarios exercising the full pipeline: pitch detector →
//! snapper → confirmation engine → follower, the way a single practice
//! session would.

use staccato_core::confirmation::{ConfirmationConfig, ConfirmationEngine};
use staccato_core::exercise::{Exercise, ExerciseNote};
use staccato_core::follower::pattern::{Mode, PatternFollower, PatternFollowerConfig};
use staccato_core::follower::timed::{TimedFollower, TimedFollowerConfig, Timing};
use staccato_core::messages::CoreMessage;
use staccato_core::onset::OnsetDetector;
use staccato_core::pitch_detector::{PitchDetector, PitchDetectorConfig, WINDOW_STANDARD};
use staccato_core::snapper;
use staccato_core::testing::sine_tone;

const SAMPLE_RATE: f64 = 44100.0;

fn confirm_note(
    detector: &PitchDetector,
    onset: &mut OnsetDetector,
    engine: &mut ConfirmationEngine,
    expected: &[i32],
    pitch: i32,
    frame_count: usize,
    start_timestamp_ms: u64,
) -> Option<u64> {
    let freq = staccato_core::music::freq_from_pitch(pitch);

    // A brief silent gap before the new note so the onset detector
    // sees a genuine attack rather than a sustained tone switching
    // pitch mid-breath.
    let silence = vec![0.0f32; WINDOW_STANDARD];
    let silent_onset = onset.detect(&silence[silence.len() - 512..]);
    engine.process(None, silent_onset, 0.0, start_timestamp_ms.saturating_sub(10));

    let mut confirmed_at = None;
    for i in 0..frame_count {
        let frame = sine_tone(freq, SAMPLE_RATE, WINDOW_STANDARD, 0.5);
        let raw = detector.detect(&frame);
        let snapped = raw.map(|d| snapper::snap(&d, expected));
        let onset_result = onset.detect(&frame[frame.len() - 512..]);
        let rms = staccato_core::onset::rms(&frame);
        let timestamp = start_timestamp_ms + i as u64 * 10;
        for message in engine.process(snapped, onset_result, rms, timestamp) {
            if let CoreMessage::Confirmed(d) = message {
                if d.pitch == pitch && confirmed_at.is_none() {
                    confirmed_at = Some(timestamp);
                }
            }
        }
    }
    confirmed_at
}

/// Scenario A: a perfect monophonic scale, played one note at a time,
/// confirms every note in order.
#[test]
fn perfect_monophonic_scale_confirms_every_note() {
    let expected = vec![60, 62, 64, 65, 67];
    let detector = PitchDetector::new(PitchDetectorConfig {
        sample_rate: SAMPLE_RATE,
        ..Default::default()
    });
    let mut onset = OnsetDetector::new();
    let mut engine = ConfirmationEngine::new(ConfirmationConfig::default());

    let mut confirmed_pitches = Vec::new();
    let mut timestamp = 0;
    for &pitch in &expected {
        let confirmed = confirm_note(&detector, &mut onset, &mut engine, &expected, pitch, 8, timestamp);
        if confirmed.is_some() {
            confirmed_pitches.push(pitch);
        }
        timestamp += 500;
    }

    assert_eq!(confirmed_pitches, expected);
}

/// Scenario B, literal inputs/outputs: a single note expected at
/// 500ms under the default `{onTime=150, window=500}` tolerances.
#[test]
fn timing_windows_classify_early_on_time_and_late() {
    let exercise = Exercise::new(
        "timing",
        120.0,
        4,
        4,
        500,
        vec![ExerciseNote::simple(60, 0.0, 1.0)],
    )
    .unwrap();

    let on_time = TimedFollower::new(exercise.clone(), TimedFollowerConfig::default())
        .process_detection(60, 500.0)
        .unwrap();
    assert_eq!(on_time.timing, Timing::OnTime);
    assert_eq!(on_time.timing_error_ms, 0.0);

    let on_time_boundary = TimedFollower::new(exercise.clone(), TimedFollowerConfig::default())
        .process_detection(60, 350.0)
        .unwrap();
    assert_eq!(on_time_boundary.timing, Timing::OnTime);

    let early = TimedFollower::new(exercise.clone(), TimedFollowerConfig::default())
        .process_detection(60, 300.0)
        .unwrap();
    assert_eq!(early.timing, Timing::Early);

    let mut too_late = TimedFollower::new(exercise, TimedFollowerConfig::default());
    assert!(too_late.process_detection(60, 1100.0).is_none());
}

/// Scenario C: a note that never arrives is swept as missed once its
/// window closes, and progress accounting reflects it.
#[test]
fn missed_note_sweep_advances_progress() {
    let exercise = Exercise::new(
        "missed",
        120.0,
        4,
        4,
        0,
        vec![
            ExerciseNote::simple(60, 0.0, 1.0),
            ExerciseNote::simple(62, 1.0, 1.0),
        ],
    )
    .unwrap();
    let mut follower = TimedFollower::new(exercise, TimedFollowerConfig::default());

    follower.process_detection(60, 10.0);
    let missed = follower.advance_missed_notes(2000.0);
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].pitch, 62);

    let progress = follower.progress();
    assert_eq!((progress.matched, progress.missed, progress.total), (1, 1, 2));
}

/// Scenario D: the pattern-indexed follower can sync onto an exercise
/// starting from the middle instead of requiring note zero first.
#[test]
fn pattern_follower_syncs_from_the_middle() {
    let pattern = vec![60, 60, 67, 67, 69, 69, 67, 65, 65, 64, 64, 62, 62, 60];
    let mut follower = PatternFollower::new(pattern, PatternFollowerConfig::default());

    for pitch in [65, 65, 64, 64, 62, 62, 60] {
        follower.process_note(pitch);
    }

    assert_eq!(follower.mode(), Mode::Locked);
    assert_eq!(follower.position(), 13);
    assert!(follower.is_complete());
}

/// Scenario E: strict mode holds position on a wrong note and tallies
/// it as wrong; non-strict mode advances past it anyway.
#[test]
fn pattern_follower_handles_wrong_notes_per_mode() {
    let pattern = vec![60, 62, 64, 65, 67, 69, 71, 72];

    let mut strict = PatternFollower::new(
        pattern.clone(),
        PatternFollowerConfig {
            strict: true,
            ..Default::default()
        },
    );
    for pitch in [60, 62, 64] {
        strict.process_note(pitch);
    }
    let result = strict.process_note(66); // F#4, wrong: expected F4 (65)
    assert!(!result.is_correct);
    assert_eq!(result.position, 2); // strict mode holds

    let mut lenient = PatternFollower::new(pattern, PatternFollowerConfig::default());
    for pitch in [60, 62, 64] {
        lenient.process_note(pitch);
    }
    let result = lenient.process_note(66);
    assert!(!result.is_correct);
    assert_eq!(result.position, 3); // non-strict still advances
}

/// Scenario F: a detection exactly one octave away from the active
/// confirmed note is rejected rather than treated as a real note
/// change, within the grace window.
#[test]
fn octave_error_does_not_displace_active_note() {
    use staccato_core::pitch_detector::RawDetection;

    // Establish a real confirmed note through the full detector first.
    let no_expectations: Vec<i32> = vec![];
    let detector = PitchDetector::new(PitchDetectorConfig {
        sample_rate: SAMPLE_RATE,
        ..Default::default()
    });
    let mut onset = OnsetDetector::new();
    let mut engine = ConfirmationEngine::new(ConfirmationConfig::default());

    confirm_note(&detector, &mut onset, &mut engine, &no_expectations, 60, 8, 0);
    assert_eq!(engine.active_confirmed_note(), Some(60));

    // Now feed three frames of a manufactured octave-down detection
    // directly (as the raw pitch detector would hand the engine on a
    // genuine octave slip) to exercise the engine's own rejection path
    // in isolation from the score-aware snapper, which would otherwise
    // correct this upstream given an expected-note list.
    let octave_down_detection = RawDetection {
        pitch: 48,
        note_name: staccato_core::music::name_from_pitch(48),
        frequency: staccato_core::music::freq_from_pitch(48),
        confidence: 0.9,
        clarity: 0.9,
        rms: 0.1,
        octave_corrected: false,
    };
    let onset_result = staccato_core::onset::OnsetResult {
        is_onset: true,
        strength: 5.0,
    };

    let mut confirmed_wrong_octave = false;
    for i in 0..3 {
        let messages = engine.process(
            Some(octave_down_detection.clone()),
            onset_result,
            0.1,
            100 + i * 10,
        );
        if messages
            .iter()
            .any(|m| matches!(m, CoreMessage::Confirmed(d) if d.pitch == 48))
        {
            confirmed_wrong_octave = true;
        }
    }

    assert!(!confirmed_wrong_octave);
    assert_eq!(engine.active_confirmed_note(), Some(60));
    assert!(engine.stats().octave_errors_rejected > 0);
}
