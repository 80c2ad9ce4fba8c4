//! Message types crossing the core/UI boundary (§5, §6).
//!
//! The confirmation engine and the two followers speak these types by
//! value across the cooperative scheduling boundary between the audio
//! render context and the UI/event context — no shared mutable state
//! beyond the ring buffer, which the audio context owns exclusively.

use crate::pitch_detector::RawDetection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionKind {
    Tentative,
    Confirmed,
}

/// A pitch detection promoted out of the confirmation engine, carrying
/// the timing and hysteresis state the raw detector knows nothing
/// about.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub pitch: i32,
    pub note_name: String,
    pub frequency: f64,
    pub confidence: f32,
    pub clarity: f32,
    pub rms: f32,
    pub octave_corrected: bool,
    pub timestamp_ms: u64,
    pub kind: DetectionKind,
}

impl Detection {
    pub fn from_raw(raw: &RawDetection, timestamp_ms: u64, kind: DetectionKind) -> Self {
        Self {
            pitch: raw.pitch,
            note_name: raw.note_name.clone(),
            frequency: raw.frequency,
            confidence: raw.confidence,
            clarity: raw.clarity,
            rms: raw.rms,
            octave_corrected: raw.octave_corrected,
            timestamp_ms,
            kind,
        }
    }
}

/// Periodic engine telemetry (§6), emitted every 500ms of hop-counted
/// time rather than once per frame. `updates_per_sec`, `rms` and
/// `smoothed_rms` are the spec'd fields; the rest is bookkeeping the
/// followers and tests also read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Hops processed per second over the last window, minus any
    /// reported overruns.
    pub updates_per_sec: f32,
    /// RMS of the most recent frame.
    pub rms: f32,
    /// RMS averaged over the last four frames (§4.5 `rmsHistory`).
    pub smoothed_rms: f32,
    pub frames_processed: u64,
    pub stable_frames: u64,
    pub octave_errors_rejected: u64,
    pub overruns: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            updates_per_sec: 0.0,
            rms: 0.0,
            smoothed_rms: 0.0,
            frames_processed: 0,
            stable_frames: 0,
            octave_errors_rejected: 0,
            overruns: 0,
        }
    }
}

/// Messages the core emits towards the UI/event context.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreMessage {
    Tentative(Detection),
    Confirmed(Detection),
    Cancelled { pitch: i32, timestamp_ms: u64 },
    NoteOff { pitch: i32, timestamp_ms: u64 },
    Frame { rms: f32, timestamp_ms: u64 },
    Stats(Stats),
}

/// Commands the UI/event context sends towards the core.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    SetExpectedNotes(Vec<i32>),
    SetPolyphonyMode(PolyphonyMode),
    SetTwoSpeed(bool),
    SetGates { min_confidence: f32, min_rms: f32 },
    Reset,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyphonyMode {
    Monophonic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_carries_raw_fields_through() {
        let raw = RawDetection {
            pitch: 60,
            note_name: "C4".to_string(),
            frequency: 261.63,
            confidence: 0.8,
            clarity: 0.8,
            rms: 0.05,
            octave_corrected: false,
        };
        let d = Detection::from_raw(&raw, 1234, DetectionKind::Confirmed);
        assert_eq!(d.pitch, 60);
        assert_eq!(d.kind, DetectionKind::Confirmed);
        assert_eq!(d.timestamp_ms, 1234);
    }

    #[test]
    fn stats_default_is_all_zero() {
        let stats = Stats::default();
        assert_eq!(stats.updates_per_sec, 0.0);
        assert_eq!(stats.rms, 0.0);
        assert_eq!(stats.smoothed_rms, 0.0);
        assert_eq!(stats.frames_processed, 0);
        assert_eq!(stats.overruns, 0);
    }
}
