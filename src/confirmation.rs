//! Confirmation engine (§4.5): the two-speed path between "the
//! detector saw something" and "the exercise should act on a note".
//!
//! Every incoming frame produces at most one tentative-or-confirmed
//! detection plus telemetry; nothing here ever returns an error — a
//! frame the engine can't trust is silently absorbed and shows up only
//! in [`crate::messages::Stats`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::messages::{CoreMessage, Detection, DetectionKind, Stats};
use crate::music;
use crate::onset::OnsetResult;
use crate::pitch_detector::RawDetection;

/// §4.5 `rmsHistory`: the smoother looks back this many frames.
const RMS_HISTORY_LEN: usize = 4;
/// §6: stats are emitted on this cadence of hop-counted time, not once
/// per hop.
const STATS_EMIT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Frame is silent below this RMS, independent of whether the
    /// detector found a pitch in it.
    pub energy_gate_rms: f32,
    pub min_confidence: f32,
    pub first_note_required_frames: u32,
    pub small_interval_required_frames: u32,
    pub onset_triggered_required_frames: u32,
    pub small_interval_semitones: i32,
    pub stale_tentative_timeout_ms: u64,
    pub silence_frames_for_note_off: u32,
    /// A detection at exactly an octave (or octave-plus-fifth) below a
    /// pitch confirmed this recently is rejected outright rather than
    /// treated as a new note.
    pub octave_error_window_ms: u64,
    /// Minimum confidence required to confirm an octave-change (the new
    /// pitch exactly 12 or 24 semitones from the active one) on top of
    /// its own, stricter, hysteresis window.
    pub octave_change_min_confidence: f32,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            energy_gate_rms: 0.003,
            min_confidence: 0.75,
            first_note_required_frames: 8,
            small_interval_required_frames: 3,
            onset_triggered_required_frames: 2,
            small_interval_semitones: 2,
            stale_tentative_timeout_ms: 500,
            silence_frames_for_note_off: 3,
            octave_error_window_ms: 400,
            octave_change_min_confidence: 0.85,
        }
    }
}

#[derive(Debug, Clone)]
struct TentativeState {
    pitch: i32,
    frames_seen: u32,
    /// Fixed for the life of this tentative cycle, decided when it was
    /// opened. A re-trigger opens with the fast onset-triggered window
    /// even though `active_confirmed_note` is cleared in the same
    /// frame, so this must not be recomputed from current engine state
    /// on later frames of the same cycle.
    required_frames: u32,
    last_seen_timestamp_ms: u64,
}

pub struct ConfirmationEngine {
    config: ConfirmationConfig,
    active_confirmed_note: Option<i32>,
    tentative: Option<TentativeState>,
    silence_frames: u32,
    recently_confirmed_pitch: Option<i32>,
    recently_confirmed_time_ms: Option<u64>,
    recent_pitches: Vec<i32>,
    stats: Stats,
    rms_history: Vec<f32>,
    stats_window_start_ms: Option<u64>,
    hops_in_window: u64,
    overruns_in_window: u64,
}

impl ConfirmationEngine {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self {
            config,
            active_confirmed_note: None,
            tentative: None,
            silence_frames: 0,
            recently_confirmed_pitch: None,
            recently_confirmed_time_ms: None,
            recent_pitches: Vec::with_capacity(3),
            stats: Stats::default(),
            rms_history: Vec::with_capacity(RMS_HISTORY_LEN),
            stats_window_start_ms: None,
            hops_in_window: 0,
            overruns_in_window: 0,
        }
    }

    pub fn active_confirmed_note(&self) -> Option<i32> {
        self.active_confirmed_note
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Record that the audio context missed a real-time deadline this
    /// window, so the next emitted `updatesPerSec` reflects the lost
    /// hops rather than overstating throughput.
    pub fn report_overrun(&mut self) {
        self.stats.overruns += 1;
        self.overruns_in_window += 1;
    }

    pub fn reset(&mut self) {
        self.active_confirmed_note = None;
        self.tentative = None;
        self.silence_frames = 0;
        self.recently_confirmed_pitch = None;
        self.recently_confirmed_time_ms = None;
        self.recent_pitches.clear();
        self.rms_history.clear();
        self.stats_window_start_ms = None;
        self.hops_in_window = 0;
        self.overruns_in_window = 0;
    }

    /// Process one analysis frame. `snapped` is the (possibly score-
    /// snapped) detector output for this frame, or `None` if the
    /// detector found nothing (silence, below the energy/confidence
    /// gate).
    pub fn process(
        &mut self,
        snapped: Option<RawDetection>,
        onset: OnsetResult,
        frame_rms: f32,
        timestamp_ms: u64,
    ) -> Vec<CoreMessage> {
        self.stats.frames_processed += 1;
        self.hops_in_window += 1;
        self.push_rms_history(frame_rms);
        self.stats.rms = frame_rms;
        self.stats.smoothed_rms = self.smoothed_rms();

        let mut out = vec![CoreMessage::Frame {
            rms: frame_rms,
            timestamp_ms,
        }];

        self.expire_stale_tentative(timestamp_ms, &mut out);

        let usable = if frame_rms < self.config.energy_gate_rms {
            None
        } else {
            snapped.filter(|d| d.confidence >= self.config.min_confidence)
        };

        match usable {
            None => self.handle_silence(timestamp_ms, &mut out),
            Some(detection) => self.handle_detection(detection, onset, timestamp_ms, &mut out),
        }

        if self.stats_window_elapsed(timestamp_ms) {
            out.push(CoreMessage::Stats(self.stats));
        }
        out
    }

    fn push_rms_history(&mut self, rms: f32) {
        self.rms_history.push(rms);
        if self.rms_history.len() > RMS_HISTORY_LEN {
            self.rms_history.remove(0);
        }
    }

    fn smoothed_rms(&self) -> f32 {
        if self.rms_history.is_empty() {
            return 0.0;
        }
        self.rms_history.iter().sum::<f32>() / self.rms_history.len() as f32
    }

    /// Whether a 500ms stats window has elapsed, per §6 ("every 500ms").
    /// Updates `updates_per_sec` and rolls the window over as a side
    /// effect when it has.
    fn stats_window_elapsed(&mut self, timestamp_ms: u64) -> bool {
        let window_start = *self.stats_window_start_ms.get_or_insert(timestamp_ms);
        let elapsed_ms = timestamp_ms.saturating_sub(window_start);
        if elapsed_ms < STATS_EMIT_INTERVAL_MS {
            return false;
        }

        let elapsed_secs = elapsed_ms as f32 / 1000.0;
        let counted_hops = self.hops_in_window.saturating_sub(self.overruns_in_window) as f32;
        self.stats.updates_per_sec = if elapsed_secs > 0.0 {
            counted_hops / elapsed_secs
        } else {
            0.0
        };
        trace!(updates_per_sec = self.stats.updates_per_sec, overruns = self.overruns_in_window, "stats window rolled over");

        self.stats_window_start_ms = Some(timestamp_ms);
        self.hops_in_window = 0;
        self.overruns_in_window = 0;
        true
    }

    fn handle_silence(&mut self, timestamp_ms: u64, out: &mut Vec<CoreMessage>) {
        self.tentative = None;
        self.silence_frames += 1;
        if let Some(active) = self.active_confirmed_note {
            if self.silence_frames >= self.config.silence_frames_for_note_off {
                out.push(CoreMessage::NoteOff {
                    pitch: active,
                    timestamp_ms,
                });
                self.active_confirmed_note = None;
            }
        }
    }

    fn handle_detection(
        &mut self,
        detection: RawDetection,
        onset: OnsetResult,
        timestamp_ms: u64,
        out: &mut Vec<CoreMessage>,
    ) {
        self.silence_frames = 0;
        self.track_stability(detection.pitch);

        // A second attack on the currently-sustained pitch (same key
        // struck again) re-opens the confirmation cycle instead of
        // being absorbed as ongoing sustain.
        let retrigger = onset.is_onset && self.active_confirmed_note == Some(detection.pitch);
        if retrigger {
            out.push(CoreMessage::NoteOff {
                pitch: detection.pitch,
                timestamp_ms,
            });
            self.active_confirmed_note = None;
        } else if self.active_confirmed_note == Some(detection.pitch) {
            // Already sustaining this note; the Frame event already
            // covers it, no need to re-run it through the tentative path.
            return;
        }

        if !retrigger {
            if self.is_rejected_octave_error(detection.pitch, timestamp_ms) {
                self.stats.octave_errors_rejected += 1;
                debug!(pitch = detection.pitch, timestamp_ms, "rejected octave error");
                return;
            }

            // A small correction on an already-sustained note (the
            // player's pitch wobbling within a couple of semitones)
            // doesn't need a fresh attack to confirm; a genuinely
            // different note does, so legato bleed from the previous
            // note can't masquerade as one.
            let requires_onset = match self.active_confirmed_note {
                None => false,
                Some(active) => {
                    (detection.pitch - active).abs() > self.config.small_interval_semitones
                }
            };
            if requires_onset && !onset.is_onset {
                return;
            }
        }

        let is_octave_change = self
            .active_confirmed_note
            .map(|active| matches!((detection.pitch - active).abs(), 12 | 24))
            .unwrap_or(false);

        let frames_seen = match &mut self.tentative {
            Some(t) if t.pitch == detection.pitch => {
                t.frames_seen += 1;
                t.last_seen_timestamp_ms = timestamp_ms;
                t.frames_seen
            }
            _ => {
                let required_frames = if retrigger {
                    self.config.onset_triggered_required_frames
                } else {
                    self.required_frames_for(detection.pitch)
                };
                self.tentative = Some(TentativeState {
                    pitch: detection.pitch,
                    frames_seen: 1,
                    required_frames,
                    last_seen_timestamp_ms: timestamp_ms,
                });
                1
            }
        };
        let required_frames = self
            .tentative
            .as_ref()
            .map(|t| t.required_frames)
            .unwrap_or(self.config.onset_triggered_required_frames);

        let confidence_ok =
            !is_octave_change || detection.confidence >= self.config.octave_change_min_confidence;

        if frames_seen >= required_frames && confidence_ok {
            if let Some(old) = self.active_confirmed_note {
                if old != detection.pitch {
                    out.push(CoreMessage::NoteOff {
                        pitch: old,
                        timestamp_ms,
                    });
                }
            }
            self.active_confirmed_note = Some(detection.pitch);
            self.tentative = None;
            self.recently_confirmed_pitch = Some(detection.pitch);
            self.recently_confirmed_time_ms = Some(timestamp_ms);
            debug!(pitch = detection.pitch, frames_seen, timestamp_ms, "tentative confirmed");
            out.push(CoreMessage::Confirmed(Detection::from_raw(
                &detection,
                timestamp_ms,
                DetectionKind::Confirmed,
            )));
        } else {
            out.push(CoreMessage::Tentative(Detection::from_raw(
                &detection,
                timestamp_ms,
                DetectionKind::Tentative,
            )));
        }
    }

    fn expire_stale_tentative(&mut self, timestamp_ms: u64, out: &mut Vec<CoreMessage>) {
        if let Some(t) = &self.tentative {
            let age = timestamp_ms.saturating_sub(t.last_seen_timestamp_ms);
            if age > self.config.stale_tentative_timeout_ms {
                debug!(pitch = t.pitch, age_ms = age, "cancelled stale tentative");
                out.push(CoreMessage::Cancelled {
                    pitch: t.pitch,
                    timestamp_ms,
                });
                self.tentative = None;
            }
        }
    }

    fn required_frames_for(&self, candidate_pitch: i32) -> u32 {
        match self.active_confirmed_note {
            None => self.config.first_note_required_frames,
            Some(active) => {
                let interval = (candidate_pitch - active).abs();
                if interval == 12 || interval == 24 {
                    // An octave change earns the same conservative
                    // window as establishing a note from silence — it's
                    // the detector's most common failure mode.
                    self.config.first_note_required_frames
                } else if interval <= self.config.small_interval_semitones {
                    self.config.small_interval_required_frames
                } else {
                    self.config.onset_triggered_required_frames
                }
            }
        }
    }

    /// Reject a detection at an octave, double-octave, or
    /// octave-plus-fifth below a note confirmed within the last
    /// `octave_error_window_ms` — the detector's most common failure
    /// mode on sustained low notes.
    fn is_rejected_octave_error(&self, candidate_pitch: i32, timestamp_ms: u64) -> bool {
        match (self.recently_confirmed_pitch, self.recently_confirmed_time_ms) {
            (Some(confirmed), Some(confirmed_at)) => {
                let age = timestamp_ms.saturating_sub(confirmed_at);
                age <= self.config.octave_error_window_ms
                    && matches!(confirmed - candidate_pitch, 12 | 24 | 19 | 7)
            }
            _ => false,
        }
    }

    fn track_stability(&mut self, pitch: i32) {
        self.recent_pitches.push(pitch);
        if self.recent_pitches.len() > 3 {
            self.recent_pitches.remove(0);
        }
        if self.recent_pitches.len() == 3 {
            let matches = self.recent_pitches.iter().filter(|&&p| p == pitch).count();
            if matches >= 2 {
                self.stats.stable_frames += 1;
            }
        }
    }
}
