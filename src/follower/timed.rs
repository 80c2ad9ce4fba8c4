//! Time-indexed follower (§4.6): every note has an expected wall-clock
//! time, and a confirmed detection is scored against the nearest
//! unmatched note whose timing window contains it.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exercise::{Exercise, ExerciseNote, Hand};
use crate::music;

/// `{onTimeToleranceMs, maxTimingWindowMs}` from §4.6, unchanged from
/// the spec's literal defaults — the §8 scenarios assert against these
/// exact numbers, so this is not a tuning knob to second-guess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedFollowerConfig {
    pub on_time_tolerance_ms: f64,
    pub max_timing_window_ms: f64,
}

impl Default for TimedFollowerConfig {
    fn default() -> Self {
        Self {
            on_time_tolerance_ms: 150.0,
            max_timing_window_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Early,
    OnTime,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteMatch {
    pub note_index: usize,
    pub pitch: i32,
    pub timing: Timing,
    pub timing_error_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissedNote {
    pub note_index: usize,
    pub pitch: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteState {
    Pending,
    Matched,
    Missed,
}

/// §3's expected-note lifecycle: `pending` until its window opens,
/// `active` while the window currently contains `timestamp_ms`, then
/// resolves to `hit` or `missed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStatus {
    Pending,
    Active,
    Hit,
    Missed,
}

/// The full "expected note (timed)" shape from §3:
/// `{noteName, hand, bar, index, expectedTimeMs, status, finger}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedNote {
    pub note_name: String,
    pub hand: Hand,
    pub bar: u32,
    pub index: u32,
    pub expected_time_ms: f64,
    pub status: NoteStatus,
    pub finger: Option<u8>,
}

/// `{total, matched, missed, pending, percentComplete}` (§4.6
/// `getProgress`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub matched: usize,
    pub missed: usize,
    pub pending: usize,
    pub percent_complete: f64,
}

pub struct TimedFollower {
    config: TimedFollowerConfig,
    exercise: Exercise,
    states: Vec<NoteState>,
}

impl TimedFollower {
    pub fn new(exercise: Exercise, config: TimedFollowerConfig) -> Self {
        let states = vec![NoteState::Pending; exercise.notes.len()];
        Self {
            config,
            exercise,
            states,
        }
    }

    pub fn reset(&mut self) {
        self.states = vec![NoteState::Pending; self.exercise.notes.len()];
    }

    /// Match a confirmed detection (by pitch-class, to forgive octave
    /// selection per §4.6) against the earliest still-pending note
    /// whose window contains `timestamp_ms`. Ties among same-pitch
    /// pending notes resolve to the lowest index, since notes are
    /// already visited in ascending index order.
    pub fn process_detection(&mut self, pitch: i32, timestamp_ms: f64) -> Option<NoteMatch> {
        let mut found = None;
        for (index, note) in self.exercise.notes.iter().enumerate() {
            if self.states[index] != NoteState::Pending || !music::same_pitch_class(note.pitch, pitch) {
                continue;
            }
            let expected = self.exercise.expected_time_ms(note);
            if (timestamp_ms - expected).abs() <= self.config.max_timing_window_ms {
                found = Some(index);
                break;
            }
        }

        let index = found?;
        let note = self.exercise.notes[index];
        let expected = self.exercise.expected_time_ms(&note);
        let timing_error_ms = timestamp_ms - expected;
        let timing = if timing_error_ms < -self.config.on_time_tolerance_ms {
            Timing::Early
        } else if timing_error_ms > self.config.on_time_tolerance_ms {
            Timing::Late
        } else {
            Timing::OnTime
        };

        self.states[index] = NoteState::Matched;
        Some(NoteMatch {
            note_index: index,
            pitch,
            timing,
            timing_error_ms,
        })
    }

    /// Sweep for notes whose timing window has fully elapsed without a
    /// match and mark them missed. Idempotent: a note already
    /// `matched` or `missed` is never revisited.
    pub fn advance_missed_notes(&mut self, timestamp_ms: f64) -> Vec<MissedNote> {
        let mut missed = Vec::new();
        for (index, note) in self.exercise.notes.iter().enumerate() {
            if self.states[index] != NoteState::Pending {
                continue;
            }
            let expected = self.exercise.expected_time_ms(note);
            if timestamp_ms > expected + self.config.max_timing_window_ms {
                self.states[index] = NoteState::Missed;
                missed.push(MissedNote {
                    note_index: index,
                    pitch: note.pitch,
                });
            }
        }
        if !missed.is_empty() {
            info!(count = missed.len(), timestamp_ms, "swept missed notes");
        }
        missed
    }

    /// Up to three pending notes whose window currently contains
    /// `timestamp_ms`, for UI highlighting (§4.6 `getExpectedNotes`),
    /// each carrying the full §3 expected-note shape.
    pub fn expected_notes_at(&self, timestamp_ms: f64) -> Vec<ExpectedNote> {
        self.exercise
            .notes
            .iter()
            .enumerate()
            .filter(|(index, note)| {
                self.states[*index] == NoteState::Pending && {
                    let expected = self.exercise.expected_time_ms(note);
                    (timestamp_ms - expected).abs() <= self.config.max_timing_window_ms
                }
            })
            .map(|(_, note)| self.expected_note_view(note))
            .take(3)
            .collect()
    }

    /// The §3 expected-note view of a single note, with `status`
    /// resolved from this follower's current state (`hit`/`missed` once
    /// resolved, `active` while its window is presently open — the
    /// caller already knows the window is open when building this from
    /// `expected_notes_at`, so it's always `Active` there).
    fn expected_note_view(&self, note: &ExerciseNote) -> ExpectedNote {
        ExpectedNote {
            note_name: music::name_from_pitch(note.pitch),
            hand: note.hand,
            bar: note.bar,
            index: note.index,
            expected_time_ms: self.exercise.expected_time_ms(note),
            status: NoteStatus::Active,
            finger: note.finger,
        }
    }

    /// Every note's current §3 expected-note view: `pending` until its
    /// window opens, `active` while `timestamp_ms` sits inside it,
    /// `hit`/`missed` once resolved.
    pub fn all_expected_notes(&self, timestamp_ms: f64) -> Vec<ExpectedNote> {
        self.exercise
            .notes
            .iter()
            .enumerate()
            .map(|(index, note)| {
                let status = match self.states[index] {
                    NoteState::Matched => NoteStatus::Hit,
                    NoteState::Missed => NoteStatus::Missed,
                    NoteState::Pending => {
                        let expected = self.exercise.expected_time_ms(note);
                        if (timestamp_ms - expected).abs() <= self.config.max_timing_window_ms {
                            NoteStatus::Active
                        } else {
                            NoteStatus::Pending
                        }
                    }
                };
                ExpectedNote {
                    note_name: music::name_from_pitch(note.pitch),
                    hand: note.hand,
                    bar: note.bar,
                    index: note.index,
                    expected_time_ms: self.exercise.expected_time_ms(note),
                    status,
                    finger: note.finger,
                }
            })
            .collect()
    }

    pub fn progress(&self) -> Progress {
        let total = self.states.len();
        let matched = self.states.iter().filter(|s| **s == NoteState::Matched).count();
        let missed = self.states.iter().filter(|s| **s == NoteState::Missed).count();
        let pending = total - matched - missed;
        let percent_complete = if total == 0 {
            0.0
        } else {
            100.0 * matched as f64 / total as f64
        };
        Progress {
            total,
            matched,
            missed,
            pending,
            percent_complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.states.iter().all(|s| *s != NoteState::Pending)
    }
}
