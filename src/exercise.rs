//! Exercise definitions (§6): the score the followers track progress
//! against.

use crate::error::StaccatoError;
use crate::music;

/// Which hand a note is assigned to, or neither when the passage
/// doesn't distinguish (a single-staff melody, a free-play listening
/// session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
    None,
}

/// A note as authored in a score: a name rather than a resolved pitch
/// integer, a hand, a bar, and an optional fingering suggestion. Several
/// `NoteSpec`s sharing a `bar` are distributed uniformly across that
/// bar's beats by [`Exercise::from_score`].
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSpec {
    pub name: String,
    pub hand: Hand,
    pub bar: u32,
    pub finger: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub name: String,
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub beat_unit: u32,
    pub lead_in_ms: u64,
    pub notes: Vec<ExerciseNote>,
}

/// A note resolved into the exercise's own playback timeline, positioned
/// by beat offset from the first beat of the exercise (beat 0),
/// independent of lead-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExerciseNote {
    pub pitch: i32,
    pub hand: Hand,
    /// 1-based bar this note falls in, per §6.
    pub bar: u32,
    /// 0-based position of this note within the exercise's flattened
    /// note sequence.
    pub index: u32,
    pub finger: Option<u8>,
    pub beat_offset: f64,
    pub duration_beats: f64,
}

impl ExerciseNote {
    /// Build a note with no hand/bar/fingering metadata (`Hand::None`,
    /// `bar = 1`, `index = 0`), for callers that only care about pitch
    /// and timing — most unit tests, and any caller constructing an
    /// exercise without score structure.
    pub fn simple(pitch: i32, beat_offset: f64, duration_beats: f64) -> Self {
        Self {
            pitch,
            hand: Hand::None,
            bar: 1,
            index: 0,
            finger: None,
            beat_offset,
            duration_beats,
        }
    }
}

impl Exercise {
    pub fn new(
        name: impl Into<String>,
        bpm: f64,
        beats_per_bar: u32,
        beat_unit: u32,
        lead_in_ms: u64,
        notes: Vec<ExerciseNote>,
    ) -> Result<Self, StaccatoError> {
        if bpm <= 0.0 {
            return Err(StaccatoError::NonPositiveBpm(bpm));
        }
        if notes.is_empty() {
            return Err(StaccatoError::EmptyExpectedNotes);
        }
        Ok(Self {
            name: name.into(),
            bpm,
            beats_per_bar,
            beat_unit,
            lead_in_ms,
            notes,
        })
    }

    /// Build an exercise from score-authored note groups (§6): `{name,
    /// bpm, beatsPerBar, beatUnit, leadInMs, notes: [{names, hand, bar,
    /// finger}]}`. `expectedTimeMs` (carried here as `beat_offset`, in
    /// beats rather than milliseconds, so it composes with
    /// `Exercise::expected_time_ms`) is derived per note group by
    /// distributing its notes uniformly within their bar, starting at
    /// `(bar − 1) * beatsPerBar * (60000/bpm) + leadInMs` — i.e. bar
    /// `N`'s notes begin at beat offset `(N - 1) * beatsPerBar` and
    /// split that bar's beats evenly among however many notes land in
    /// it.
    pub fn from_score(
        name: impl Into<String>,
        bpm: f64,
        beats_per_bar: u32,
        beat_unit: u32,
        lead_in_ms: u64,
        groups: Vec<NoteSpec>,
    ) -> Result<Self, StaccatoError> {
        if bpm <= 0.0 {
            return Err(StaccatoError::NonPositiveBpm(bpm));
        }
        if groups.is_empty() {
            return Err(StaccatoError::EmptyExpectedNotes);
        }

        let mut notes = Vec::with_capacity(groups.len());
        let mut index = 0u32;
        let mut start = 0;
        while start < groups.len() {
            let bar = groups[start].bar;
            let mut end = start;
            while end < groups.len() && groups[end].bar == bar {
                end += 1;
            }
            let bar_group = &groups[start..end];
            let slice_beats = beats_per_bar as f64 / bar_group.len() as f64;
            let bar_start_beat = (bar.saturating_sub(1)) as f64 * beats_per_bar as f64;

            for (slot, spec) in bar_group.iter().enumerate() {
                let pitch = music::pitch_from_name(&spec.name)?;
                notes.push(ExerciseNote {
                    pitch,
                    hand: spec.hand,
                    bar: spec.bar,
                    index,
                    finger: spec.finger,
                    beat_offset: bar_start_beat + slot as f64 * slice_beats,
                    duration_beats: slice_beats,
                });
                index += 1;
            }
            start = end;
        }

        Ok(Self {
            name: name.into(),
            bpm,
            beats_per_bar,
            beat_unit,
            lead_in_ms,
            notes,
        })
    }

    /// Milliseconds per beat at this exercise's tempo.
    pub fn ms_per_beat(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// The wall-clock timestamp (relative to playback start, including
    /// lead-in) a note is expected to begin at (§6 "expectedTimeMs").
    pub fn expected_time_ms(&self, note: &ExerciseNote) -> f64 {
        self.lead_in_ms as f64 + note.beat_offset * self.ms_per_beat()
    }

    /// Duration of a note in milliseconds at this exercise's tempo.
    pub fn note_duration_ms(&self, note: &ExerciseNote) -> f64 {
        note.duration_beats * self.ms_per_beat()
    }

    /// All distinct pitches this exercise ever expects, used to seed
    /// `UiCommand::SetExpectedNotes` and the pitch detector's low-note
    /// window selection.
    pub fn distinct_pitches(&self) -> Vec<i32> {
        let mut pitches: Vec<i32> = self.notes.iter().map(|n| n.pitch).collect();
        pitches.sort_unstable();
        pitches.dedup();
        pitches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notes() -> Vec<ExerciseNote> {
        vec![
            ExerciseNote::simple(60, 0.0, 1.0),
            ExerciseNote::simple(62, 1.0, 1.0),
            ExerciseNote::simple(64, 2.0, 2.0),
        ]
    }

    #[test]
    fn expected_time_accounts_for_lead_in_and_tempo() {
        let exercise = Exercise::new("scale", 120.0, 4, 4, 2000, sample_notes()).unwrap();
        assert_eq!(exercise.ms_per_beat(), 500.0);
        assert_eq!(exercise.expected_time_ms(&exercise.notes[0]), 2000.0);
        assert_eq!(exercise.expected_time_ms(&exercise.notes[1]), 2500.0);
        assert_eq!(exercise.expected_time_ms(&exercise.notes[2]), 3000.0);
    }

    #[test]
    fn note_duration_scales_with_tempo() {
        let exercise = Exercise::new("scale", 60.0, 4, 4, 0, sample_notes()).unwrap();
        assert_eq!(exercise.note_duration_ms(&exercise.notes[2]), 2000.0);
    }

    #[test]
    fn distinct_pitches_are_sorted_and_deduped() {
        let notes = vec![
            ExerciseNote::simple(64, 0.0, 1.0),
            ExerciseNote::simple(60, 1.0, 1.0),
            ExerciseNote::simple(64, 2.0, 1.0),
        ];
        let exercise = Exercise::new("x", 100.0, 4, 4, 0, notes).unwrap();
        assert_eq!(exercise.distinct_pitches(), vec![60, 64]);
    }

    #[test]
    fn rejects_non_positive_bpm() {
        assert!(Exercise::new("x", 0.0, 4, 4, 0, sample_notes()).is_err());
    }

    #[test]
    fn rejects_empty_notes() {
        assert!(Exercise::new("x", 100.0, 4, 4, 0, vec![]).is_err());
    }

    /// §6: notes sharing a bar split that bar's beats evenly; a bar
    /// with a single note group starts exactly on the bar's first beat.
    #[test]
    fn from_score_distributes_notes_uniformly_within_a_bar() {
        let groups = vec![
            NoteSpec { name: "C4".to_string(), hand: Hand::Right, bar: 1, finger: Some(1) },
            NoteSpec { name: "E4".to_string(), hand: Hand::Right, bar: 1, finger: Some(3) },
            NoteSpec { name: "G4".to_string(), hand: Hand::Right, bar: 2, finger: Some(5) },
        ];
        let exercise = Exercise::from_score("arpeggio", 120.0, 4, 4, 0, groups).unwrap();

        assert_eq!(exercise.notes[0].pitch, 60);
        assert_eq!(exercise.notes[0].beat_offset, 0.0);
        assert_eq!(exercise.notes[0].duration_beats, 2.0);
        assert_eq!(exercise.notes[0].index, 0);
        assert_eq!(exercise.notes[0].hand, Hand::Right);
        assert_eq!(exercise.notes[0].finger, Some(1));

        assert_eq!(exercise.notes[1].pitch, 64);
        assert_eq!(exercise.notes[1].beat_offset, 2.0);
        assert_eq!(exercise.notes[1].index, 1);

        // Second bar starts at beat 4 (= beatsPerBar) and has the whole
        // bar to itself since it's the lone note group there.
        assert_eq!(exercise.notes[2].pitch, 67);
        assert_eq!(exercise.notes[2].bar, 2);
        assert_eq!(exercise.notes[2].beat_offset, 4.0);
        assert_eq!(exercise.notes[2].duration_beats, 4.0);
        assert_eq!(exercise.notes[2].index, 2);
    }

    #[test]
    fn from_score_honors_lead_in_when_computing_expected_time() {
        let groups = vec![NoteSpec { name: "C4".to_string(), hand: Hand::None, bar: 1, finger: None }];
        let exercise = Exercise::from_score("one-note", 120.0, 4, 4, 1000, groups).unwrap();
        assert_eq!(exercise.expected_time_ms(&exercise.notes[0]), 1000.0);
    }

    #[test]
    fn from_score_rejects_malformed_note_names() {
        let groups = vec![NoteSpec { name: "H9".to_string(), hand: Hand::None, bar: 1, finger: None }];
        assert!(Exercise::from_score("bad", 120.0, 4, 4, 0, groups).is_err());
    }
}
