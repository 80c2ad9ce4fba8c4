//! Real-time pitch detection and score-following for interactive piano
//! practice.
//!
//! The pipeline runs leaves-first: raw samples accumulate in a
//! [`ring_buffer::RingBuffer`], an [`onset::OnsetDetector`] flags
//! attacks, a [`pitch_detector::PitchDetector`] turns a frame into a
//! [`pitch_detector::RawDetection`], [`snapper`] nudges that detection
//! onto the current exercise's expected notes, and
//! [`confirmation::ConfirmationEngine`] turns the resulting stream into
//! tentative/confirmed [`messages::Detection`]s with onset re-trigger
//! gating and octave-error rejection. Two independent followers
//! ([`follower::timed`], [`follower::pattern`]) turn confirmed
//! detections into progress against an [`exercise::Exercise`].
//!
//! Microphone capture and audio output are intentionally outside this
//! crate's scope — callers feed it sample frames however they obtain
//! them (a capture callback, a WAV file, synthetic test tones from
//! [`testing`]).
//!
//! ```
//! use staccato_core::pitch_detector::{PitchDetector, PitchDetectorConfig};
//! use staccato_core::testing::sine_tone;
//!
//! let detector = PitchDetector::new(PitchDetectorConfig::default());
//! let frame = sine_tone(440.0, 44100.0, 3072, 0.5);
//! let detection = detector.detect(&frame).expect("a440 should be detected");
//! assert_eq!(detection.pitch, 69);
//! ```

pub mod confirmation;
pub mod error;
pub mod exercise;
pub mod follower;
pub mod messages;
pub mod music;
pub mod onset;
pub mod pitch_detector;
pub mod ring_buffer;
pub mod snapper;
pub mod testing;

pub use error::StaccatoError;
