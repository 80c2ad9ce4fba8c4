//! Error taxonomy (§7).
//!
//! Only construction-time input validation ever fails with an error;
//! every steady-state condition (silence, wrong note, lost sync, a
//! dropped hop) is recovered locally and reported as data through the
//! message/callback types in [`crate::messages`], never through this
//! type.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StaccatoError {
    #[error("malformed note name: {0:?}")]
    MalformedNoteName(String),

    #[error("expected note list must not be empty")]
    EmptyExpectedNotes,

    #[error("sample rate must be positive, got {0}")]
    NonPositiveSampleRate(f64),

    #[error("bpm must be positive, got {0}")]
    NonPositiveBpm(f64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
