//! Pure music-theory primitives: pitch integers, note names, frequencies.
//!
//! Everything here is a pure function with no state, mirroring the
//! teacher's `pattern_tonal` note-name/MIDI tables but built around the
//! spec's pitch-integer identity rather than a pattern-language value.

use crate::error::StaccatoError;

/// Lowest pitch integer this crate will parse/emit a name for (A0).
pub const MIN_PITCH: i32 = 21;
/// Highest pitch integer this crate will parse/emit a name for (C8).
pub const MAX_PITCH: i32 = 108;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Parse a note name like `"C#4"` or `"Db4"` into a pitch integer.
///
/// Accepts both sharps (`#`) and flats (`b`) on input; emission is
/// always sharps-only (see [`name_from_pitch`]).
pub fn pitch_from_name(name: &str) -> Result<i32, StaccatoError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err(StaccatoError::MalformedNoteName(name.to_string()));
    }

    let letter = bytes[0].to_ascii_uppercase();
    let letter_class: i32 = match letter {
        b'C' => 0,
        b'D' => 2,
        b'E' => 4,
        b'F' => 5,
        b'G' => 7,
        b'A' => 9,
        b'B' => 11,
        _ => return Err(StaccatoError::MalformedNoteName(name.to_string())),
    };

    let mut idx = 1;
    let mut accidental = 0i32;
    if let Some(&b) = bytes.get(idx) {
        match b {
            b'#' => {
                accidental = 1;
                idx += 1;
            }
            b'b' | b'B' => {
                accidental = -1;
                idx += 1;
            }
            _ => {}
        }
    }

    let octave_str = std::str::from_utf8(&bytes[idx..])
        .map_err(|_| StaccatoError::MalformedNoteName(name.to_string()))?;
    let octave: i32 = octave_str
        .parse()
        .map_err(|_| StaccatoError::MalformedNoteName(name.to_string()))?;

    let pitch = (octave + 1) * 12 + letter_class + accidental;
    Ok(pitch)
}

/// Format a pitch integer as a canonical note name (sharps only).
///
/// `octave = floor(pitch / 12) - 1`. This is the inverse of
/// [`pitch_from_name`] for any name emitted by this function, but not
/// for flat-spelled input (sharps are preferred on emission per §4.1).
pub fn name_from_pitch(pitch: i32) -> String {
    let class = pitch.rem_euclid(12) as usize;
    let octave = pitch.div_euclid(12) - 1;
    format!("{}{}", SHARP_NAMES[class], octave)
}

/// Convert a pitch integer to frequency in Hz: `440 * 2^((pitch-69)/12)`.
pub fn freq_from_pitch(pitch: i32) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 69.0) / 12.0)
}

/// Convert a frequency in Hz to the nearest pitch integer.
pub fn pitch_from_freq(freq: f64) -> i32 {
    (69.0 + 12.0 * (freq / 440.0).log2()).round() as i32
}

/// Signed cents error between a detected and an expected frequency.
pub fn cents_error(detected: f64, expected: f64) -> f64 {
    1200.0 * (detected / expected).log2()
}

/// Pitch-class (0..12, mod-octave) of a pitch integer.
pub fn pitch_class(pitch: i32) -> i32 {
    pitch.rem_euclid(12)
}

/// Whether two pitches share a pitch class, ignoring octave.
pub fn same_pitch_class(a: i32, b: i32) -> bool {
    pitch_class(a) == pitch_class(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_pitch_through_name() {
        for p in MIN_PITCH..=MAX_PITCH {
            let name = name_from_pitch(p);
            let back = pitch_from_name(&name).unwrap();
            assert_eq!(back, p, "round trip failed for pitch {p} ({name})");
        }
    }

    #[test]
    fn round_trip_pitch_through_freq() {
        for p in MIN_PITCH..=MAX_PITCH {
            let freq = freq_from_pitch(p);
            let back = pitch_from_freq(freq);
            assert_eq!(back, p, "round trip failed for pitch {p} ({freq} Hz)");
        }
    }

    #[test]
    fn a4_is_440hz() {
        assert!((freq_from_pitch(69) - 440.0).abs() < 1e-9);
        assert_eq!(pitch_from_freq(440.0), 69);
    }

    #[test]
    fn parses_sharps_and_flats() {
        assert_eq!(pitch_from_name("C#4").unwrap(), pitch_from_name("Db4").unwrap());
        assert_eq!(pitch_from_name("C4").unwrap(), 60);
        assert_eq!(pitch_from_name("A4").unwrap(), 69);
    }

    #[test]
    fn emits_sharps_only() {
        assert_eq!(name_from_pitch(61), "C#4");
        assert_eq!(name_from_pitch(60), "C4");
    }

    #[test]
    fn malformed_names_fail() {
        assert!(pitch_from_name("").is_err());
        assert!(pitch_from_name("H4").is_err());
        assert!(pitch_from_name("C#").is_err());
    }

    #[test]
    fn cents_error_is_signed() {
        let sharp = cents_error(466.16, 440.0); // roughly a semitone sharp
        assert!(sharp > 90.0 && sharp < 110.0);
        let flat = cents_error(415.30, 440.0);
        assert!(flat < -90.0 && flat > -110.0);
        assert!((cents_error(440.0, 440.0)).abs() < 1e-6);
    }

    #[test]
    fn same_pitch_class_ignores_octave() {
        assert!(same_pitch_class(60, 72));
        assert!(same_pitch_class(60, 48));
        assert!(!same_pitch_class(60, 61));
    }
}
