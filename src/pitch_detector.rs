//! Monophonic pitch detector (§4.4).
//!
//! A cumulative-mean-normalised-difference (CMND) detector — the same
//! family as YIN (de Cheveigné & Kawahara, 2002; see also the YIN
//! implementation grounding this crate's difference-function and
//! parabolic-interpolation steps) — with an added octave-disambiguation
//! pass tuned for piano audio, where the fundamental is often one or
//! two octaves below what a naive first-minimum search finds.
//!
//! Pure with respect to its input frame: the detector holds only
//! immutable configuration, no running state. Stateful concerns
//! (hysteresis, tentative/confirmed, gating) live in
//! [`crate::confirmation`].

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::music;

/// A single pitch-detector output (§3 "Detection", pre-timestamp/kind —
/// the confirmation engine attaches `timestampMs`/`kind` when it turns
/// this into the public `Detection` message type).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub pitch: i32,
    pub note_name: String,
    pub frequency: f64,
    pub confidence: f32,
    pub clarity: f32,
    pub rms: f32,
    /// Set by the score-aware snapper (§4.4.1) when a raw detection was
    /// snapped to an expected pitch one or two octaves away. Always
    /// `false` coming directly out of the detector.
    pub octave_corrected: bool,
}

impl RawDetection {
    fn new(pitch: i32, frequency: f64, confidence: f32, rms: f32) -> Self {
        Self {
            pitch,
            note_name: music::name_from_pitch(pitch),
            frequency,
            confidence,
            clarity: confidence,
            rms,
            octave_corrected: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchDetectorConfig {
    pub sample_rate: f64,
    pub energy_gate_rms: f32,
    pub cmnd_threshold: f32,
    pub cmnd_hard_cap: f32,
    pub search_band_low_hz: f64,
    pub search_band_high_hz: f64,
    pub octave_check_below_hz: f64,
    pub octave_cmnd_threshold: f32,
    pub goertzel_ratio_threshold: f64,
    pub pitch_floor_hz: f64,
    pub pitch_ceiling_hz: f64,
}

impl Default for PitchDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            energy_gate_rms: 0.002,
            cmnd_threshold: 0.20,
            cmnd_hard_cap: 0.35,
            search_band_low_hz: 50.0,
            search_band_high_hz: 1000.0,
            octave_check_below_hz: 250.0,
            octave_cmnd_threshold: 0.30,
            goertzel_ratio_threshold: 0.20,
            pitch_floor_hz: 130.0,
            pitch_ceiling_hz: 4500.0,
        }
    }
}

/// Window length (samples) to analyse per §4.4: the low-note window
/// kicks in when the caller's expected-note set contains anything below
/// ~C3 (130 Hz), matching the UI→core `setExpectedNotes` contract (§6).
pub const WINDOW_STANDARD: usize = 3072;
pub const WINDOW_LOW_NOTE: usize = 6144;
pub const HOP_SAMPLES: usize = 512;

pub fn select_window_len(expected_pitches: &[i32]) -> usize {
    let has_low_note = expected_pitches
        .iter()
        .any(|&p| music::freq_from_pitch(p) < 130.0);
    if has_low_note {
        WINDOW_LOW_NOTE
    } else {
        WINDOW_STANDARD
    }
}

pub struct PitchDetector {
    config: PitchDetectorConfig,
}

impl PitchDetector {
    pub fn new(config: PitchDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PitchDetectorConfig {
        &self.config
    }

    /// Run the full detection pipeline (§4.4 steps 1-8) over one frame.
    pub fn detect(&self, frame: &[f32]) -> Option<RawDetection> {
        let rms = crate::onset::rms(frame);
        if rms < self.config.energy_gate_rms {
            return None;
        }

        let sr = self.config.sample_rate;
        let l = frame.len();
        let tau_max = (l / 2).min((sr / 50.0).floor() as usize);
        if tau_max < 4 {
            return None;
        }

        let difference = Self::difference_function(frame, tau_max);
        let cmnd = Self::cumulative_mean_normalized_difference(&difference, tau_max);

        let band_lo = (sr / self.config.search_band_high_hz).floor() as usize;
        let band_hi = ((sr / self.config.search_band_low_hz).ceil() as usize).min(tau_max - 1);
        if band_lo >= band_hi {
            return None;
        }

        let (tau, c_val) = Self::find_first_minimum(
            &cmnd,
            band_lo.max(2),
            band_hi,
            self.config.cmnd_threshold,
        )?;

        if c_val > self.config.cmnd_hard_cap {
            return None;
        }

        let refined_tau = Self::parabolic_interpolate(&cmnd, tau);
        let mut frequency = sr / refined_tau;
        let mut c_final = c_val;

        // Octave disambiguation (§4.4 step 6): piano audio often yields
        // a detection one or two octaves below the perceived pitch.
        if frequency < self.config.octave_check_below_hz {
            if let Some((alt_freq, alt_c)) =
                self.try_octave_up(frame, &cmnd, refined_tau, frequency, tau_max)
            {
                frequency = alt_freq;
                c_final = alt_c;
            }
        }

        // Pitch floor (§4.4 step 7): one more upward shift if spectral
        // energy at 2x still supports it.
        if frequency < self.config.pitch_floor_hz {
            let mag_here = goertzel_magnitude(frame, sr, frequency);
            let mag_double = goertzel_magnitude(frame, sr, frequency * 2.0);
            if mag_here > 0.0 && mag_double / mag_here >= self.config.goertzel_ratio_threshold {
                frequency *= 2.0;
            }
        }

        if frequency < self.config.pitch_floor_hz || frequency > self.config.pitch_ceiling_hz {
            return None;
        }

        let confidence = (1.0 - c_final).clamp(0.0, 1.0);
        let pitch = music::pitch_from_freq(frequency);
        Some(RawDetection::new(pitch, frequency, confidence, rms))
    }

    /// Consider halving the lag (doubling the frequency) per §4.4 step
    /// 6. Accepted when the higher candidate's CMND value is itself
    /// low, or when a Goertzel estimate confirms real energy up there.
    fn try_octave_up(
        &self,
        frame: &[f32],
        cmnd: &[f32],
        refined_tau: f64,
        frequency: f64,
        tau_max: usize,
    ) -> Option<(f64, f32)> {
        let half_tau = (refined_tau / 2.0).round() as usize;
        if half_tau < 2 || half_tau >= tau_max {
            return None;
        }
        let alt_c = cmnd[half_tau];
        let alt_freq = frequency * 2.0;

        let alt_c_is_good = alt_c < self.config.octave_cmnd_threshold;

        let mag_low = goertzel_magnitude(frame, self.config.sample_rate, frequency);
        let mag_high = goertzel_magnitude(frame, self.config.sample_rate, alt_freq);
        let spectral_support =
            mag_low > 0.0 && mag_high / mag_low >= self.config.goertzel_ratio_threshold;

        if alt_c_is_good || spectral_support {
            Some((alt_freq, alt_c.min(cmnd[(refined_tau.round() as usize).min(cmnd.len() - 1)])))
        } else {
            None
        }
    }

    /// `d(tau) = sum_{i=0}^{L-tau_max} (x[i] - x[i+tau])^2`
    fn difference_function(frame: &[f32], tau_max: usize) -> Vec<f32> {
        let mut d = vec![0.0f32; tau_max];
        let limit = frame.len().saturating_sub(tau_max);
        for tau in 0..tau_max {
            let mut sum = 0.0f32;
            for i in 0..limit {
                let diff = frame[i] - frame[i + tau];
                sum += diff * diff;
            }
            d[tau] = sum;
        }
        d
    }

    /// `c(0) = 1`; `c(tau) = d(tau) * tau / sum_{k=1}^{tau} d(k)` for `tau >= 1`.
    fn cumulative_mean_normalized_difference(d: &[f32], tau_max: usize) -> Vec<f32> {
        let mut c = vec![1.0f32; tau_max];
        let mut running_sum = 0.0f32;
        for tau in 1..tau_max {
            running_sum += d[tau];
            c[tau] = if running_sum > 1e-10 {
                d[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }
        c
    }

    /// First local minimum under `threshold` within `[lo, hi]`, walking
    /// forward to the true minimum once under threshold; falls back to
    /// the global argmin in-band if nothing clears the threshold.
    fn find_first_minimum(
        cmnd: &[f32],
        lo: usize,
        hi: usize,
        threshold: f32,
    ) -> Option<(usize, f32)> {
        let mut tau = lo.max(2);
        while tau < hi {
            if cmnd[tau] < threshold {
                while tau + 1 < hi && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                return Some((tau, cmnd[tau]));
            }
            tau += 1;
        }

        let mut best_tau = lo;
        let mut best_val = cmnd[lo];
        for t in lo..hi {
            if cmnd[t] < best_val {
                best_val = cmnd[t];
                best_tau = t;
            }
        }
        Some((best_tau, best_val))
    }

    /// Parabolic interpolation through `c(tau-1), c(tau), c(tau+1)`.
    fn parabolic_interpolate(cmnd: &[f32], tau: usize) -> f64 {
        if tau == 0 || tau + 1 >= cmnd.len() {
            return tau as f64;
        }
        let s0 = cmnd[tau - 1] as f64;
        let s1 = cmnd[tau] as f64;
        let s2 = cmnd[tau + 1] as f64;
        let denom = 2.0 * (2.0 * s1 - s2 - s0);
        if denom.abs() > 1e-10 {
            tau as f64 + (s2 - s0) / denom
        } else {
            tau as f64
        }
    }
}

/// Single-bin Goertzel magnitude estimate at `target_freq`, used to
/// corroborate octave decisions without a full FFT (§4.4 step 6).
pub fn goertzel_magnitude(frame: &[f32], sample_rate: f64, target_freq: f64) -> f64 {
    if target_freq <= 0.0 || frame.is_empty() {
        return 0.0;
    }
    let n = frame.len() as f64;
    let k = (0.5 + n * target_freq / sample_rate).floor();
    let omega = 2.0 * PI * k / n;
    let coeff = 2.0 * omega.cos();

    let mut s_prev = 0.0f64;
    let mut s_prev2 = 0.0f64;
    for &x in frame {
        let s = x as f64 + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    let real = s_prev - s_prev2 * omega.cos();
    let imag = s_prev2 * omega.sin();
    (real * real + imag * imag).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sine_tone;

    fn detector() -> PitchDetector {
        PitchDetector::new(PitchDetectorConfig::default())
    }

    #[test]
    fn detects_a440() {
        let frame = sine_tone(440.0, 44100.0, WINDOW_STANDARD, 0.5);
        let result = detector().detect(&frame).expect("should detect a tone");
        assert!((result.frequency - 440.0).abs() < 3.0);
        assert_eq!(result.pitch, 69);
    }

    #[test]
    fn detects_middle_c() {
        let frame = sine_tone(261.63, 44100.0, WINDOW_STANDARD, 0.5);
        let result = detector().detect(&frame).expect("should detect middle C");
        assert_eq!(result.pitch, 60);
    }

    #[test]
    fn silence_yields_no_detection() {
        let frame = vec![0.0f32; WINDOW_STANDARD];
        assert!(detector().detect(&frame).is_none());
    }

    #[test]
    fn below_pitch_floor_yields_no_detection_without_harmonic_support() {
        // A pure ~90 Hz tone with no harmonic content and no octave-up
        // spectral support should be rejected by the pitch floor.
        let frame = sine_tone(90.0, 44100.0, WINDOW_LOW_NOTE, 0.2);
        let result = detector().detect(&frame);
        if let Some(r) = result {
            // If it detected anything, it must have shifted above the floor.
            assert!(r.frequency >= 130.0);
        }
    }

    #[test]
    fn low_note_window_selected_when_expected_note_below_c3() {
        assert_eq!(select_window_len(&[60, 64, 67]), WINDOW_STANDARD);
        assert_eq!(select_window_len(&[40, 60]), WINDOW_LOW_NOTE);
    }

    #[test]
    fn confidence_is_high_for_clean_tone() {
        let frame = sine_tone(440.0, 44100.0, WINDOW_STANDARD, 0.5);
        let result = detector().detect(&frame).unwrap();
        assert!(result.confidence > 0.7, "confidence was {}", result.confidence);
    }
}
