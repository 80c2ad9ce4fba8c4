//! Per-frame RMS differentiator producing an onset flag + strength (§4.3).

const RMS_FLOOR: f32 = 1e-6;
const ONSET_RATIO: f32 = 1.5;
const ONSET_RMS_FLOOR: f32 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetResult {
    pub is_onset: bool,
    pub strength: f32,
}

#[derive(Default)]
pub struct OnsetDetector {
    previous_rms: Option<f32>,
}

impl OnsetDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&mut self, frame: &[f32]) -> OnsetResult {
        let current_rms = rms(frame);

        let strength = match self.previous_rms {
            None => 1.0,
            Some(prev) if prev > RMS_FLOOR => current_rms / prev,
            // Previous frame was effectively silent: any real loudness
            // now is an attack, not a ratio to compute.
            Some(_) => f32::INFINITY,
        };

        let is_onset = strength > ONSET_RATIO && current_rms > ONSET_RMS_FLOOR;

        self.previous_rms = Some(current_rms);

        OnsetResult { is_onset, strength }
    }

    pub fn reset(&mut self) {
        self.previous_rms = None;
    }
}

pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = frame.iter().map(|&s| s * s).sum();
    (sum_sq / frame.len() as f32).sqrt()
}
