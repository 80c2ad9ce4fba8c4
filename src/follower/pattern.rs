//! Pattern-indexed follower (§4.7): tracks progress by note order
//! alone, tolerating tempo drift and letting a player pick up in the
//! middle of an exercise instead of demanding they start at note zero.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::music;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternFollowerConfig {
    pub buffer_size: usize,
    pub lock_threshold: f32,
    pub min_matches_for_lock: usize,
    pub max_consecutive_errors: u32,
    pub allow_octave_equivalence: bool,
    pub strict: bool,
}

impl Default for PatternFollowerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 5,
            lock_threshold: 0.7,
            min_matches_for_lock: 3,
            max_consecutive_errors: 5,
            allow_octave_equivalence: true,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Syncing,
    Locked,
    Lost,
}

/// `{detected, expected, isCorrect, position, mode, confidence,
/// consecutiveErrors, message}` (§4.7 `processNote` result shape).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub detected: i32,
    pub expected: Option<i32>,
    pub is_correct: bool,
    /// `-1` while syncing, per §3's follower-state invariant.
    pub position: i32,
    pub mode: Mode,
    pub confidence: f32,
    pub consecutive_errors: u32,
    pub message: &'static str,
}

pub struct PatternFollower {
    config: PatternFollowerConfig,
    pattern: Vec<i32>,
    buffer: VecDeque<i32>,
    mode: Mode,
    position: i32,
    confidence: f32,
    consecutive_errors: u32,
    total_correct: u64,
    total_wrong: u64,
}

impl PatternFollower {
    pub fn new(pattern: Vec<i32>, config: PatternFollowerConfig) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.buffer_size),
            config,
            pattern,
            mode: Mode::Syncing,
            position: -1,
            confidence: 0.0,
            consecutive_errors: 0,
            total_correct: 0,
            total_wrong: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn total_correct(&self) -> u64 {
        self.total_correct
    }

    pub fn total_wrong(&self) -> u64 {
        self.total_wrong
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.mode = Mode::Syncing;
        self.position = -1;
        self.confidence = 0.0;
        self.consecutive_errors = 0;
        self.total_correct = 0;
        self.total_wrong = 0;
    }

    /// Once `mode == Locked` and `position == pattern.len() - 1`, the
    /// follower is done: further notes still produce a result (per
    /// §4.7's completion invariant) but never advance past the end.
    pub fn is_complete(&self) -> bool {
        self.mode == Mode::Locked && self.position as usize + 1 == self.pattern.len()
    }

    pub fn process_note(&mut self, detected: i32) -> MatchResult {
        match self.mode {
            Mode::Lost => {
                // §4.7 "Lost": the next detection alone reseeds the
                // buffer and drops straight back into syncing; it does
                // not itself attempt a lock.
                self.buffer.clear();
                self.buffer.push_back(detected);
                self.consecutive_errors = 0;
                self.confidence = 0.0;
                self.mode = Mode::Syncing;
                MatchResult {
                    detected,
                    expected: None,
                    is_correct: false,
                    position: -1,
                    mode: Mode::Syncing,
                    confidence: 0.0,
                    consecutive_errors: 0,
                    message: "resyncing after lost sync",
                }
            }
            Mode::Syncing => self.process_syncing(detected),
            Mode::Locked if self.is_complete() => MatchResult {
                detected,
                expected: self.pattern.last().copied(),
                is_correct: self
                    .pattern
                    .last()
                    .map(|&p| self.notes_equivalent(detected, p))
                    .unwrap_or(false),
                position: self.position,
                mode: Mode::Locked,
                confidence: self.confidence,
                consecutive_errors: self.consecutive_errors,
                message: "exercise complete",
            },
            Mode::Locked => self.process_locked(detected),
        }
    }

    fn process_syncing(&mut self, detected: i32) -> MatchResult {
        if self.buffer.len() == self.config.buffer_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(detected);

        if self.buffer.len() >= self.config.min_matches_for_lock {
            if let Some((offset, score)) = self.best_offset() {
                if score >= self.config.lock_threshold {
                    let span = self.buffer.len().min(self.pattern.len() - offset);
                    let buffer: Vec<i32> = self.buffer.iter().copied().collect();
                    let start = buffer.len() - span;
                    for i in 0..span {
                        if music::same_pitch_class(buffer[start + i], self.pattern[offset + i]) {
                            self.total_correct += 1;
                        } else {
                            self.total_wrong += 1;
                        }
                    }

                    self.position = (offset + span - 1) as i32;
                    self.mode = Mode::Locked;
                    self.confidence = score;
                    self.consecutive_errors = 0;

                    info!(position = self.position, confidence = score, "locked onto pattern");
                    return MatchResult {
                        detected,
                        expected: Some(self.pattern[self.position as usize]),
                        is_correct: music::same_pitch_class(detected, self.pattern[self.position as usize]),
                        position: self.position,
                        mode: Mode::Locked,
                        confidence: self.confidence,
                        consecutive_errors: 0,
                        message: "locked onto pattern",
                    };
                }
            }
        }

        MatchResult {
            detected,
            expected: None,
            is_correct: false,
            position: -1,
            mode: Mode::Syncing,
            confidence: 0.0,
            consecutive_errors: 0,
            message: "syncing",
        }
    }

    fn process_locked(&mut self, detected: i32) -> MatchResult {
        let next_index = (self.position + 1) as usize;
        let expected_pitch = self.pattern[next_index];
        let matched = self.notes_equivalent(detected, expected_pitch);

        if matched {
            self.position += 1;
            self.consecutive_errors = 0;
            self.confidence = (self.confidence + 0.1).min(1.0);
            self.total_correct += 1;
        } else {
            self.consecutive_errors += 1;
            self.confidence = (self.confidence - 0.15).max(0.0);
            self.total_wrong += 1;
            if !self.config.strict {
                self.position += 1;
            }
        }

        let message = if matched {
            "matched"
        } else if self.config.strict {
            "wrong note, holding position"
        } else {
            "wrong note, advancing anyway"
        };

        let result = MatchResult {
            detected,
            expected: Some(expected_pitch),
            is_correct: matched,
            position: self.position,
            mode: Mode::Locked,
            confidence: self.confidence,
            consecutive_errors: self.consecutive_errors,
            message,
        };

        if self.consecutive_errors >= self.config.max_consecutive_errors {
            self.mode = Mode::Lost;
            info!(
                consecutive_errors = self.consecutive_errors,
                position = self.position,
                "lost sync"
            );
            return MatchResult {
                mode: Mode::Lost,
                message: "lost sync: too many consecutive errors",
                ..result
            };
        }

        result
    }

    fn notes_equivalent(&self, a: i32, b: i32) -> bool {
        if self.config.allow_octave_equivalence {
            music::same_pitch_class(a, b)
        } else {
            a == b
        }
    }

    /// Weighted pitch-class match rate of the current buffer against
    /// every feasible starting offset in the pattern, most-recent-
    /// weighted (weights `1..=buffer.len()`) so a drifting match still
    /// favours the freshest notes.
    fn best_offset(&self) -> Option<(usize, f32)> {
        if self.buffer.is_empty() || self.pattern.is_empty() {
            return None;
        }
        let buffer: Vec<i32> = self.buffer.iter().copied().collect();
        let n = buffer.len();
        let max_offset = self.pattern.len().saturating_sub(1);

        let mut best: Option<(usize, f32)> = None;
        for offset in 0..=max_offset {
            let span = n.min(self.pattern.len() - offset);
            if span == 0 {
                continue;
            }
            let mut score = 0.0f32;
            let mut total_weight = 0.0f32;
            for i in 0..span {
                let weight = (i + 1) as f32;
                total_weight += weight;
                let buffer_index = n - span + i;
                if music::same_pitch_class(buffer[buffer_index], self.pattern[offset + i]) {
                    score += weight;
                }
            }
            let normalized = if total_weight > 0.0 { score / total_weight } else { 0.0 };
            if normalized > 0.4 && best.map(|(_, s)| normalized > s).unwrap_or(true) {
                best = Some((offset, normalized));
            }
        }
        best
    }
}
