// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo curve resolution.
//!
//! Resolves the instantaneous tempo inside a section and provides the
//! closed-form time integrals of each curve shape:
//!
//! - linear: `tempo(x) = a + b·x`, so `∫ 60/tempo = 60/b · ln(1 + b·x/a)`
//! - exponential: `tempo(x) = a·r^x`, so `∫ 60/tempo = 60/(a·ln r) · (1 - r^-x)`
//! - step: constant until the section end, so time is a plain division
//!
//! Both integrals are inverted exactly, which is what lets the mapper go
//! from elapsed seconds back to a musical position without iteration.

use crate::timeline::{Section, TempoCurve};

/// Below this relative tempo change a ramp is treated as constant
pub const RAMP_EPSILON: f64 = 1e-9;

/// Lower bound applied to exponential start tempos
const MIN_EXPONENTIAL_BPM: f64 = 1.0;

/// Resolve the tempo of a section at `progress` (0..1) through it
pub fn resolve_tempo(section: &Section, progress: f64) -> f64 {
    TempoRamp::from_section(section).tempo_at(progress)
}

/// Practice-mode tempo transform applied after curve resolution
///
/// An absolute override wins over the percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoTransform {
    /// Multiplicative tempo, 100 = unchanged
    pub percent: f64,
    /// Absolute tempo replacing every resolved value
    pub override_bpm: Option<f64>,
}

impl TempoTransform {
    /// Percentage-only transform
    pub fn percent(percent: f64) -> Self {
        Self {
            percent,
            override_bpm: None,
        }
    }

    /// Absolute override transform
    pub fn override_bpm(bpm: f64) -> Self {
        Self {
            percent: 100.0,
            override_bpm: Some(bpm),
        }
    }

    /// Whether this transform leaves tempos untouched
    pub fn is_identity(&self) -> bool {
        self.override_bpm.is_none() && self.percent == 100.0
    }

    /// Apply to a resolved tempo
    pub fn apply(&self, bpm: f64) -> f64 {
        match self.override_bpm {
            Some(fixed) => fixed,
            None => bpm * self.percent / 100.0,
        }
    }
}

impl Default for TempoTransform {
    fn default() -> Self {
        Self::percent(100.0)
    }
}

/// Effective tempo ramp of one section: start/end tempo and curve shape
///
/// Scaling both endpoints by the same factor scales every point of a linear
/// or exponential curve by that factor, so the percentage transform folds
/// into the endpoints. An override flattens the ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoRamp {
    start: f64,
    end: f64,
    curve: TempoCurve,
}

impl TempoRamp {
    /// Untransformed ramp of a section
    pub fn from_section(section: &Section) -> Self {
        Self::new(section.tempo_start(), section.tempo_end(), section.tempo_curve())
    }

    /// Ramp of a section with the practice transform folded in
    pub fn transformed(section: &Section, transform: &TempoTransform) -> Self {
        match transform.override_bpm {
            Some(bpm) => Self::new(bpm, bpm, TempoCurve::Linear),
            None => Self::new(
                transform.apply(section.tempo_start()),
                transform.apply(section.tempo_end()),
                section.tempo_curve(),
            ),
        }
    }

    /// Create a ramp
    pub fn new(start: f64, end: f64, curve: TempoCurve) -> Self {
        let start = if curve == TempoCurve::Exponential {
            start.max(MIN_EXPONENTIAL_BPM)
        } else {
            start
        };
        Self { start, end, curve }
    }

    /// Tempo at the start of the ramp
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Tempo at the end of the ramp
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Whether timing over this ramp reduces to the constant-tempo formula
    pub fn is_constant(&self) -> bool {
        match self.curve {
            TempoCurve::Step => true,
            TempoCurve::Linear => ((self.end - self.start) / self.start).abs() < RAMP_EPSILON,
            TempoCurve::Exponential => self.log_ratio().abs() < RAMP_EPSILON,
        }
    }

    fn log_ratio(&self) -> f64 {
        (self.end.max(MIN_EXPONENTIAL_BPM) / self.start).ln()
    }

    /// Tempo at `progress` (0..1)
    pub fn tempo_at(&self, progress: f64) -> f64 {
        let progress = progress.clamp(0.0, 1.0);
        if self.start == self.end {
            return self.start;
        }
        match self.curve {
            TempoCurve::Linear => self.start + (self.end - self.start) * progress,
            TempoCurve::Exponential => self.start * (self.end / self.start).powf(progress),
            TempoCurve::Step => {
                if progress < 1.0 {
                    self.start
                } else {
                    self.end
                }
            }
        }
    }

    /// Seconds to play `beats` of a ramp spanning `total_beats`
    pub fn seconds_for_beats(&self, beats: f64, total_beats: f64) -> f64 {
        if beats <= 0.0 || total_beats <= 0.0 {
            return 0.0;
        }
        if self.is_constant() {
            return beats * 60.0 / self.start;
        }
        let progress = beats / total_beats;
        match self.curve {
            TempoCurve::Linear => {
                let delta = self.end - self.start;
                60.0 * total_beats / delta * (delta * progress / self.start).ln_1p()
            }
            TempoCurve::Exponential => {
                let log_ratio = self.log_ratio();
                -60.0 * total_beats / (self.start * log_ratio) * (-log_ratio * progress).exp_m1()
            }
            TempoCurve::Step => beats * 60.0 / self.start,
        }
    }

    /// Beats played after `seconds` of a ramp spanning `total_beats`
    ///
    /// Exact inverse of [`seconds_for_beats`](Self::seconds_for_beats),
    /// clamped to `0..=total_beats`.
    pub fn beats_for_seconds(&self, seconds: f64, total_beats: f64) -> f64 {
        if seconds <= 0.0 || total_beats <= 0.0 {
            return 0.0;
        }
        let beats = if self.is_constant() {
            seconds * self.start / 60.0
        } else {
            match self.curve {
                TempoCurve::Linear => {
                    let delta = self.end - self.start;
                    let progress =
                        self.start / delta * (seconds * delta / (60.0 * total_beats)).exp_m1();
                    progress * total_beats
                }
                TempoCurve::Exponential => {
                    let log_ratio = self.log_ratio();
                    let arg = -seconds * self.start * log_ratio / (60.0 * total_beats);
                    if arg <= -1.0 {
                        // Past the end of an accelerating ramp
                        total_beats
                    } else {
                        -arg.ln_1p() / log_ratio * total_beats
                    }
                }
                TempoCurve::Step => seconds * self.start / 60.0,
            }
        };
        beats.clamp(0.0, total_beats)
    }
}
