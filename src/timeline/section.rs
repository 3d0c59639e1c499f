// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song sections: bar count, time signature and tempo ramp.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TimelineError;

/// Lowest tempo a section may use
pub const MIN_BPM: f64 = 20.0;
/// Highest tempo a section may use
pub const MAX_BPM: f64 = 300.0;

/// Shape of the tempo change across a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoCurve {
    /// Tempo changes additively with progress
    #[default]
    Linear,
    /// Tempo changes proportionally with progress
    Exponential,
    /// Tempo holds, then snaps to the end tempo at the section end
    Step,
}

impl fmt::Display for TempoCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TempoCurve::Linear => "linear",
            TempoCurve::Exponential => "exponential",
            TempoCurve::Step => "step",
        };
        f.write_str(name)
    }
}

/// Time signature, written "N/D"
///
/// Only the numerator affects click timing; the denominator is kept for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    /// Beats per bar
    pub beats_per_bar: u32,
    /// Beat unit (4 = quarter note)
    pub beat_unit: u32,
}

impl TimeSignature {
    /// Create a time signature
    pub const fn new(beats_per_bar: u32, beat_unit: u32) -> Self {
        Self {
            beats_per_bar,
            beat_unit,
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_unit)
    }
}

impl FromStr for TimeSignature {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimelineError::InvalidTimeSignature(s.to_string());
        let (num, denom) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats_per_bar: u32 = num.trim().parse().map_err(|_| invalid())?;
        let beat_unit: u32 = denom.trim().parse().map_err(|_| invalid())?;
        if beats_per_bar == 0 || beat_unit == 0 {
            return Err(invalid());
        }
        Ok(Self::new(beats_per_bar, beat_unit))
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = TimelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(sig: TimeSignature) -> Self {
        sig.to_string()
    }
}

/// A contiguous run of bars with its own time signature and tempo ramp
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Display name
    name: String,
    /// Length in bars
    bars: u32,
    /// Time signature
    time_signature: TimeSignature,
    /// Tempo at the start of the section
    tempo_start: f64,
    /// Tempo at the end of the section (None = constant)
    tempo_end: Option<f64>,
    /// Ramp shape between start and end tempo
    tempo_curve: TempoCurve,
}

impl Section {
    /// Create a constant-tempo 4/4 section
    pub fn new(name: impl Into<String>, bars: u32, tempo: f64) -> Self {
        Self {
            name: name.into(),
            bars,
            time_signature: TimeSignature::default(),
            tempo_start: tempo,
            tempo_end: None,
            tempo_curve: TempoCurve::Linear,
        }
    }

    /// Get name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get length in bars
    pub fn bars(&self) -> u32 {
        self.bars
    }

    /// Set length in bars
    pub fn set_bars(&mut self, bars: u32) {
        self.bars = bars;
    }

    /// Get time signature
    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// Beats per bar
    pub fn beats_per_bar(&self) -> u32 {
        self.time_signature.beats_per_bar
    }

    /// Total beats in the section
    pub fn total_beats(&self) -> u64 {
        self.bars as u64 * self.beats_per_bar() as u64
    }

    /// Get start tempo
    pub fn tempo_start(&self) -> f64 {
        self.tempo_start
    }

    /// Get end tempo, falling back to the start tempo
    pub fn tempo_end(&self) -> f64 {
        self.tempo_end.unwrap_or(self.tempo_start)
    }

    /// Get ramp shape
    pub fn tempo_curve(&self) -> TempoCurve {
        self.tempo_curve
    }

    /// Whether the tempo changes across the section
    pub fn is_ramped(&self) -> bool {
        matches!(self.tempo_end, Some(end) if end != self.tempo_start)
    }

    /// Set the tempo ramp
    pub fn set_tempo(&mut self, start: f64, end: Option<f64>, curve: TempoCurve) {
        self.tempo_start = start;
        self.tempo_end = end;
        self.tempo_curve = curve;
    }

    /// Builder: set time signature
    pub fn with_time_sig(mut self, beats_per_bar: u32, beat_unit: u32) -> Self {
        self.time_signature = TimeSignature::new(beats_per_bar, beat_unit);
        self
    }

    /// Builder: ramp to an end tempo along a curve
    pub fn with_ramp(mut self, tempo_end: f64, curve: TempoCurve) -> Self {
        self.tempo_end = Some(tempo_end);
        self.tempo_curve = curve;
        self
    }

    /// Check bar count, tempo range and time signature
    pub fn validate(&self, index: usize) -> Result<(), TimelineError> {
        if self.bars == 0 {
            return Err(TimelineError::InvalidBars { index });
        }
        for bpm in [self.tempo_start, self.tempo_end()] {
            if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
                return Err(TimelineError::TempoOutOfRange { index, bpm });
            }
        }
        if self.time_signature.beats_per_bar == 0 || self.time_signature.beat_unit == 0 {
            return Err(TimelineError::InvalidTimeSignature(
                self.time_signature.to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature_parse() {
        let sig: TimeSignature = "7/8".parse().unwrap();
        assert_eq!(sig.beats_per_bar, 7);
        assert_eq!(sig.beat_unit, 8);
        assert_eq!(sig.to_string(), "7/8");

        let sig: TimeSignature = " 3 / 4 ".parse().unwrap();
        assert_eq!(sig, TimeSignature::new(3, 4));
    }

    #[test]
    fn test_time_signature_rejects_malformed() {
        assert!("4".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("4/0".parse::<TimeSignature>().is_err());
        assert!("a/b".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_section_defaults() {
        let section = Section::new("Verse", 8, 100.0);
        assert_eq!(section.bars(), 8);
        assert_eq!(section.beats_per_bar(), 4);
        assert_eq!(section.total_beats(), 32);
        assert_eq!(section.tempo_end(), 100.0);
        assert!(!section.is_ramped());
    }

    #[test]
    fn test_section_ramp() {
        let section = Section::new("Build", 4, 100.0).with_ramp(140.0, TempoCurve::Exponential);
        assert!(section.is_ramped());
        assert_eq!(section.tempo_curve(), TempoCurve::Exponential);

        let flat = Section::new("Flat", 4, 100.0).with_ramp(100.0, TempoCurve::Step);
        assert!(!flat.is_ramped());
    }

    #[test]
    fn test_section_validation() {
        assert!(Section::new("Ok", 1, 20.0).validate(0).is_ok());
        assert_eq!(
            Section::new("Empty", 0, 120.0).validate(2),
            Err(TimelineError::InvalidBars { index: 2 })
        );
        assert!(matches!(
            Section::new("Slow", 4, 10.0).validate(0),
            Err(TimelineError::TempoOutOfRange { .. })
        ));
        assert!(Section::new("Fast", 4, 120.0)
            .with_ramp(400.0, TempoCurve::Linear)
            .validate(0)
            .is_err());
    }
}
