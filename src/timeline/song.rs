// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song model: an ordered list of sections.
//!
//! Start bars are never stored. They are derived from the section order
//! every time they are asked for, so inserting, removing or reordering a
//! section can never leave a stale start bar behind.

use super::section::{Section, TimeSignature, MAX_BPM, MIN_BPM};
use crate::error::TimelineError;

/// A song: default tempo, default time signature and its sections
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Song name
    name: String,
    /// Tempo for count-off and the default for new sections
    bpm_default: f64,
    /// Default time signature
    time_signature_default: TimeSignature,
    /// Sections in playback order
    sections: Vec<Section>,
}

impl Song {
    /// Create a new empty song at 120 BPM, 4/4
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bpm_default: 120.0,
            time_signature_default: TimeSignature::default(),
            sections: Vec::new(),
        }
    }

    /// Get song name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get default tempo
    pub fn bpm_default(&self) -> f64 {
        self.bpm_default
    }

    /// Set default tempo
    pub fn set_bpm_default(&mut self, bpm: f64) {
        self.bpm_default = bpm;
    }

    /// Get default time signature
    pub fn time_signature_default(&self) -> TimeSignature {
        self.time_signature_default
    }

    /// Add a section at the end
    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Insert section at index
    pub fn insert_section(&mut self, index: usize, section: Section) {
        if index <= self.sections.len() {
            self.sections.insert(index, section);
        } else {
            self.sections.push(section);
        }
    }

    /// Remove section at index
    pub fn remove_section(&mut self, index: usize) -> Option<Section> {
        if index < self.sections.len() {
            Some(self.sections.remove(index))
        } else {
            None
        }
    }

    /// Move a section to a new position in the order
    pub fn move_section(&mut self, from: usize, to: usize) -> Result<(), TimelineError> {
        let count = self.sections.len();
        for index in [from, to] {
            if index >= count {
                return Err(TimelineError::SectionOutOfRange { index, count });
            }
        }
        let section = self.sections.remove(from);
        self.sections.insert(to, section);
        Ok(())
    }

    /// Get section at index
    pub fn get_section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Get mutable section at index
    pub fn get_section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index)
    }

    /// Get all sections
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Number of sections
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// 1-based start bar of the section at `index`
    pub fn start_bar(&self, index: usize) -> Option<u32> {
        if index >= self.sections.len() {
            return None;
        }
        Some(1 + self.sections[..index].iter().map(Section::bars).sum::<u32>())
    }

    /// Start bars of every section, in order
    pub fn start_bars(&self) -> Vec<u32> {
        self.sections
            .iter()
            .scan(1u32, |next, section| {
                let start = *next;
                *next += section.bars();
                Some(start)
            })
            .collect()
    }

    /// Total bars across all sections
    pub fn total_bars(&self) -> u32 {
        self.sections.iter().map(Section::bars).sum()
    }

    /// Index of the section containing a 1-based bar
    pub fn section_at_bar(&self, bar: u32) -> Option<usize> {
        let mut start = 1u32;
        for (i, section) in self.sections.iter().enumerate() {
            if bar >= start && bar < start + section.bars() {
                return Some(i);
            }
            start += section.bars();
        }
        None
    }

    /// Validate the song before it reaches the playback engine
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.sections.is_empty() {
            return Err(TimelineError::EmptySong);
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm_default) {
            return Err(TimelineError::TempoOutOfRange {
                index: 0,
                bpm: self.bpm_default,
            });
        }
        for (i, section) in self.sections.iter().enumerate() {
            section.validate(i)?;
        }
        Ok(())
    }

    /// Builder: add section
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Builder: set default tempo
    pub fn with_tempo(mut self, tempo: f64) -> Self {
        self.bpm_default = tempo;
        self
    }

    /// Builder: set default time signature
    pub fn with_time_sig(mut self, beats_per_bar: u32, beat_unit: u32) -> Self {
        self.time_signature_default = TimeSignature::new(beats_per_bar, beat_unit);
        self
    }
}
