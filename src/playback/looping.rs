// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Section looping for practice mode.
//!
//! A loop spans one whole section, so it always wraps on a bar boundary.
//! Wrapping moves the clock origin forward by one loop length; nothing
//! about the tempo transform changes.

use crate::error::TimelineError;
use crate::timing::TimelineMap;

/// Slack for treating a time a hair before the loop end as the end
const TIME_EPSILON: f64 = 1e-9;

/// A looped section resolved against a timeline map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    /// Looped section
    pub section_index: usize,
    /// First global beat of the section
    pub start_beat: u64,
    /// Global beat just past the section
    pub end_beat: u64,
    /// Section start, in song seconds
    pub start_seconds: f64,
    /// Section end, in song seconds
    pub end_seconds: f64,
}

impl LoopRegion {
    /// Resolve the loop region of a section
    pub fn new(map: &TimelineMap, section_index: usize) -> Result<Self, TimelineError> {
        let out_of_range = TimelineError::SectionOutOfRange {
            index: section_index,
            count: map.section_count(),
        };
        let beats = map
            .section_beats(section_index)
            .ok_or_else(|| out_of_range.clone())?;
        let (start_seconds, end_seconds) =
            map.section_bounds(section_index).ok_or(out_of_range)?;
        Ok(Self {
            section_index,
            start_beat: beats.start,
            end_beat: beats.end,
            start_seconds,
            end_seconds,
        })
    }

    /// Loop length in seconds
    pub fn length(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Whether a fractional global beat offset lies inside the loop
    pub fn contains_beat(&self, beats: f64) -> bool {
        beats >= self.start_beat as f64 && beats < self.end_beat as f64
    }

    /// Number of whole loop passes completed at `song_seconds`
    ///
    /// Zero before the loop end; positions before the section never wrap.
    pub fn passes_at(&self, song_seconds: f64) -> u32 {
        let song_seconds = song_seconds + TIME_EPSILON;
        if song_seconds < self.end_seconds || self.length() <= 0.0 {
            return 0;
        }
        ((song_seconds - self.start_seconds) / self.length()).floor() as u32
    }
}
