// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Position↔time mapping over a whole song.
//!
//! A [`TimelineMap`] is an immutable snapshot of a song with a tempo
//! transform applied. It precomputes each section's start beat, start time
//! and duration from the closed-form ramp integrals, then answers both
//! directions:
//!
//! - `(bar, beat)` → seconds: sum of whole sections plus the partial integral
//! - seconds → `(bar, beat, tempo)`: locate the section, invert its integral
//!
//! Section lookup is a binary search, so a query costs O(log sections).

use std::ops::Range;

use super::curve::{TempoRamp, TempoTransform};
use crate::error::TimelineError;
use crate::timeline::Song;

/// Slack used when snapping a fractional beat count down to a beat index
const BEAT_EPSILON: f64 = 1e-6;

/// Musical position resolved from elapsed time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SongPosition {
    /// 1-based bar
    pub bar: u32,
    /// 1-based beat within the bar
    pub beat: u32,
    /// Instantaneous tempo after the transform
    pub tempo: f64,
    /// Index of the containing section
    pub section_index: usize,
}

impl SongPosition {
    /// Format position as "bar.beat"
    pub fn format(&self) -> String {
        format!("{}.{}", self.bar, self.beat)
    }
}

/// Precomputed layout of one section
#[derive(Debug, Clone)]
struct SectionSpan {
    start_bar: u32,
    beats_per_bar: u32,
    start_beat: u64,
    total_beats: u64,
    start_seconds: f64,
    duration: f64,
    ramp: TempoRamp,
}

impl SectionSpan {
    fn end_beat(&self) -> u64 {
        self.start_beat + self.total_beats
    }

    fn position_of(&self, local_beat: u64, index: usize) -> SongPosition {
        let local_beat = local_beat.min(self.total_beats.saturating_sub(1));
        let bpb = self.beats_per_bar as u64;
        SongPosition {
            bar: self.start_bar + (local_beat / bpb) as u32,
            beat: (local_beat % bpb) as u32 + 1,
            tempo: self
                .ramp
                .tempo_at(local_beat as f64 / self.total_beats as f64),
            section_index: index,
        }
    }
}

/// Immutable time map of a song under a tempo transform
#[derive(Debug, Clone)]
pub struct TimelineMap {
    song: Song,
    transform: TempoTransform,
    spans: Vec<SectionSpan>,
    total_bars: u32,
    total_beats: u64,
    total_seconds: f64,
}

impl TimelineMap {
    /// Build a map from a song snapshot
    pub fn new(song: &Song, transform: TempoTransform) -> Result<Self, TimelineError> {
        song.validate()?;

        let mut spans = Vec::with_capacity(song.section_count());
        let mut start_beat = 0u64;
        let mut start_seconds = 0.0;

        for (section, start_bar) in song.sections().iter().zip(song.start_bars()) {
            let ramp = TempoRamp::transformed(section, &transform);
            let total_beats = section.total_beats();
            let duration = ramp.seconds_for_beats(total_beats as f64, total_beats as f64);
            spans.push(SectionSpan {
                start_bar,
                beats_per_bar: section.beats_per_bar(),
                start_beat,
                total_beats,
                start_seconds,
                duration,
                ramp,
            });
            start_beat += total_beats;
            start_seconds += duration;
        }

        Ok(Self {
            song: song.clone(),
            transform,
            spans,
            total_bars: song.total_bars(),
            total_beats: start_beat,
            total_seconds: start_seconds,
        })
    }

    /// Rebuild the same song under a different transform
    pub fn retimed(&self, transform: TempoTransform) -> Result<Self, TimelineError> {
        Self::new(&self.song, transform)
    }

    /// Song snapshot this map was built from
    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Transform in effect
    pub fn transform(&self) -> TempoTransform {
        self.transform
    }

    /// Number of sections
    pub fn section_count(&self) -> usize {
        self.spans.len()
    }

    /// Total bars in the song
    pub fn total_bars(&self) -> u32 {
        self.total_bars
    }

    /// Total beats in the song
    pub fn total_beats(&self) -> u64 {
        self.total_beats
    }

    /// Song duration in seconds
    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    /// Beats per bar of a section
    pub fn beats_per_bar(&self, section_index: usize) -> Option<u32> {
        self.spans.get(section_index).map(|s| s.beats_per_bar)
    }

    /// Start and end time of a section, in seconds
    pub fn section_bounds(&self, section_index: usize) -> Option<(f64, f64)> {
        self.spans
            .get(section_index)
            .map(|s| (s.start_seconds, s.start_seconds + s.duration))
    }

    /// Global beat indices covered by a section
    pub fn section_beats(&self, section_index: usize) -> Option<Range<u64>> {
        self.spans
            .get(section_index)
            .map(|s| s.start_beat..s.end_beat())
    }

    /// Section containing a global beat offset
    pub fn section_at_beat(&self, beats: f64) -> usize {
        self.spans
            .partition_point(|s| s.start_beat as f64 <= beats)
            .saturating_sub(1)
    }

    fn span_index_for_seconds(&self, seconds: f64) -> usize {
        self.spans
            .partition_point(|s| s.start_seconds <= seconds)
            .saturating_sub(1)
    }

    /// Global beat index of the first beat of a 1-based bar
    ///
    /// Bars are clamped to `1..=total_bars + 1`; the bar after the last maps
    /// to the song end.
    pub fn bar_start_beat(&self, bar: u32) -> u64 {
        let bar = bar.max(1);
        if bar > self.total_bars {
            return self.total_beats;
        }
        let index = self
            .spans
            .partition_point(|s| s.start_bar <= bar)
            .saturating_sub(1);
        let span = &self.spans[index];
        span.start_beat + (bar - span.start_bar) as u64 * span.beats_per_bar as u64
    }

    /// Seconds from song start to the start of `(bar, beat)`
    pub fn position_to_seconds(&self, bar: u32, beat: u32) -> f64 {
        if bar > self.total_bars {
            return self.total_seconds;
        }
        let bar_beat = self.bar_start_beat(bar);
        let span = &self.spans[self.section_at_beat(bar_beat as f64)];
        let beat = beat.clamp(1, span.beats_per_bar) as u64;
        self.beat_seconds(bar_beat + beat - 1)
    }

    /// Seconds from song start to a global beat index
    pub fn beat_seconds(&self, index: u64) -> f64 {
        self.beats_to_seconds(index as f64)
    }

    /// Seconds from song start to a fractional global beat offset
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        let beats = beats.clamp(0.0, self.total_beats as f64);
        let span = &self.spans[self.section_at_beat(beats)];
        let local = beats - span.start_beat as f64;
        span.start_seconds + span.ramp.seconds_for_beats(local, span.total_beats as f64)
    }

    /// Fractional global beat offset reached after `seconds`
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            return 0.0;
        }
        if seconds >= self.total_seconds {
            return self.total_beats as f64;
        }
        let span = &self.spans[self.span_index_for_seconds(seconds)];
        let local = span
            .ramp
            .beats_for_seconds(seconds - span.start_seconds, span.total_beats as f64);
        span.start_beat as f64 + local
    }

    /// Musical position of a global beat index
    pub fn beat_position(&self, index: u64) -> SongPosition {
        let index = index.min(self.total_beats.saturating_sub(1));
        let span_index = self.section_at_beat(index as f64);
        let span = &self.spans[span_index];
        span.position_of(index - span.start_beat, span_index)
    }

    /// Musical position after `seconds` of playback
    ///
    /// Times before zero resolve to 1.1; times past the end resolve to the
    /// last beat, with the section's end tempo.
    pub fn seconds_to_position(&self, seconds: f64) -> SongPosition {
        if seconds >= self.total_seconds {
            let index = self.spans.len() - 1;
            let span = &self.spans[index];
            let mut position = span.position_of(span.total_beats - 1, index);
            position.tempo = span.ramp.tempo_at(1.0);
            return position;
        }
        // Snap on the global beat count so a time a hair before a section
        // boundary still resolves to the next section's first beat.
        let beats = self.seconds_to_beats(seconds);
        let mut position = self.beat_position((beats + BEAT_EPSILON).floor() as u64);
        let span = &self.spans[position.section_index];
        let progress = (beats - span.start_beat as f64) / span.total_beats as f64;
        position.tempo = span.ramp.tempo_at(progress);
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Section, TempoCurve};

    fn two_section_song() -> Song {
        Song::new("Scenario")
            .with_section(Section::new("A", 4, 120.0))
            .with_section(Section::new("B", 4, 120.0).with_ramp(240.0, TempoCurve::Linear))
    }

    #[test]
    fn test_map_layout() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        assert_eq!(map.section_count(), 2);
        assert_eq!(map.total_bars(), 8);
        assert_eq!(map.total_beats(), 32);
        assert_eq!(map.section_beats(1), Some(16..32));
        assert_eq!(map.section_bounds(0), Some((0.0, 8.0)));
    }

    #[test]
    fn test_section_b_start_is_exact() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        assert_eq!(map.position_to_seconds(5, 1), 8.0);
        assert_eq!(map.position_to_seconds(1, 1), 0.0);
        assert_eq!(map.position_to_seconds(2, 3), 3.0);
    }

    #[test]
    fn test_total_duration_uses_closed_form() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        let expected = 8.0 + 16.0 * 0.5 * std::f64::consts::LN_2;
        assert!((map.position_to_seconds(9, 1) - expected).abs() < 1e-9);
        assert!((map.total_seconds() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_seconds_to_position() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();

        let pos = map.seconds_to_position(0.0);
        assert_eq!((pos.bar, pos.beat, pos.section_index), (1, 1, 0));
        assert_eq!(pos.tempo, 120.0);

        let pos = map.seconds_to_position(2.6);
        assert_eq!((pos.bar, pos.beat), (2, 2));

        let pos = map.seconds_to_position(8.0);
        assert_eq!((pos.bar, pos.beat, pos.section_index), (5, 1, 1));

        let pos = map.seconds_to_position(-1.0);
        assert_eq!((pos.bar, pos.beat), (1, 1));
    }

    #[test]
    fn test_past_end_clamps_to_last_beat() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        let pos = map.seconds_to_position(map.total_seconds() + 5.0);
        assert_eq!((pos.bar, pos.beat, pos.section_index), (8, 4, 1));
        assert_eq!(pos.tempo, 240.0);
        assert_eq!(map.position_to_seconds(40, 1), map.total_seconds());
    }

    #[test]
    fn test_tempo_reported_mid_ramp() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        // Halfway through section B in beats
        let seconds = map.beats_to_seconds(24.0);
        let pos = map.seconds_to_position(seconds);
        assert_eq!((pos.bar, pos.beat), (7, 1));
        assert!((pos.tempo - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_mixed_meters() {
        let song = Song::new("Meters")
            .with_section(Section::new("Waltz", 2, 90.0).with_time_sig(3, 4))
            .with_section(Section::new("Odd", 1, 90.0).with_time_sig(7, 8));
        let map = TimelineMap::new(&song, TempoTransform::default()).unwrap();
        assert_eq!(map.total_beats(), 13);
        assert_eq!(map.bar_start_beat(3), 6);

        let pos = map.beat_position(12);
        assert_eq!((pos.bar, pos.beat, pos.section_index), (3, 7, 1));
        // Beat 5 of 7/8 is clamped inside the bar
        assert_eq!(map.position_to_seconds(2, 5), map.position_to_seconds(2, 3));
    }

    #[test]
    fn test_percent_scales_time() {
        let song = two_section_song();
        let normal = TimelineMap::new(&song, TempoTransform::default()).unwrap();
        let half = TimelineMap::new(&song, TempoTransform::percent(50.0)).unwrap();
        assert!((half.total_seconds() - 2.0 * normal.total_seconds()).abs() < 1e-9);
        assert_eq!(half.position_to_seconds(5, 1), 16.0);
    }

    #[test]
    fn test_override_flattens_ramps() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::override_bpm(60.0)).unwrap();
        assert_eq!(map.total_seconds(), 32.0);
        let pos = map.seconds_to_position(20.0);
        assert_eq!((pos.bar, pos.beat), (6, 1));
        assert_eq!(pos.tempo, 60.0);
    }

    #[test]
    fn test_retimed_keeps_song() {
        let map = TimelineMap::new(&two_section_song(), TempoTransform::default()).unwrap();
        let slow = map.retimed(TempoTransform::percent(80.0)).unwrap();
        assert_eq!(slow.song(), map.song());
        assert_eq!(slow.transform().percent, 80.0);
    }

    #[test]
    fn test_rejects_empty_song() {
        let result = TimelineMap::new(&Song::new("Empty"), TempoTransform::default());
        assert_eq!(result.err(), Some(TimelineError::EmptySong));
    }
}
