// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback engine.
//!
//! This module provides:
//! - The transport state machine with lookahead beat scheduling
//! - Count-off pre-roll
//! - Section looping and practice tempo controls
//! - A tokio driver that ticks the transport in real time

pub mod countoff;
pub mod driver;
pub mod looping;
pub mod transport;

pub use countoff::{CountOff, CountOffState, COUNTOFF_BAR_CHOICES};
pub use driver::{spawn_transport, TransportCommand, TransportHandle};
pub use looping::LoopRegion;
pub use transport::{SchedulerConfig, Transport};

use crate::timing::SongPosition;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    #[default]
    Stopped,
    CountingOff,
    Playing,
    Paused,
}

/// Snapshot of the playback state for UI rendering
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Transport state
    pub mode: TransportMode,
    /// Counting off or playing
    pub is_playing: bool,
    /// Paused
    pub is_paused: bool,
    /// 1-based bar
    pub current_bar: u32,
    /// 1-based beat within the bar
    pub current_beat: u32,
    /// Resolved tempo in BPM
    pub current_tempo: f64,
    /// Index of the current section
    pub current_section_index: usize,
    /// Count-off in progress
    pub counting_off: bool,
    /// Count-off beats not yet elapsed
    pub countoff_beats_remaining: u32,
    /// Section being looped
    pub loop_section_index: Option<usize>,
    /// Absolute tempo override
    pub tempo_override_bpm: Option<f64>,
    /// Tempo percentage, 100 = unchanged
    pub tempo_percent: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stopped,
            is_playing: false,
            is_paused: false,
            current_bar: 1,
            current_beat: 1,
            current_tempo: 120.0,
            current_section_index: 0,
            counting_off: false,
            countoff_beats_remaining: 0,
            loop_section_index: None,
            tempo_override_bpm: None,
            tempo_percent: 100.0,
        }
    }
}

impl PlaybackState {
    /// Format position as "bar.beat"
    pub fn position(&self) -> String {
        format!("{}.{}", self.current_bar, self.current_beat)
    }
}

/// Origin of a beat event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatKind {
    /// Pre-roll click before the timeline
    CountOff,
    /// Beat of the song timeline
    Timeline,
}

/// A beat boundary scheduled for the click consumer
#[derive(Debug, Clone, PartialEq)]
pub struct BeatEvent {
    /// Bar (count-off bars are numbered from 1 on their own)
    pub bar: u32,
    /// 1-based beat within the bar
    pub beat: u32,
    /// Clock time at which the beat must sound, in seconds
    pub scheduled_at: f64,
    /// Tempo at the beat
    pub tempo: f64,
    /// Count-off or timeline
    pub kind: BeatKind,
    /// First beat of a bar
    pub accent: bool,
    /// Section of a timeline beat
    pub section_index: Option<usize>,
}

impl BeatEvent {
    /// Create a timeline beat at a resolved position
    pub fn timeline(position: SongPosition, scheduled_at: f64) -> Self {
        Self {
            bar: position.bar,
            beat: position.beat,
            scheduled_at,
            tempo: position.tempo,
            kind: BeatKind::Timeline,
            accent: position.beat == 1,
            section_index: Some(position.section_index),
        }
    }

    /// Create a count-off beat
    pub fn count_off(bar: u32, beat: u32, scheduled_at: f64, tempo: f64) -> Self {
        Self {
            bar,
            beat,
            scheduled_at,
            tempo,
            kind: BeatKind::CountOff,
            accent: beat == 1,
            section_index: None,
        }
    }
}

/// Options for starting playback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Absolute tempo replacing every section tempo
    pub tempo_override_bpm: Option<f64>,
    /// Tempo percentage (None = 100)
    pub tempo_percent: Option<f64>,
    /// Count-off bars (0, 1, 2 or 4)
    pub countoff_bars: u32,
    /// Section to loop
    pub loop_section_index: Option<usize>,
}

impl PlayOptions {
    /// Builder: set count-off bars
    pub fn with_countoff(mut self, bars: u32) -> Self {
        self.countoff_bars = bars;
        self
    }

    /// Builder: set tempo percentage
    pub fn with_percent(mut self, percent: f64) -> Self {
        self.tempo_percent = Some(percent);
        self
    }

    /// Builder: set tempo override
    pub fn with_override(mut self, bpm: f64) -> Self {
        self.tempo_override_bpm = Some(bpm);
        self
    }

    /// Builder: loop a section
    pub fn with_loop(mut self, section_index: usize) -> Self {
        self.loop_section_index = Some(section_index);
        self
    }
}
