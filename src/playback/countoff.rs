// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Count-off pre-roll.
//!
//! Count-off beats run at the song's default tempo, independent of section
//! ramps and practice overrides. The timeline starts exactly one count-off
//! beat after the last count-off click.

use super::BeatEvent;

/// Count-off lengths offered to the player, in bars
pub const COUNTOFF_BAR_CHOICES: [u32; 4] = [0, 1, 2, 4];

/// Slack for deciding that a count-off beat has elapsed
const ELAPSED_EPSILON: f64 = 1e-9;

/// Count-off progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOffState {
    /// No count-off requested
    Idle,
    /// Beats still to elapse
    Counting { remaining: u32 },
    /// All beats elapsed
    Done,
}

/// A running count-off
#[derive(Debug, Clone)]
pub struct CountOff {
    total_beats: u32,
    beats_per_bar: u32,
    tempo: f64,
    beat_seconds: f64,
    start: f64,
    next_beat: u32,
}

impl CountOff {
    /// Start a count-off of `bars` bars at `start` (clock seconds)
    pub fn new(bars: u32, beats_per_bar: u32, tempo: f64, start: f64) -> Self {
        Self {
            total_beats: bars * beats_per_bar,
            beats_per_bar: beats_per_bar.max(1),
            tempo,
            beat_seconds: 60.0 / tempo,
            start,
            next_beat: 0,
        }
    }

    /// Total count-off beats
    pub fn total_beats(&self) -> u32 {
        self.total_beats
    }

    /// Count-off tempo
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Spacing between count-off beats, in seconds
    pub fn beat_seconds(&self) -> f64 {
        self.beat_seconds
    }

    /// Clock time at which the timeline starts
    pub fn end_time(&self) -> f64 {
        self.start + self.total_beats as f64 * self.beat_seconds
    }

    /// Beats that have not yet elapsed at `now`
    pub fn remaining_at(&self, now: f64) -> u32 {
        let elapsed = ((now - self.start) / self.beat_seconds + ELAPSED_EPSILON).floor();
        let elapsed = elapsed.clamp(0.0, self.total_beats as f64) as u32;
        self.total_beats - elapsed
    }

    /// State at `now`
    pub fn state_at(&self, now: f64) -> CountOffState {
        match self.remaining_at(now) {
            0 => CountOffState::Done,
            remaining => CountOffState::Counting { remaining },
        }
    }

    /// Emit the count-off beats scheduled before `horizon` that were not yet emitted
    pub fn collect_due(&mut self, horizon: f64) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        while self.next_beat < self.total_beats {
            let at = self.start + self.next_beat as f64 * self.beat_seconds;
            if at >= horizon {
                break;
            }
            events.push(BeatEvent::count_off(
                self.next_beat / self.beats_per_bar + 1,
                self.next_beat % self.beats_per_bar + 1,
                at,
                self.tempo,
            ));
            self.next_beat += 1;
        }
        events
    }
}
