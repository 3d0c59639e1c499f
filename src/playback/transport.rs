// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport with lookahead beat scheduling.
//!
//! The transport is a plain state machine advanced by [`Transport::tick`].
//! Each tick resolves the current position from the clock and emits every
//! beat boundary that falls before `now + lookahead`, stamped with its exact
//! clock time. Ticks only decide which beats are imminent; firing them on
//! time is left to the consumer.
//!
//! Playback position is held as a clock origin: song time is `now - origin`.
//! Pausing, seeking, looping and tempo changes all re-anchor the origin,
//! so tempo ramps stay continuous across them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::countoff::{CountOff, CountOffState, COUNTOFF_BAR_CHOICES};
use super::looping::LoopRegion;
use super::{BeatEvent, PlayOptions, PlaybackState, TransportMode};
use crate::error::{TimelineError, TransportError};
use crate::timeline::{Song, MAX_BPM, MIN_BPM};
use crate::timing::{ClockSource, SongPosition, TempoTransform, TimelineMap};

/// Slack when rounding a fractional beat offset up to the next beat
const BEAT_EPSILON: f64 = 1e-6;

/// Configuration for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Polling tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Lookahead window in milliseconds
    pub lookahead_ms: u64,
}

impl SchedulerConfig {
    /// Lookahead window in seconds
    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 25,
            lookahead_ms: 100,
        }
    }
}

/// Next beat to emit and the clock origin of the pass it belongs to
#[derive(Debug, Clone, Copy)]
struct BeatCursor {
    next_beat: u64,
    origin: f64,
}

type Observer = Box<dyn FnMut(&PlaybackState) + Send>;

fn first_beat_at_or_after(beats: f64) -> u64 {
    (beats - BEAT_EPSILON).ceil().max(0.0) as u64
}

/// Playback transport for one session
pub struct Transport<C: ClockSource> {
    clock: C,
    config: SchedulerConfig,
    /// Song applied at the next `play()`
    staged: Song,
    /// Snapshot in use
    map: TimelineMap,
    mode: TransportMode,
    /// Clock time of song time zero for the current pass
    origin: f64,
    /// Position in song beats while not running
    resume_beats: f64,
    countoff: Option<CountOff>,
    loop_region: Option<LoopRegion>,
    cursor: Option<BeatCursor>,
    state: PlaybackState,
    observers: Vec<Observer>,
}

impl<C: ClockSource> Transport<C> {
    /// Create a stopped transport for a song
    pub fn new(song: Song, clock: C, config: SchedulerConfig) -> Result<Self, TimelineError> {
        let map = TimelineMap::new(&song, TempoTransform::default())?;
        let mut transport = Self {
            clock,
            config,
            staged: song,
            map,
            mode: TransportMode::Stopped,
            origin: 0.0,
            resume_beats: 0.0,
            countoff: None,
            loop_region: None,
            cursor: None,
            state: PlaybackState::default(),
            observers: Vec::new(),
        };
        let now = transport.clock.now();
        transport.refresh_state(now);
        Ok(transport)
    }

    /// Current transport state
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Latest playback state snapshot
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Time map in use
    pub fn map(&self) -> &TimelineMap {
        &self.map
    }

    /// Scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Clock source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Active loop region
    pub fn loop_region(&self) -> Option<&LoopRegion> {
        self.loop_region.as_ref()
    }

    /// Count-off progress
    pub fn countoff_state(&self) -> CountOffState {
        match &self.countoff {
            Some(countoff) => countoff.state_at(self.clock.now()),
            None => CountOffState::Idle,
        }
    }

    /// Register a callback receiving every state update
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&PlaybackState) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Stage a song; it takes effect at the next `play()`
    pub fn load_song(&mut self, song: Song) -> Result<(), TimelineError> {
        song.validate()?;
        info!(name = song.name(), sections = song.section_count(), "song staged");
        self.staged = song;
        Ok(())
    }

    /// Start or resume playback
    ///
    /// No-op while already counting off or playing.
    pub fn play(&mut self, options: PlayOptions) -> Result<(), TransportError> {
        if matches!(self.mode, TransportMode::Playing | TransportMode::CountingOff) {
            debug!(mode = ?self.mode, "play ignored, already running");
            return Ok(());
        }

        let transform = validate_options(&options)?;
        let map = TimelineMap::new(&self.staged, transform)?;
        let loop_region = options
            .loop_section_index
            .map(|index| LoopRegion::new(&map, index))
            .transpose()?;

        let mut resume = self.resume_beats;
        if resume >= map.total_beats() as f64 {
            resume = 0.0;
        }
        if let Some(region) = loop_region {
            if !region.contains_beat(resume) {
                resume = region.start_beat as f64;
            }
        }

        let now = self.clock.now();
        let start = if options.countoff_bars > 0 {
            let section = map.section_at_beat(resume);
            let beats_per_bar = map.beats_per_bar(section).unwrap_or(4);
            let countoff = CountOff::new(
                options.countoff_bars,
                beats_per_bar,
                map.song().bpm_default(),
                now,
            );
            let end = countoff.end_time();
            self.countoff = Some(countoff);
            self.mode = TransportMode::CountingOff;
            end
        } else {
            self.countoff = None;
            self.mode = TransportMode::Playing;
            now
        };

        self.map = map;
        self.loop_region = loop_region;
        self.resume_beats = resume;
        self.anchor(start, resume);

        info!(
            mode = ?self.mode,
            position = %self.resume_position().format(),
            percent = transform.percent,
            override_bpm = ?transform.override_bpm,
            loop_section = ?options.loop_section_index,
            countoff_bars = options.countoff_bars,
            "playback started"
        );
        self.refresh_state(now);
        self.notify();
        Ok(())
    }

    /// Pause, keeping the position
    pub fn pause(&mut self) {
        match self.mode {
            TransportMode::Playing => {
                let now = self.clock.now();
                let seconds = self.song_seconds(now);
                self.resume_beats = self.map.seconds_to_beats(seconds);
                // Beats already handed out still sound during the pause
                if let Some(next) = self.emitted_ahead(self.resume_beats) {
                    debug!(next_beat = next, "pause after emitted beats, resuming past them");
                    self.resume_beats = next as f64;
                }
            }
            TransportMode::CountingOff => {
                self.countoff = None;
            }
            TransportMode::Stopped | TransportMode::Paused => {
                debug!(mode = ?self.mode, "pause ignored");
                return;
            }
        }
        self.mode = TransportMode::Paused;
        self.cursor = None;
        info!(position = %self.resume_position().format(), "playback paused");
        let now = self.clock.now();
        self.refresh_state(now);
        self.notify();
    }

    /// Stop and return to the song start, clearing count-off and loop
    pub fn stop(&mut self) {
        if self.mode != TransportMode::Stopped {
            info!("playback stopped");
        }
        self.reset_to_start();
        let now = self.clock.now();
        self.refresh_state(now);
        self.notify();
    }

    /// Move to the first beat of a bar, clamped to the song
    ///
    /// Only honored while stopped or playing. Returns the bar in effect.
    pub fn seek_to_bar(&mut self, bar: u32) -> u32 {
        if matches!(self.mode, TransportMode::Paused | TransportMode::CountingOff) {
            warn!(bar, mode = ?self.mode, "seek ignored");
            return self.state.current_bar;
        }

        let target = bar.clamp(1, self.map.total_bars());
        let beats = self.map.bar_start_beat(target) as f64;

        if let Some(region) = self.loop_region {
            if !region.contains_beat(beats) {
                debug!(section = region.section_index, "seek left the looped section, loop cleared");
                self.loop_region = None;
            }
        }

        let now = self.clock.now();
        if self.mode == TransportMode::Playing {
            self.anchor(now, beats);
        } else {
            self.resume_beats = beats;
        }
        debug!(bar = target, requested = bar, "seek");
        self.refresh_state(now);
        self.notify();
        target
    }

    /// Change the tempo percentage, keeping the musical position
    pub fn set_tempo_percent(&mut self, percent: f64) -> Result<(), TransportError> {
        validate_percent(percent)?;
        let transform = TempoTransform {
            percent,
            override_bpm: self.map.transform().override_bpm,
        };
        self.retime(transform)
    }

    /// Set or clear the absolute tempo override, keeping the musical position
    pub fn set_tempo_override(&mut self, bpm: Option<f64>) -> Result<(), TransportError> {
        if let Some(bpm) = bpm {
            validate_override(bpm)?;
        }
        let transform = TempoTransform {
            percent: self.map.transform().percent,
            override_bpm: bpm,
        };
        self.retime(transform)
    }

    /// Loop a section, or clear the loop
    ///
    /// A position outside the new loop moves to the section start.
    pub fn set_loop_section(&mut self, index: Option<usize>) -> Result<(), TransportError> {
        let region = index
            .map(|i| LoopRegion::new(&self.map, i))
            .transpose()?;
        let now = self.clock.now();
        let mut beats = self.current_beats(now);
        if self.mode == TransportMode::Playing
            && region != self.loop_region
            && self.cursor_on_later_pass()
        {
            // The wrap into the next pass is already out; take it now
            if let Some(cursor) = self.cursor {
                self.origin = cursor.origin;
                beats = self.map.seconds_to_beats(now - self.origin);
            }
        }
        self.loop_region = region;

        if let Some(region) = region {
            if region.contains_beat(beats) {
                if self.mode == TransportMode::Playing {
                    self.clamp_cursor_to_loop(region);
                }
            } else {
                let start = region.start_beat as f64;
                match self.mode {
                    TransportMode::Playing => self.anchor(now, start),
                    TransportMode::CountingOff => {
                        self.resume_beats = start;
                        self.anchor_after_countoff();
                    }
                    TransportMode::Stopped | TransportMode::Paused => self.resume_beats = start,
                }
            }
        }
        debug!(section = ?index, "loop section set");
        self.refresh_state(now);
        self.notify();
        Ok(())
    }

    /// Advance using the clock source
    pub fn tick(&mut self) -> Vec<BeatEvent> {
        let now = self.clock.now();
        self.tick_at(now)
    }

    /// Advance to `now`, returning the beats that became due within the lookahead
    pub fn tick_at(&mut self, now: f64) -> Vec<BeatEvent> {
        if !matches!(self.mode, TransportMode::Playing | TransportMode::CountingOff) {
            return Vec::new();
        }

        let horizon = now + self.config.lookahead_seconds();
        let mut events = Vec::new();

        let mut countoff_done = false;
        if let Some(countoff) = self.countoff.as_mut() {
            events.extend(countoff.collect_due(horizon));
            countoff_done = countoff.state_at(now) == CountOffState::Done;
        }
        if countoff_done {
            self.countoff = None;
            self.mode = TransportMode::Playing;
            info!("count-off complete");
        }

        self.emit_timeline(horizon, &mut events);

        if self.mode == TransportMode::Playing {
            let seconds = self.song_seconds(now);
            if self.loop_region.is_none() && seconds >= self.map.total_seconds() {
                info!("end of song");
                self.reset_to_start();
            }
        }

        if let Some(first) = events.first() {
            if first.scheduled_at < now {
                debug!(late_by = now - first.scheduled_at, "tick overrun, emitting late beats");
            }
        }
        trace!(now, emitted = events.len(), "tick");

        self.refresh_state(now);
        self.notify();
        events
    }

    fn emit_timeline(&mut self, horizon: f64, events: &mut Vec<BeatEvent>) {
        let map = &self.map;
        let region = self.loop_region;
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };

        loop {
            if let Some(region) = region {
                if cursor.next_beat >= region.end_beat {
                    let loop_beats = region.end_beat - region.start_beat;
                    let overshoot = cursor.next_beat - region.end_beat;
                    let passes = overshoot / loop_beats + 1;
                    cursor.next_beat = region.start_beat + overshoot % loop_beats;
                    cursor.origin += passes as f64 * region.length();
                }
            }
            if cursor.next_beat >= map.total_beats() {
                break;
            }
            let at = cursor.origin + map.beat_seconds(cursor.next_beat);
            if at >= horizon {
                break;
            }
            events.push(BeatEvent::timeline(map.beat_position(cursor.next_beat), at));
            cursor.next_beat += 1;
        }
    }

    /// Song seconds at `now`, wrapping the origin when a loop end has passed
    fn song_seconds(&mut self, now: f64) -> f64 {
        let mut seconds = now - self.origin;
        if let Some(region) = self.loop_region {
            let passes = region.passes_at(seconds);
            if passes > 0 {
                let shift = passes as f64 * region.length();
                self.origin += shift;
                seconds -= shift;
                debug!(section = region.section_index, passes, "loop wrapped");
            }
        }
        seconds
    }

    /// Whether the cursor has wrapped onto a loop pass the clock has not reached
    fn cursor_on_later_pass(&self) -> bool {
        match (self.cursor, self.loop_region) {
            (Some(cursor), Some(region)) => cursor.origin - self.origin > region.length() / 2.0,
            _ => false,
        }
    }

    /// Next beat to emit, if beats past song position `beats` were already emitted
    fn emitted_ahead(&self, beats: f64) -> Option<u64> {
        let cursor = self.cursor?;
        let ahead =
            self.cursor_on_later_pass() || cursor.next_beat > first_beat_at_or_after(beats);
        ahead.then_some(cursor.next_beat)
    }

    /// Pull a cursor that already ran past the loop end back to the loop start
    fn clamp_cursor_to_loop(&mut self, region: LoopRegion) {
        let origin = self.origin;
        if let Some(cursor) = self.cursor.as_mut() {
            if cursor.next_beat > region.end_beat {
                debug!(
                    next_beat = cursor.next_beat,
                    section = region.section_index,
                    "cursor past loop end, wrapping"
                );
                cursor.next_beat = region.start_beat;
                cursor.origin = origin + region.length();
            }
        }
    }

    /// Position in song beats at `now`
    fn current_beats(&mut self, now: f64) -> f64 {
        match self.mode {
            TransportMode::Playing => {
                let seconds = self.song_seconds(now);
                self.map.seconds_to_beats(seconds)
            }
            _ => self.resume_beats,
        }
    }

    /// Place song beat offset `beats` at clock time `at` and restart emission there
    fn anchor(&mut self, at: f64, beats: f64) {
        self.origin = at - self.map.beats_to_seconds(beats);
        self.cursor = Some(BeatCursor {
            next_beat: first_beat_at_or_after(beats),
            origin: self.origin,
        });
    }

    fn anchor_after_countoff(&mut self) {
        if let Some(end) = self.countoff.as_ref().map(CountOff::end_time) {
            self.anchor(end, self.resume_beats);
        }
    }

    fn retime(&mut self, transform: TempoTransform) -> Result<(), TransportError> {
        let now = self.clock.now();
        let beats = self.current_beats(now);
        let old_region = self.loop_region;
        let old_origin = self.origin;

        let map = self.map.retimed(transform)?;
        let region = old_region
            .map(|r| LoopRegion::new(&map, r.section_index))
            .transpose()?;
        self.map = map;
        self.loop_region = region;

        match self.mode {
            TransportMode::Playing => {
                self.origin = now - self.map.beats_to_seconds(beats);
                let origin = self.origin;
                if let Some(cursor) = self.cursor.as_mut() {
                    // Keep the cursor on the same loop pass it was emitting
                    let passes = match (old_region, region) {
                        (Some(old), Some(_)) if old.length() > 0.0 => {
                            ((cursor.origin - old_origin) / old.length()).round()
                        }
                        _ => 0.0,
                    };
                    cursor.origin = origin + passes * region.map_or(0.0, |r| r.length());
                }
            }
            TransportMode::CountingOff => self.anchor_after_countoff(),
            TransportMode::Stopped | TransportMode::Paused => {}
        }

        info!(
            percent = transform.percent,
            override_bpm = ?transform.override_bpm,
            "tempo transform changed"
        );
        self.refresh_state(now);
        self.notify();
        Ok(())
    }

    fn reset_to_start(&mut self) {
        self.mode = TransportMode::Stopped;
        self.resume_beats = 0.0;
        self.countoff = None;
        self.loop_region = None;
        self.cursor = None;
    }

    fn resume_position(&self) -> SongPosition {
        self.map
            .seconds_to_position(self.map.beats_to_seconds(self.resume_beats))
    }

    fn refresh_state(&mut self, now: f64) {
        let (position, remaining) = match self.mode {
            TransportMode::Playing => {
                let seconds = self.song_seconds(now);
                (self.map.seconds_to_position(seconds), 0)
            }
            TransportMode::CountingOff => {
                let mut position = self.resume_position();
                let mut remaining = 0;
                if let Some(countoff) = &self.countoff {
                    position.tempo = countoff.tempo();
                    remaining = countoff.remaining_at(now);
                }
                (position, remaining)
            }
            TransportMode::Stopped | TransportMode::Paused => (self.resume_position(), 0),
        };

        let transform = self.map.transform();
        self.state = PlaybackState {
            mode: self.mode,
            is_playing: matches!(self.mode, TransportMode::Playing | TransportMode::CountingOff),
            is_paused: self.mode == TransportMode::Paused,
            current_bar: position.bar,
            current_beat: position.beat,
            current_tempo: position.tempo,
            current_section_index: position.section_index,
            counting_off: self.mode == TransportMode::CountingOff,
            countoff_beats_remaining: remaining,
            loop_section_index: self.loop_region.map(|r| r.section_index),
            tempo_override_bpm: transform.override_bpm,
            tempo_percent: transform.percent,
        };
    }

    fn notify(&mut self) {
        for observer in self.observers.iter_mut() {
            observer(&self.state);
        }
    }
}

fn validate_percent(percent: f64) -> Result<(), TransportError> {
    if percent.is_finite() && percent > 0.0 {
        Ok(())
    } else {
        Err(TransportError::InvalidOptions(format!(
            "tempo percent must be positive, got {percent}"
        )))
    }
}

fn validate_override(bpm: f64) -> Result<(), TransportError> {
    if (MIN_BPM..=MAX_BPM).contains(&bpm) {
        Ok(())
    } else {
        Err(TransportError::InvalidOptions(format!(
            "tempo override {bpm} BPM is outside {MIN_BPM}-{MAX_BPM} BPM"
        )))
    }
}

fn validate_options(options: &PlayOptions) -> Result<TempoTransform, TransportError> {
    let percent = options.tempo_percent.unwrap_or(100.0);
    validate_percent(percent)?;
    if let Some(bpm) = options.tempo_override_bpm {
        validate_override(bpm)?;
    }
    if !COUNTOFF_BAR_CHOICES.contains(&options.countoff_bars) {
        return Err(TransportError::InvalidOptions(format!(
            "count-off must be one of {:?} bars, got {}",
            COUNTOFF_BAR_CHOICES, options.countoff_bars
        )));
    }
    Ok(TempoTransform {
        percent,
        override_bpm: options.tempo_override_bpm,
    })
}
