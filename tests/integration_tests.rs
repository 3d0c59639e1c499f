// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for MetMap
//!
//! These tests verify that the timeline model, the mapper and the
//! transport work together through the public API.

use metmap::config::SongFile;
use metmap::timing::{ClockSource, ManualClock};
use metmap::{
    BeatEvent, BeatKind, PlayOptions, SchedulerConfig, Section, Song, TempoCurve, TempoTransform,
    TimelineMap, Transport, TransportMode,
};
use std::fs;
use tempfile::tempdir;

const CURVES: [TempoCurve; 3] = [TempoCurve::Linear, TempoCurve::Exponential, TempoCurve::Step];

fn ramped_song(curve: TempoCurve) -> Song {
    Song::new("Ramps")
        .with_tempo(90.0)
        .with_section(Section::new("Steady", 2, 100.0))
        .with_section(Section::new("Up", 4, 80.0).with_ramp(160.0, curve))
        .with_section(Section::new("Waltz", 3, 150.0).with_time_sig(3, 4).with_ramp(60.0, curve))
}

fn practice_song() -> Song {
    Song::new("Practice")
        .with_tempo(100.0)
        .with_section(Section::new("A", 2, 120.0))
        .with_section(Section::new("B", 2, 60.0))
        .with_section(Section::new("C", 1, 120.0).with_ramp(180.0, TempoCurve::Linear))
}

fn run(transport: &mut Transport<ManualClock>, clock: &ManualClock, until: f64) -> Vec<BeatEvent> {
    let mut events = Vec::new();
    while clock.now() < until {
        events.extend(transport.tick());
        clock.advance(0.025);
    }
    events
}

/// Section A constant 120, section B 120 -> 240 linear
#[test]
fn test_two_section_scenario() {
    let song = Song::new("Scenario")
        .with_section(Section::new("A", 4, 120.0))
        .with_section(Section::new("B", 4, 120.0).with_ramp(240.0, TempoCurve::Linear));
    let map = TimelineMap::new(&song, TempoTransform::default()).unwrap();

    assert_eq!(song.start_bars(), vec![1, 5]);
    assert_eq!(map.position_to_seconds(5, 1), 8.0);

    let expected_end = 8.0 + 8.0 * std::f64::consts::LN_2;
    assert!((map.position_to_seconds(9, 1) - expected_end).abs() < 1e-9);
    assert!((map.total_seconds() - expected_end).abs() < 1e-9);

    // Halfway through B the tempo has risen halfway in progress terms
    let position = map.seconds_to_position(map.position_to_seconds(7, 1));
    assert_eq!(position.format(), "7.1");
    assert!((position.tempo - 180.0).abs() < 1e-6);
}

#[test]
fn test_round_trip_every_curve() {
    for curve in CURVES {
        let map = TimelineMap::new(&ramped_song(curve), TempoTransform::default()).unwrap();
        for index in 0..map.total_beats() {
            let position = map.beat_position(index);
            let seconds = map.position_to_seconds(position.bar, position.beat);
            let back = map.seconds_to_position(seconds);
            assert_eq!(
                (back.bar, back.beat),
                (position.bar, position.beat),
                "{curve} beat {index}"
            );

            let beats = index as f64 + 0.37;
            let there = map.beats_to_seconds(beats);
            assert!((map.seconds_to_beats(there) - beats).abs() < 1e-6, "{curve} beat {beats}");
        }
    }
}

#[test]
fn test_beat_times_strictly_increase() {
    for curve in CURVES {
        let map = TimelineMap::new(&ramped_song(curve), TempoTransform::percent(73.0)).unwrap();
        let mut last = -1.0;
        for index in 0..=map.total_beats() {
            let seconds = map.beat_seconds(index);
            assert!(seconds > last, "{curve} beat {index}");
            last = seconds;
        }
        assert!((last - map.total_seconds()).abs() < 1e-9);
    }
}

#[test]
fn test_flat_ramp_matches_constant_exactly() {
    for curve in CURVES {
        let song = Song::new("Flat")
            .with_section(Section::new("Flat", 8, 120.0).with_ramp(120.0, curve));
        let map = TimelineMap::new(&song, TempoTransform::default()).unwrap();
        for index in 0..=map.total_beats() {
            assert_eq!(map.beat_seconds(index), index as f64 * 0.5, "{curve} beat {index}");
        }
    }
}

#[test]
fn test_percent_scales_durations() {
    for curve in CURVES {
        let song = ramped_song(curve);
        let normal = TimelineMap::new(&song, TempoTransform::default()).unwrap();
        let half = TimelineMap::new(&song, TempoTransform::percent(50.0)).unwrap();
        assert!((half.total_seconds() - 2.0 * normal.total_seconds()).abs() < 1e-9, "{curve}");
    }
}

#[test]
fn test_override_precedence() {
    let song = ramped_song(TempoCurve::Exponential);
    let transform = TempoTransform {
        percent: 50.0,
        override_bpm: Some(120.0),
    };
    let map = TimelineMap::new(&song, transform).unwrap();
    assert_eq!(map.total_seconds(), map.total_beats() as f64 * 0.5);
    assert_eq!(map.seconds_to_position(3.3).tempo, 120.0);
}

#[test]
fn test_countoff_does_not_shift_timeline() {
    let clock = ManualClock::new();
    clock.set(10.0);
    let mut transport =
        Transport::new(practice_song(), clock.clone(), SchedulerConfig::default()).unwrap();
    transport.play(PlayOptions::default().with_countoff(2)).unwrap();
    assert_eq!(transport.mode(), TransportMode::CountingOff);

    let events = run(&mut transport, &clock, 20.0);
    let countoff: Vec<&BeatEvent> = events.iter().filter(|e| e.kind == BeatKind::CountOff).collect();
    let timeline: Vec<&BeatEvent> = events.iter().filter(|e| e.kind == BeatKind::Timeline).collect();

    // Two bars of 4/4 at the song default of 100 BPM
    assert_eq!(countoff.len(), 8);
    assert!(countoff.iter().all(|e| e.tempo == 100.0));
    let start = 10.0 + 8.0 * 0.6;
    assert!(countoff.iter().all(|e| e.scheduled_at < start));

    let map = transport.map();
    for (index, event) in timeline.iter().enumerate() {
        let expected = start + map.beat_seconds(index as u64);
        assert!((event.scheduled_at - expected).abs() < 1e-9, "beat {index}");
    }
    assert_eq!((timeline[0].bar, timeline[0].beat), (1, 1));
}

#[test]
fn test_loop_wrap_is_continuous() {
    let clock = ManualClock::new();
    let mut transport =
        Transport::new(practice_song(), clock.clone(), SchedulerConfig::default()).unwrap();
    transport.play(PlayOptions::default().with_loop(2)).unwrap();

    let events = run(&mut transport, &clock, 12.0);
    assert!(events.iter().all(|e| e.section_index == Some(2)));

    // One bar of 120 -> 180 linear, repeated with no gap at the seam
    let map = transport.map();
    let (start, end) = map.section_bounds(2).unwrap();
    let length = end - start;
    for (i, event) in events.iter().enumerate() {
        let pass = (i / 4) as f64;
        let expected = pass * length + map.beat_seconds(16 + (i % 4) as u64) - start;
        assert!((event.scheduled_at - expected).abs() < 1e-9, "event {i}");
    }
    assert!(events.len() >= 12);
    assert_eq!(transport.mode(), TransportMode::Playing);
}

#[test]
fn test_song_file_drives_transport() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.yaml");
    fs::write(
        &path,
        r#"
song:
  name: "From File"
  bpm_default: 120
sections:
  - name: "Intro"
    bars: 1
  - name: "Slow"
    bars: 1
    time_signature: "3/4"
    tempo_start: 60
"#,
    )
    .unwrap();

    let song = SongFile::load(&path).unwrap().to_song().unwrap();
    let clock = ManualClock::new();
    let mut transport = Transport::new(song, clock.clone(), SchedulerConfig::default()).unwrap();
    transport.play(PlayOptions::default()).unwrap();

    let events = run(&mut transport, &clock, 6.0);
    let positions: Vec<(u32, u32)> = events.iter().map(|e| (e.bar, e.beat)).collect();
    assert_eq!(
        positions,
        vec![(1, 1), (1, 2), (1, 3), (1, 4), (2, 1), (2, 2), (2, 3)]
    );
    assert_eq!(events[4].scheduled_at, 2.0);
    assert_eq!(events[6].scheduled_at, 4.0);
    assert_eq!(transport.mode(), TransportMode::Stopped);
}

#[test]
fn test_bundled_practice_song_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/songs/practice.yaml");
    let song = SongFile::load(path).unwrap().to_song().unwrap();
    assert_eq!(song.start_bars(), vec![1, 5, 13, 19]);
    assert_eq!(song.total_bars(), 22);

    let map = TimelineMap::new(&song, TempoTransform::default()).unwrap();
    assert_eq!(map.position_to_seconds(5, 1), 8.0);
}
