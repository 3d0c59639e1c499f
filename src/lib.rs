// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MetMap - metronome timeline engine.
//!
//! A song is an ordered list of sections, each with its own bar count,
//! time signature and tempo ramp. The engine maps bar/beat positions to
//! seconds and back in closed form, and schedules click events against a
//! monotonic clock with count-off, section looping and practice tempo
//! controls.

pub mod config;
pub mod error;
pub mod playback;
pub mod timeline;
pub mod timing;

pub use error::{TimelineError, TransportError};
pub use playback::{
    BeatEvent, BeatKind, PlayOptions, PlaybackState, SchedulerConfig, Transport, TransportMode,
};
pub use timeline::{Section, Song, TempoCurve, TimeSignature};
pub use timing::{SongPosition, TempoTransform, TimelineMap};
