// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides tempo curve resolution, the position↔time mapper
//! and the monotonic clock sources that drive playback.

pub mod clock;
pub mod curve;
pub mod mapper;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use curve::{resolve_tempo, TempoRamp, TempoTransform};
pub use mapper::{SongPosition, TimelineMap};
