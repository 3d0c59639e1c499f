// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Section timeline model.
//!
//! This module provides:
//! - Sections: bar count, time signature and tempo ramp
//! - Songs: ordered sections with derived start bars

pub mod section;
pub mod song;

pub use section::{Section, TempoCurve, TimeSignature, MAX_BPM, MIN_BPM};
pub use song::Song;
