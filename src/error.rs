// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the timeline model and the transport.

use thiserror::Error;

/// Errors raised while building or validating a song timeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Song has no sections")]
    EmptySong,

    #[error("Section {index} must have at least one bar")]
    InvalidBars { index: usize },

    #[error("Section {index} tempo {bpm} BPM is outside 20-300 BPM")]
    TempoOutOfRange { index: usize, bpm: f64 },

    #[error("Invalid time signature: {0}")]
    InvalidTimeSignature(String),

    #[error("Section index {index} out of range ({count} sections)")]
    SectionOutOfRange { index: usize, count: usize },
}

/// Errors raised by transport commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid play options: {0}")]
    InvalidOptions(String),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}
