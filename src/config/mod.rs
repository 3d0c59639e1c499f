// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for MetMap.
//!
//! Song files are YAML and describe the section timeline. Engine settings
//! (scheduler timing, default count-off) are TOML.

pub mod watcher;

pub use watcher::{validate_config, ConfigEvent, ConfigWatcher};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::playback::SchedulerConfig;
use crate::timeline::{Section, Song, TempoCurve, TimeSignature};

/// Root of a song file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongFile {
    /// Song metadata and defaults
    pub song: SongConfig,
    /// Sections in playback order
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
}

impl SongFile {
    /// Load a song from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read song file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a song from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse song YAML")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize song to YAML")
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write song file: {:?}", path.as_ref()))
    }

    /// Build and validate the song timeline
    ///
    /// Sections without a time signature or start tempo take the song defaults.
    pub fn to_song(&self) -> Result<Song> {
        let mut song = Song::new(&self.song.name)
            .with_tempo(self.song.bpm_default)
            .with_time_sig(
                self.song.time_signature.beats_per_bar,
                self.song.time_signature.beat_unit,
            );

        for (i, config) in self.sections.iter().enumerate() {
            let name = config
                .name
                .clone()
                .unwrap_or_else(|| format!("Section {}", i + 1));
            let signature = config.time_signature.unwrap_or(self.song.time_signature);
            let tempo_start = config.tempo_start.unwrap_or(self.song.bpm_default);

            let mut section = Section::new(name, config.bars, tempo_start)
                .with_time_sig(signature.beats_per_bar, signature.beat_unit);
            section.set_tempo(tempo_start, config.tempo_end, config.tempo_curve);
            song.add_section(section);
        }

        song.validate()
            .with_context(|| format!("Invalid song: {}", self.song.name))?;
        Ok(song)
    }
}

/// Song-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SongConfig {
    /// Song name
    pub name: String,
    /// Count-off tempo and section default, in BPM
    #[serde(default = "default_tempo")]
    pub bpm_default: f64,
    /// Default time signature
    #[serde(default)]
    pub time_signature: TimeSignature,
}

fn default_tempo() -> f64 {
    120.0
}

impl Default for SongConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            bpm_default: default_tempo(),
            time_signature: TimeSignature::default(),
        }
    }
}

/// One section of a song file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionConfig {
    /// Section name
    #[serde(default)]
    pub name: Option<String>,
    /// Length in bars
    pub bars: u32,
    /// Time signature (defaults to the song's)
    #[serde(default)]
    pub time_signature: Option<TimeSignature>,
    /// Start tempo (defaults to the song's)
    #[serde(default)]
    pub tempo_start: Option<f64>,
    /// End tempo (absent = constant)
    #[serde(default)]
    pub tempo_end: Option<f64>,
    /// Ramp shape
    #[serde(default)]
    pub tempo_curve: TempoCurve,
}

/// Engine settings file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduler timing
    pub scheduler: SchedulerConfig,
    /// Count-off bars used when none is requested
    pub countoff_bars: u32,
}

impl EngineConfig {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read engine config: {:?}", path.as_ref()))?;
        Self::from_toml(&contents)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse engine config TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_song_file() {
        let yaml = r#"
song:
  name: "Warmup"
  bpm_default: 96
  time_signature: "3/4"

sections:
  - name: "Intro"
    bars: 4
  - name: "Build"
    bars: 8
    time_signature: "4/4"
    tempo_start: 100
    tempo_end: 140
    tempo_curve: exponential
  - bars: 2
    tempo_end: 120
    tempo_curve: step
"#;

        let file = SongFile::from_yaml(yaml).unwrap();
        assert_eq!(file.song.name, "Warmup");
        assert_eq!(file.song.time_signature, TimeSignature::new(3, 4));
        assert_eq!(file.sections.len(), 3);
        assert_eq!(file.sections[1].tempo_curve, TempoCurve::Exponential);

        let song = file.to_song().unwrap();
        assert_eq!(song.start_bars(), vec![1, 5, 13]);

        let intro = song.get_section(0).unwrap();
        assert_eq!(intro.tempo_start(), 96.0);
        assert_eq!(intro.beats_per_bar(), 3);
        assert!(!intro.is_ramped());

        let build = song.get_section(1).unwrap();
        assert_eq!(build.beats_per_bar(), 4);
        assert_eq!(build.tempo_end(), 140.0);

        let last = song.get_section(2).unwrap();
        assert_eq!(last.name(), "Section 3");
        assert_eq!(last.tempo_curve(), TempoCurve::Step);
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
song:
  name: "Minimal"
sections:
  - bars: 1
"#;

        let file = SongFile::from_yaml(yaml).unwrap();
        assert_eq!(file.song.bpm_default, 120.0);
        assert_eq!(file.song.time_signature, TimeSignature::new(4, 4));
        assert_eq!(file.sections[0].tempo_curve, TempoCurve::Linear);
    }

    #[test]
    fn test_rejects_bad_time_signature() {
        let yaml = r#"
song:
  name: "Broken"
  time_signature: "four/four"
"#;
        assert!(SongFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_song_rejected() {
        let yaml = r#"
song:
  name: "Too fast"
sections:
  - bars: 4
    tempo_start: 400
"#;
        let file = SongFile::from_yaml(yaml).unwrap();
        let err = file.to_song().unwrap_err();
        assert!(format!("{err:#}").contains("outside 20-300"));

        let empty = SongFile::from_yaml("song:\n  name: Empty\n").unwrap();
        assert!(empty.to_song().is_err());
    }

    #[test]
    fn test_round_trip() {
        let original = SongFile {
            song: SongConfig {
                name: "Round Trip".to_string(),
                bpm_default: 140.0,
                time_signature: TimeSignature::new(6, 8),
            },
            sections: vec![SectionConfig {
                name: Some("Only".to_string()),
                bars: 3,
                time_signature: None,
                tempo_start: Some(130.0),
                tempo_end: Some(150.0),
                tempo_curve: TempoCurve::Linear,
            }],
        };

        let yaml = original.to_yaml().unwrap();
        assert!(yaml.contains("6/8"));
        let parsed = SongFile::from_yaml(&yaml).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_engine_config() {
        let config = EngineConfig::from_toml(
            r#"
countoff_bars = 2

[scheduler]
lookahead_ms = 150
"#,
        )
        .unwrap();
        assert_eq!(config.countoff_bars, 2);
        assert_eq!(config.scheduler.lookahead_ms, 150);
        assert_eq!(config.scheduler.tick_interval_ms, 25);

        let defaults = EngineConfig::from_toml("").unwrap();
        assert_eq!(defaults, EngineConfig::default());
        assert_eq!(defaults.scheduler.lookahead_ms, 100);
    }
}
