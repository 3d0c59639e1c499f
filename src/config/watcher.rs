// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song file watcher for hot reload.
//!
//! Watches a song file and re-parses it after edits settle. A reloaded
//! song is only a candidate: the transport stages it and applies it at the
//! next `play()`, never mid-playback.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::SongFile;
use crate::timeline::Song;

/// Events emitted by the song watcher
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// Song file changed and produced a valid song
    Reloaded(Box<Song>),
    /// Song file changed but failed to parse or validate
    Error(String),
    /// Song file was removed
    Removed(PathBuf),
}

/// Debounced watcher for a single song file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    event_receiver: Receiver<ConfigEvent>,
    watched_path: PathBuf,
}

impl ConfigWatcher {
    /// Watch a song file
    ///
    /// The parent directory is watched so editors that save by replacing
    /// the file are still seen.
    ///
    /// # Arguments
    /// * `path` - Song file to watch
    /// * `debounce_ms` - Quiet period before reloading (default: 500)
    pub fn new<P: AsRef<Path>>(path: P, debounce_ms: Option<u64>) -> Result<Self> {
        let watched_path = path.as_ref().to_path_buf();
        let debounce = Duration::from_millis(debounce_ms.unwrap_or(500));
        let directory = watched_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let (event_tx, event_rx): (Sender<ConfigEvent>, Receiver<ConfigEvent>) = mpsc::channel();
        let (notify_tx, notify_rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| anyhow!("Failed to create file watcher: {}", e))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| anyhow!("Failed to watch {:?}: {}", directory, e))?;

        let target = watched_path.clone();
        std::thread::spawn(move || debounce_loop(&target, debounce, &notify_rx, &event_tx));

        Ok(Self {
            _watcher: watcher,
            event_receiver: event_rx,
            watched_path,
        })
    }

    /// Try to receive the next event (non-blocking)
    pub fn try_recv(&self) -> Option<ConfigEvent> {
        self.event_receiver.try_recv().ok()
    }

    /// Receive all pending events
    pub fn recv_all(&self) -> Vec<ConfigEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Get the watched song file
    pub fn watched_path(&self) -> &Path {
        &self.watched_path
    }
}

fn is_target(event: &Event, target: &Path) -> bool {
    let name = target.file_name();
    event.paths.iter().any(|p| p == target || p.file_name() == name)
}

fn debounce_loop(
    target: &Path,
    debounce: Duration,
    notify_rx: &Receiver<Event>,
    event_tx: &Sender<ConfigEvent>,
) {
    let mut last_change: Option<Instant> = None;

    loop {
        match notify_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) if is_target(&event, target) => match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => {
                    last_change = Some(Instant::now());
                }
                EventKind::Remove(_) if !target.exists() => {
                    last_change = None;
                    if event_tx.send(ConfigEvent::Removed(target.to_path_buf())).is_err() {
                        break;
                    }
                }
                _ => {}
            },
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if last_change.is_some_and(|at| at.elapsed() >= debounce) {
                    last_change = None;
                    if event_tx.send(reload(target)).is_err() {
                        break;
                    }
                }
            }
            // Watcher dropped
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn reload(path: &Path) -> ConfigEvent {
    match validate_config(path) {
        Ok(song) => {
            debug!(path = ?path, "song reloaded");
            ConfigEvent::Reloaded(Box::new(song))
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "song reload failed");
            ConfigEvent::Error(format!("Failed to load {:?}: {:#}", path, e))
        }
    }
}

/// Load and validate a song file without applying it
pub fn validate_config<P: AsRef<Path>>(path: P) -> Result<Song> {
    SongFile::load(path)?.to_song()
}
