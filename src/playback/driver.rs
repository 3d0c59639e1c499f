// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Real-time driver for the transport.
//!
//! Runs the transport on a tokio task: a fixed-interval tick loop plus a
//! command channel. Commands are applied between ticks, never during one,
//! so every command takes effect atomically relative to the next tick.
//! Beat events go out on a channel to the click consumer; state snapshots
//! are published on a watch channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{BeatEvent, PlayOptions, PlaybackState, Transport};
use crate::timeline::Song;
use crate::timing::ClockSource;

/// Commands accepted by a running transport task
#[derive(Debug, Clone)]
pub enum TransportCommand {
    Play(PlayOptions),
    Pause,
    Stop,
    SeekToBar(u32),
    SetTempoPercent(f64),
    SetTempoOverride(Option<f64>),
    SetLoopSection(Option<usize>),
    /// Stage a new song for the next play
    LoadSong(Box<Song>),
    Shutdown,
}

/// Handle to a transport running on a tokio task
pub struct TransportHandle<C: ClockSource> {
    commands: mpsc::UnboundedSender<TransportCommand>,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<Transport<C>>,
}

impl<C: ClockSource> TransportHandle<C> {
    /// Queue a command; returns false once the task has exited
    pub fn send(&self, command: TransportCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Receiver for state snapshots
    pub fn state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Stop the task and get the transport back
    pub async fn shutdown(self) -> Option<Transport<C>> {
        let _ = self.commands.send(TransportCommand::Shutdown);
        self.task.await.ok()
    }
}

/// Spawn the tick loop for a transport
///
/// Must be called from within a tokio runtime.
pub fn spawn_transport<C>(
    mut transport: Transport<C>,
    events: mpsc::UnboundedSender<BeatEvent>,
) -> TransportHandle<C>
where
    C: ClockSource + Send + 'static,
{
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(transport.state().clone());
    let tick_interval = Duration::from_millis(transport.config().tick_interval_ms.max(1));

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        // A late tick catches up through the lookahead window instead of bursting
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                command = command_rx.recv() => {
                    match command {
                        None | Some(TransportCommand::Shutdown) => break,
                        Some(command) => apply(&mut transport, command),
                    }
                }
                _ = interval.tick() => {
                    for event in transport.tick() {
                        if events.send(event).is_err() {
                            debug!("beat consumer dropped");
                            break;
                        }
                    }
                }
            }
            let _ = state_tx.send(transport.state().clone());
        }
        transport
    });

    TransportHandle {
        commands: command_tx,
        state: state_rx,
        task,
    }
}

fn apply<C: ClockSource>(transport: &mut Transport<C>, command: TransportCommand) {
    let result = match command {
        TransportCommand::Play(options) => transport.play(options),
        TransportCommand::Pause => {
            transport.pause();
            Ok(())
        }
        TransportCommand::Stop => {
            transport.stop();
            Ok(())
        }
        TransportCommand::SeekToBar(bar) => {
            transport.seek_to_bar(bar);
            Ok(())
        }
        TransportCommand::SetTempoPercent(percent) => transport.set_tempo_percent(percent),
        TransportCommand::SetTempoOverride(bpm) => transport.set_tempo_override(bpm),
        TransportCommand::SetLoopSection(index) => transport.set_loop_section(index),
        TransportCommand::LoadSong(song) => transport.load_song(*song).map_err(Into::into),
        TransportCommand::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        warn!(error = %e, "transport command rejected");
    }
}
