// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::{anyhow, bail, Context, Result};
use metmap::config::{ConfigEvent, ConfigWatcher, EngineConfig, SongFile};
use metmap::playback::{spawn_transport, TransportCommand};
use metmap::timing::SystemClock;
use metmap::{BeatEvent, BeatKind, PlayOptions, TempoTransform, TimelineMap, Transport, TransportMode};
use std::env;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("MetMap - Metronome Timeline Engine");
    println!();
    println!("Usage: metmap [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --info <song.yaml>              Show sections, start bars and durations");
    println!("  --locate <song.yaml> <seconds>  Show the bar/beat at a song time");
    println!("  --play <song.yaml> [FLAGS]      Print clicks in real time (Ctrl+C to stop)");
    println!("      --countoff <N>              Count-off bars (0, 1, 2 or 4)");
    println!("      --percent <P>               Tempo percentage (default 100)");
    println!("      --override <BPM>            Play every section at a fixed tempo");
    println!("      --loop <I>                  Loop section I (0-based)");
    println!("      --config <engine.toml>      Scheduler settings");
    println!("  --help                          Show this help message");
}

fn load_map(path: &str) -> Result<TimelineMap> {
    let song = SongFile::load(path)?.to_song()?;
    TimelineMap::new(&song, TempoTransform::default()).map_err(Into::into)
}

fn show_info(path: &str) -> Result<()> {
    let map = load_map(path)?;
    let song = map.song();

    println!("{} ({} BPM default, {})", song.name(), song.bpm_default(), song.time_signature_default());
    println!();
    println!("  #  Start  Bars  Sig    Tempo              Start (s)  Length (s)");
    for (i, (section, start_bar)) in song.sections().iter().zip(song.start_bars()).enumerate() {
        let (start, end) = map.section_bounds(i).unwrap_or((0.0, 0.0));
        let tempo = if section.is_ramped() {
            format!(
                "{}->{} {}",
                section.tempo_start(),
                section.tempo_end(),
                section.tempo_curve()
            )
        } else {
            format!("{}", section.tempo_start())
        };
        println!(
            "{:>3}  {:>5}  {:>4}  {:<5}  {:<17}  {:>9.3}  {:>10.3}  {}",
            i,
            start_bar,
            section.bars(),
            section.time_signature().to_string(),
            tempo,
            start,
            end - start,
            section.name()
        );
    }
    println!();
    println!(
        "Total: {} bars, {} beats, {:.3} s",
        map.total_bars(),
        map.total_beats(),
        map.total_seconds()
    );
    Ok(())
}

fn locate(path: &str, seconds: &str) -> Result<()> {
    let seconds: f64 = seconds
        .parse()
        .map_err(|_| anyhow!("Invalid time in seconds: {}", seconds))?;
    let map = load_map(path)?;
    let position = map.seconds_to_position(seconds);
    let section = map
        .song()
        .get_section(position.section_index)
        .map(|s| s.name().to_string())
        .unwrap_or_default();

    println!(
        "{:.3} s -> {} in \"{}\" at {:.2} BPM",
        seconds,
        position.format(),
        section,
        position.tempo
    );
    Ok(())
}

fn parse_flag<T: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<T> {
    let value = value.ok_or_else(|| anyhow!("{} requires a value", flag))?;
    value
        .parse()
        .map_err(|_| anyhow!("Invalid value for {}: {}", flag, value))
}

struct PlayArgs {
    song: String,
    config: Option<String>,
    countoff: Option<u32>,
    options: PlayOptions,
}

fn parse_play_args(args: &[String]) -> Result<PlayArgs> {
    let song = args
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("--play requires a song file"))?;
    let mut parsed = PlayArgs {
        song,
        config: None,
        countoff: None,
        options: PlayOptions::default(),
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1);
        match flag {
            "--countoff" => parsed.countoff = Some(parse_flag(flag, value)?),
            "--percent" => parsed.options.tempo_percent = Some(parse_flag(flag, value)?),
            "--override" => parsed.options.tempo_override_bpm = Some(parse_flag(flag, value)?),
            "--loop" => parsed.options.loop_section_index = Some(parse_flag(flag, value)?),
            "--config" => {
                parsed.config = Some(value.cloned().ok_or_else(|| anyhow!("--config requires a file"))?)
            }
            _ => bail!("Unknown play option: {}", flag),
        }
        i += 2;
    }
    Ok(parsed)
}

fn play(args: &[String]) -> Result<()> {
    let args = parse_play_args(args)?;
    let engine = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut options = args.options;
    options.countoff_bars = args.countoff.unwrap_or(engine.countoff_bars);

    let song = SongFile::load(&args.song)?.to_song()?;
    let clock = SystemClock::new();
    let mut transport = Transport::new(song, clock, engine.scheduler)?;
    transport.play(options)?;
    let watcher = ConfigWatcher::new(&args.song, None)
        .map_err(|e| warn!(error = %e, "hot reload disabled"))
        .ok();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(async move {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = spawn_transport(transport, event_tx);
        let printer = tokio::spawn(print_beats(clock, event_rx));
        let mut state = handle.state();
        let mut reload_poll = tokio::time::interval(Duration::from_millis(250));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        println!("Playing {} (Ctrl+C to stop)", args.song);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    println!();
                    interrupted = true;
                    break;
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if state.borrow_and_update().mode == TransportMode::Stopped {
                        break;
                    }
                }
                _ = reload_poll.tick() => {
                    for event in watcher.iter().flat_map(|w| w.recv_all()) {
                        match event {
                            ConfigEvent::Reloaded(song) => {
                                info!(name = song.name(), "song changed, applies on next play");
                                handle.send(TransportCommand::LoadSong(song));
                            }
                            ConfigEvent::Error(message) => warn!("{}", message),
                            ConfigEvent::Removed(path) => warn!(path = ?path, "song file removed"),
                        }
                    }
                }
            }
        }

        handle.send(TransportCommand::Stop);
        let _ = handle.shutdown().await;
        if interrupted {
            printer.abort();
        } else {
            // Let the last scheduled beats print
            let _ = printer.await;
            println!("End of song");
        }
    });
    Ok(())
}

/// Print beat events at their scheduled time
///
/// Events arrive a lookahead early. Ends when the transport task drops the
/// sender.
async fn print_beats(clock: SystemClock, mut events: mpsc::UnboundedReceiver<BeatEvent>) {
    while let Some(event) = events.recv().await {
        let due = tokio::time::Instant::from_std(clock.instant_at(event.scheduled_at));
        tokio::time::sleep_until(due).await;
        println!("{}", format_beat(&event));
    }
}

fn format_beat(event: &BeatEvent) -> String {
    let mark = if event.accent { "*" } else { " " };
    match event.kind {
        BeatKind::CountOff => format!("  count {}.{} {}", event.bar, event.beat, mark),
        BeatKind::Timeline => format!(
            "{:>5}.{} {} {:>7.2} BPM  [section {}]",
            event.bar,
            event.beat,
            mark,
            event.tempo,
            event.section_index.unwrap_or(0)
        ),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("MetMap - Metronome Timeline Engine");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--info" => {
            if args.len() < 3 {
                eprintln!("Error: --info requires a song file");
                std::process::exit(1);
            }
            show_info(&args[2])?;
        }
        "--locate" => {
            if args.len() < 4 {
                eprintln!("Error: --locate requires a song file and a time in seconds");
                std::process::exit(1);
            }
            locate(&args[2], &args[3])?;
        }
        "--play" => {
            play(&args[2..])?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
