use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use harmony_player::audio::{self, SimulatedEngine};
use harmony_player::config::PlayerConfig;
use harmony_player::logging;
use harmony_player::model::{RepeatState, SessionSnapshot, Track};
use harmony_player::{HostSession, PlaybackService, TransportCommand};

const HELP: &str = "\
commands:
  add <seconds> <uri> [title]   append a track
  play | pause | toggle | stop
  seek <seconds>
  next | prev | jump <index> | remove <index>
  repeat [off|all|one]          no argument cycles
  shuffle [on|off]              no argument toggles
  status | help | quit";

/// Headless console for the playback core
#[derive(Parser, Debug)]
#[command(name = "harmony-player", version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated engine progress interval in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Transport(TransportCommand),
    Add(Track),
    Status,
    Help,
    Quit,
}

/// Prints snapshots whose visible state changed; position-only updates are skipped
struct ConsoleHost {
    last: Mutex<Option<SessionSnapshot>>,
}

impl HostSession for ConsoleHost {
    fn publish(&self, snapshot: &SessionSnapshot) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let changed = last.as_ref().is_none_or(|prev| {
            prev.status != snapshot.status
                || prev.track != snapshot.track
                || prev.queue_index != snapshot.queue_index
                || prev.queue_len != snapshot.queue_len
                || prev.repeat != snapshot.repeat
                || prev.shuffle != snapshot.shuffle
                || prev.error != snapshot.error
        });
        if changed {
            print_snapshot(snapshot);
        }
        *last = Some(snapshot.clone());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::load(args.config.as_deref())?;
    let _log_guard = match logging::init_logging(&config.log_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Harmony Player Starting ===");

    let (engine, events) = SimulatedEngine::new();
    let host = Arc::new(ConsoleHost { last: Mutex::new(None) });
    let mut service = PlaybackService::create(&config, engine.clone(), events, Some(host))?;
    let Some(session) = service.session() else {
        anyhow::bail!("playback service has no session");
    };

    let ticker_engine = engine.clone();
    let tick = Duration::from_millis(args.tick_ms.max(10));
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            ticker_engine.tick(tick);
        }
    });

    println!("{} ready ({} device). Type 'help' for commands.", audio::session_id(), audio::device_name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_id = 0u32;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line, &mut next_id) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::Help) => println!("{}", HELP),
            Ok(ConsoleCommand::Status) => print_snapshot(&session.snapshot()),
            Ok(ConsoleCommand::Add(track)) => {
                engine.register(track.uri(), track.duration());
                session.send(TransportCommand::Enqueue(track))?;
            }
            Ok(ConsoleCommand::Transport(command)) => session.send(command)?,
            Err(message) => println!("error: {}", message),
        }
    }

    ticker.abort();
    service.destroy().await;
    tracing::info!("Harmony Player shutting down");
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize snapshot"),
    }
}

fn parse_command(line: &str, next_id: &mut u32) -> std::result::Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_lowercase();

    let command = match verb.as_str() {
        "play" => TransportCommand::Play,
        "pause" => TransportCommand::Pause,
        "toggle" => TransportCommand::TogglePlayPause,
        "stop" => TransportCommand::Stop,
        "next" => TransportCommand::SkipNext,
        "prev" => TransportCommand::SkipPrevious,
        "seek" => TransportCommand::Seek(parse_seconds(parts.next())?),
        "jump" => TransportCommand::SkipTo(parse_index(parts.next())?),
        "remove" => TransportCommand::RemoveAt(parse_index(parts.next())?),
        "repeat" => match parts.next() {
            None => TransportCommand::CycleRepeat,
            Some("off") => TransportCommand::SetRepeat(RepeatState::Off),
            Some("all") => TransportCommand::SetRepeat(RepeatState::All),
            Some("one") => TransportCommand::SetRepeat(RepeatState::One),
            Some(other) => return Err(format!("unknown repeat mode '{}'", other)),
        },
        "shuffle" => match parts.next() {
            None => TransportCommand::ToggleShuffle,
            Some("on") => TransportCommand::SetShuffle(true),
            Some("off") => TransportCommand::SetShuffle(false),
            Some(other) => return Err(format!("unknown shuffle setting '{}'", other)),
        },
        "add" => {
            let duration = parse_seconds(parts.next())?;
            let uri = parts.next().ok_or("missing uri")?;
            let title: Vec<&str> = parts.collect();
            let title = if title.is_empty() { uri.to_string() } else { title.join(" ") };
            *next_id += 1;
            return Ok(ConsoleCommand::Add(Track::new(
                format!("track-{}", next_id),
                title,
                "Unknown artist",
                duration,
                uri,
            )));
        }
        "status" => return Ok(ConsoleCommand::Status),
        "help" => return Ok(ConsoleCommand::Help),
        "quit" | "exit" => return Ok(ConsoleCommand::Quit),
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(ConsoleCommand::Transport(command))
}

fn parse_seconds(value: Option<&str>) -> std::result::Result<Duration, String> {
    let value = value.ok_or("missing seconds")?;
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| format!("invalid seconds '{}'", value))
}

fn parse_index(value: Option<&str>) -> std::result::Result<usize, String> {
    let value = value.ok_or("missing index")?;
    value.parse().map_err(|_| format!("invalid index '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport_commands() {
        let mut id = 0;
        assert_eq!(parse_command("play", &mut id), Ok(ConsoleCommand::Transport(TransportCommand::Play)));
        assert_eq!(
            parse_command("seek 12.5", &mut id),
            Ok(ConsoleCommand::Transport(TransportCommand::Seek(Duration::from_millis(12_500))))
        );
        assert_eq!(parse_command("repeat", &mut id), Ok(ConsoleCommand::Transport(TransportCommand::CycleRepeat)));
        assert_eq!(
            parse_command("shuffle on", &mut id),
            Ok(ConsoleCommand::Transport(TransportCommand::SetShuffle(true)))
        );
    }

    #[test]
    fn test_parse_add_builds_track() {
        let mut id = 0;
        let Ok(ConsoleCommand::Add(track)) = parse_command("add 180 file:///a.flac Blue Monday", &mut id) else {
            panic!("expected add");
        };
        assert_eq!(track.id(), "track-1");
        assert_eq!(track.title(), "Blue Monday");
        assert_eq!(track.duration(), Duration::from_secs(180));
        assert_eq!(track.uri(), "file:///a.flac");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let mut id = 0;
        assert!(parse_command("seek -3", &mut id).is_err());
        assert!(parse_command("seek 1e300", &mut id).is_err());
        assert!(parse_command("seek inf", &mut id).is_err());
        assert!(parse_command("add 1e300 file:///a.flac", &mut id).is_err());
        assert!(parse_command("jump x", &mut id).is_err());
        assert!(parse_command("repeat twice", &mut id).is_err());
        assert!(parse_command("dance", &mut id).is_err());
    }
}
