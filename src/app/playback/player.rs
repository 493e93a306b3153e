//! External player bridge.
//!
//! The player (mpv, or anything speaking its JSON IPC protocol) is started
//! at the bookmarked offset and observed over a Unix socket. A reader thread
//! turns property changes into [`PlayerEvent`]s; commands go back over the
//! same socket.

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command as ProcessCommand, ExitStatus};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::{info, warn};

use super::process::PlayerProcess;
use super::{PlayerCommand, PlayerEvent, VideoTarget, seconds_to_ms};

pub(crate) use super::process::with_sigint_ignored;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_POLL: Duration = Duration::from_millis(50);
/// Minimum spacing between forwarded position reports.
pub(crate) const STATUS_INTERVAL: Duration = Duration::from_millis(500);

const OBSERVED_PROPERTIES: [(u64, &str); 4] =
    [(1, "time-pos"), (2, "duration"), (3, "pause"), (4, "speed")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LaunchMode {
    /// The player owns the terminal (plain CLI playback).
    Foreground,
    /// The player is detached and driven from the TUI.
    Background,
}

pub(crate) fn player_args(
    video: &VideoTarget,
    start_ms: Option<u64>,
    socket: &Path,
) -> Vec<OsString> {
    let mut args = Vec::new();
    if let Some(start_ms) = start_ms.filter(|ms| *ms > 0) {
        args.push(OsString::from(format!("--start={:.3}", start_ms as f64 / 1000.0)));
    }
    let mut ipc = OsString::from("--input-ipc-server=");
    ipc.push(socket);
    args.push(ipc);
    args.push(OsString::from("--force-window=yes"));
    args.push(OsString::from(format!("--force-media-title={}", video.title)));
    args.push(OsString::from(&video.url));
    args
}

pub(crate) fn parse_ipc_line(line: &str) -> Option<PlayerEvent> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("event")?.as_str()? {
        "property-change" => {
            let data = value.get("data")?;
            match value.get("name")?.as_str()? {
                "time-pos" => Some(PlayerEvent::Position(seconds_to_ms(data.as_f64()?))),
                "duration" => Some(PlayerEvent::Duration(seconds_to_ms(data.as_f64()?))),
                "pause" => Some(PlayerEvent::Paused(data.as_bool()?)),
                "speed" => Some(PlayerEvent::Speed(data.as_f64()?)),
                _ => None,
            }
        }
        "seek" => Some(PlayerEvent::Seeked),
        "end-file" => match value.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(PlayerEvent::Ended),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn encode_command(command: &PlayerCommand) -> String {
    let payload = match command {
        PlayerCommand::Seek(ms) => {
            let secs = *ms as f64 / 1000.0;
            json!({ "command": ["seek", secs, "absolute"] })
        }
        PlayerCommand::SetSpeed(speed) => json!({ "command": ["set_property", "speed", speed] }),
        PlayerCommand::SetPause(paused) => {
            json!({ "command": ["set_property", "pause", paused] })
        }
        PlayerCommand::Quit => json!({ "command": ["quit"] }),
    };
    format!("{payload}\n")
}

fn observe_commands() -> String {
    OBSERVED_PROPERTIES
        .iter()
        .map(|(id, name)| format!("{}\n", json!({ "command": ["observe_property", id, name] })))
        .collect()
}

/// Rate-limits position reports to [`STATUS_INTERVAL`], letting the first
/// report after a seek through immediately.
///
/// The latest refused position is held so it can still be delivered when
/// playback pauses or stops before the next one is due.
#[derive(Debug)]
pub(crate) struct StatusThrottle {
    interval: Duration,
    last_forwarded: Option<Instant>,
    held_ms: Option<u64>,
}

impl StatusThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_forwarded: None,
            held_ms: None,
        }
    }

    pub(crate) fn admit(&mut self, event: &PlayerEvent, now: Instant) -> bool {
        match event {
            PlayerEvent::Seeked => {
                self.last_forwarded = None;
                self.held_ms = None;
                true
            }
            PlayerEvent::Position(ms) => {
                let due = self
                    .last_forwarded
                    .is_none_or(|last| now.duration_since(last) >= self.interval);
                if due {
                    self.last_forwarded = Some(now);
                    self.held_ms = None;
                } else {
                    self.held_ms = Some(*ms);
                }
                due
            }
            _ => true,
        }
    }

    /// The held-back position, if `event` means playback is settling.
    pub(crate) fn release_before(&mut self, event: &PlayerEvent) -> Option<PlayerEvent> {
        match event {
            PlayerEvent::Paused(true) | PlayerEvent::Ended => self.release(),
            _ => None,
        }
    }

    pub(crate) fn release(&mut self) -> Option<PlayerEvent> {
        self.held_ms.take().map(PlayerEvent::Position)
    }
}

/// A launched player plus, where supported, its IPC link.
pub(crate) struct PlayerHandle {
    process: PlayerProcess,
    link: Option<ipc::Link>,
    events: Receiver<PlayerEvent>,
    _socket_dir: TempDir,
}

impl PlayerHandle {
    pub(crate) fn launch(
        player_bin: &Path,
        video: &VideoTarget,
        start_ms: Option<u64>,
        mode: LaunchMode,
    ) -> Result<Self> {
        let socket_dir = tempfile::Builder::new()
            .prefix("lessonmark-")
            .tempdir()
            .context("failed to create player socket directory")?;
        let socket = socket_dir.path().join("player.sock");

        let mut cmd = ProcessCommand::new(player_bin);
        cmd.args(player_args(video, start_ms, &socket));
        if mode == LaunchMode::Background {
            cmd.arg("--no-terminal");
        }
        let mut process = match mode {
            LaunchMode::Foreground => PlayerProcess::spawn_foreground(cmd),
            LaunchMode::Background => PlayerProcess::spawn_background(cmd),
        }
        .with_context(|| format!("failed to start {}", player_bin.display()))?;
        info!(video_id = %video.id, start_ms, ?mode, "Launched player");

        let (tx, events) = mpsc::channel();
        let link = match ipc::Link::connect(&socket, tx, &mut process) {
            Ok(link) => Some(link),
            Err(err) => {
                warn!(error = %err, "Player IPC unavailable, positions will not be bookmarked");
                None
            }
        };

        Ok(Self {
            process,
            link,
            events,
            _socket_dir: socket_dir,
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Blocks for the next event; `Closed` once the player is gone.
    pub(crate) fn next_event(&self) -> PlayerEvent {
        if self.link.is_none() {
            return PlayerEvent::Closed;
        }
        self.events.recv().unwrap_or(PlayerEvent::Closed)
    }

    pub(crate) fn poll_event(&mut self) -> Option<PlayerEvent> {
        if self.link.is_none() {
            return (!self.process.is_running()).then_some(PlayerEvent::Closed);
        }
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(PlayerEvent::Closed),
        }
    }

    pub(crate) fn send(&mut self, command: PlayerCommand) -> Result<()> {
        match self.link.as_mut() {
            Some(link) => link.send(&command),
            None => Ok(()),
        }
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        if self.send(PlayerCommand::Quit).is_err() || self.link.is_none() {
            self.process.kill().context("failed to stop player")?;
        }
        Ok(())
    }

    pub(crate) fn wait(self) -> Result<ExitStatus> {
        let Self { process, link, .. } = self;
        let status = process.wait()?;
        if let Some(link) = link {
            link.join();
        }
        Ok(status)
    }
}

#[cfg(unix)]
mod ipc {
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::sync::mpsc::Sender;
    use std::thread::JoinHandle;
    use std::time::Instant;

    use anyhow::{Context, Result, anyhow};
    use tracing::{debug, trace};

    use super::super::process::PlayerProcess;
    use super::{
        CONNECT_POLL, CONNECT_TIMEOUT, PlayerCommand, PlayerEvent, STATUS_INTERVAL,
        StatusThrottle, encode_command, observe_commands, parse_ipc_line,
    };

    pub(crate) struct Link {
        writer: UnixStream,
        reader: Option<JoinHandle<()>>,
    }

    impl Link {
        pub(crate) fn connect(
            socket: &Path,
            events: Sender<PlayerEvent>,
            process: &mut PlayerProcess,
        ) -> Result<Self> {
            let started = Instant::now();
            let stream = loop {
                match UnixStream::connect(socket) {
                    Ok(stream) => break stream,
                    Err(err) => {
                        if !process.is_running() {
                            return Err(anyhow!("player exited before opening its IPC socket"));
                        }
                        if started.elapsed() >= CONNECT_TIMEOUT {
                            return Err(err).with_context(|| {
                                format!("player IPC socket {} never appeared", socket.display())
                            });
                        }
                        std::thread::sleep(CONNECT_POLL);
                    }
                }
            };

            let mut writer = stream.try_clone().context("failed to clone IPC socket")?;
            writer
                .write_all(observe_commands().as_bytes())
                .context("failed to subscribe to player properties")?;
            debug!(socket = %socket.display(), "Connected to player IPC");

            let reader = std::thread::spawn(move || read_events(stream, events));
            Ok(Self {
                writer,
                reader: Some(reader),
            })
        }

        pub(crate) fn send(&mut self, command: &PlayerCommand) -> Result<()> {
            self.writer
                .write_all(encode_command(command).as_bytes())
                .context("failed to send command to player")
        }

        pub(crate) fn join(mut self) {
            let _ = self.writer.shutdown(std::net::Shutdown::Both);
            if let Some(reader) = self.reader.take() {
                let _ = reader.join();
            }
        }
    }

    pub(super) fn read_events(stream: UnixStream, events: Sender<PlayerEvent>) {
        let mut throttle = StatusThrottle::new(STATUS_INTERVAL);
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else {
                break;
            };
            let Some(event) = parse_ipc_line(&line) else {
                trace!(line = %line, "Ignored player message");
                continue;
            };
            if let Some(held) = throttle.release_before(&event)
                && events.send(held).is_err()
            {
                return;
            }
            if !throttle.admit(&event, Instant::now()) {
                continue;
            }
            if events.send(event).is_err() {
                return;
            }
        }
        if let Some(held) = throttle.release() {
            let _ = events.send(held);
        }
        let _ = events.send(PlayerEvent::Closed);
    }
}

#[cfg(not(unix))]
mod ipc {
    use std::path::Path;
    use std::sync::mpsc::Sender;

    use anyhow::{Result, bail};

    use super::super::process::PlayerProcess;
    use super::{PlayerCommand, PlayerEvent};

    pub(crate) struct Link;

    impl Link {
        pub(crate) fn connect(
            _socket: &Path,
            _events: Sender<PlayerEvent>,
            _process: &mut PlayerProcess,
        ) -> Result<Self> {
            bail!("player control requires a Unix platform")
        }

        pub(crate) fn send(&mut self, _command: &PlayerCommand) -> Result<()> {
            Ok(())
        }

        pub(crate) fn join(self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoTarget {
        VideoTarget {
            id: "501".to_string(),
            title: "Apresentação".to_string(),
            url: "https://cdn.test/501.mp4".to_string(),
        }
    }

    #[test]
    fn args_include_resume_offset_only_when_bookmarked() {
        let socket = Path::new("/tmp/lm/player.sock");

        let args = player_args(&video(), Some(15_250), socket);
        assert_eq!(args[0], OsString::from("--start=15.250"));
        assert!(args.contains(&OsString::from("--input-ipc-server=/tmp/lm/player.sock")));
        assert!(args.contains(&OsString::from("--force-media-title=Apresentação")));
        assert_eq!(args.last(), Some(&OsString::from("https://cdn.test/501.mp4")));

        let fresh = player_args(&video(), None, socket);
        assert!(!fresh.iter().any(|arg| arg.to_string_lossy().starts_with("--start")));
        let zero = player_args(&video(), Some(0), socket);
        assert!(!zero.iter().any(|arg| arg.to_string_lossy().starts_with("--start")));
    }

    #[test]
    fn parses_property_changes() {
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":12.5}"#),
            Some(PlayerEvent::Position(12_500))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":2,"name":"duration","data":600.0}"#),
            Some(PlayerEvent::Duration(600_000))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":3,"name":"pause","data":true}"#),
            Some(PlayerEvent::Paused(true))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":4,"name":"speed","data":1.5}"#),
            Some(PlayerEvent::Speed(1.5))
        );
    }

    #[test]
    fn ignores_unavailable_and_unrelated_messages() {
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos"}"#),
            None
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#),
            None
        );
        assert_eq!(parse_ipc_line(r#"{"error":"success","request_id":0}"#), None);
        assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"quit"}"#), None);
        assert_eq!(parse_ipc_line("not json"), None);
    }

    #[test]
    fn parses_seek_and_end_of_file() {
        assert_eq!(parse_ipc_line(r#"{"event":"seek"}"#), Some(PlayerEvent::Seeked));
        assert_eq!(
            parse_ipc_line(r#"{"event":"end-file","reason":"eof"}"#),
            Some(PlayerEvent::Ended)
        );
    }

    #[test]
    fn encodes_commands_as_json_lines() {
        let seek: Value = serde_json::from_str(encode_command(&PlayerCommand::Seek(25_500)).trim())
            .expect("seek json");
        assert_eq!(seek, json!({ "command": ["seek", 25.5, "absolute"] }));

        let speed: Value =
            serde_json::from_str(encode_command(&PlayerCommand::SetSpeed(1.25)).trim())
                .expect("speed json");
        assert_eq!(speed, json!({ "command": ["set_property", "speed", 1.25] }));

        let pause = encode_command(&PlayerCommand::SetPause(true));
        assert!(pause.ends_with('\n'));
        assert!(pause.contains(r#"["set_property","pause",true]"#));

        assert_eq!(
            encode_command(&PlayerCommand::Quit),
            "{\"command\":[\"quit\"]}\n"
        );
    }

    #[test]
    fn observes_all_tracked_properties() {
        let commands = observe_commands();
        assert_eq!(commands.lines().count(), OBSERVED_PROPERTIES.len());
        assert!(commands.contains(r#"["observe_property",1,"time-pos"]"#));
    }

    #[test]
    fn throttle_spaces_position_reports() {
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(STATUS_INTERVAL);

        assert!(throttle.admit(&PlayerEvent::Position(0), start));
        assert!(!throttle.admit(
            &PlayerEvent::Position(100),
            start + Duration::from_millis(100)
        ));
        assert!(throttle.admit(
            &PlayerEvent::Duration(1_000),
            start + Duration::from_millis(100)
        ));
        assert!(throttle.admit(
            &PlayerEvent::Position(500),
            start + Duration::from_millis(500)
        ));
    }

    #[test]
    fn throttle_lets_first_report_after_seek_through() {
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(STATUS_INTERVAL);

        assert!(throttle.admit(&PlayerEvent::Position(0), start));
        assert!(throttle.admit(&PlayerEvent::Seeked, start + Duration::from_millis(10)));
        assert!(throttle.admit(
            &PlayerEvent::Position(90_000),
            start + Duration::from_millis(20)
        ));
        assert!(!throttle.admit(
            &PlayerEvent::Position(90_100),
            start + Duration::from_millis(30)
        ));
    }

    #[test]
    fn held_position_is_released_on_pause_and_end() {
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(STATUS_INTERVAL);

        assert!(throttle.admit(&PlayerEvent::Position(1_000), start));
        assert!(!throttle.admit(
            &PlayerEvent::Position(1_200),
            start + Duration::from_millis(200)
        ));
        assert!(!throttle.admit(
            &PlayerEvent::Position(1_300),
            start + Duration::from_millis(300)
        ));
        assert_eq!(throttle.release_before(&PlayerEvent::Paused(false)), None);
        assert_eq!(
            throttle.release_before(&PlayerEvent::Paused(true)),
            Some(PlayerEvent::Position(1_300))
        );
        assert_eq!(throttle.release(), None);

        assert!(!throttle.admit(
            &PlayerEvent::Position(1_400),
            start + Duration::from_millis(400)
        ));
        assert_eq!(
            throttle.release_before(&PlayerEvent::Ended),
            Some(PlayerEvent::Position(1_400))
        );
    }

    #[test]
    fn seek_discards_held_position() {
        let start = Instant::now();
        let mut throttle = StatusThrottle::new(STATUS_INTERVAL);

        assert!(throttle.admit(&PlayerEvent::Position(1_000), start));
        assert!(!throttle.admit(
            &PlayerEvent::Position(1_100),
            start + Duration::from_millis(100)
        ));
        assert!(throttle.admit(&PlayerEvent::Seeked, start + Duration::from_millis(150)));
        assert_eq!(throttle.release(), None);
    }

    #[cfg(unix)]
    #[test]
    fn reader_turns_socket_lines_into_events() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (player_side, client_side) = UnixStream::pair().expect("socket pair");
        let (tx, rx) = mpsc::channel();
        let reader = std::thread::spawn(move || ipc::read_events(client_side, tx));

        let lines = [
            r#"{"event":"property-change","id":2,"name":"duration","data":600.0}"#,
            r#"{"event":"property-change","id":1,"name":"time-pos","data":10.0}"#,
            r#"{"event":"property-change","id":1,"name":"time-pos","data":10.1}"#,
            r#"{"event":"property-change","id":1,"name":"time-pos","data":10.2}"#,
            r#"{"request_id":0,"error":"success"}"#,
            r#"{"event":"property-change","id":3,"name":"pause","data":true}"#,
            r#"{"event":"seek"}"#,
            r#"{"event":"property-change","id":1,"name":"time-pos","data":300.0}"#,
            r#"{"event":"property-change","id":1,"name":"time-pos","data":300.1}"#,
        ];
        let mut writer = player_side;
        for line in lines {
            writeln!(writer, "{line}").expect("write ipc line");
        }
        drop(writer);
        reader.join().expect("reader thread");

        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                PlayerEvent::Duration(600_000),
                PlayerEvent::Position(10_000),
                PlayerEvent::Position(10_200),
                PlayerEvent::Paused(true),
                PlayerEvent::Seeked,
                PlayerEvent::Position(300_000),
                PlayerEvent::Position(300_100),
                PlayerEvent::Closed,
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn missing_player_binary_fails_to_launch() {
        let err = PlayerHandle::launch(
            Path::new("/nonexistent/lessonmark-player"),
            &video(),
            None,
            LaunchMode::Background,
        )
        .err()
        .expect("launch should fail");
        assert!(
            format!("{err:#}").contains("/nonexistent/lessonmark-player"),
            "unexpected error: {err:#}"
        );
    }
}
