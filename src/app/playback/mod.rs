mod controls;
mod player;
mod process;
mod session;

pub(crate) use controls::*;
pub(crate) use player::*;
pub(crate) use session::*;

use crate::api::{ApiError, Video};

/// How far a single skip moves the playhead.
pub(crate) const SKIP_MS: u64 = 10_000;
pub(crate) const SPEED_STEP: f64 = 0.25;
pub(crate) const MIN_SPEED: f64 = 0.5;
pub(crate) const MAX_SPEED: f64 = 2.0;

/// A playable video as resolved from the course API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VideoTarget {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) url: String,
}

impl VideoTarget {
    pub(crate) fn from_video(video: &Video) -> Result<Self, ApiError> {
        let url = video.require_stream_url()?;
        Ok(Self {
            id: video.id.clone(),
            title: video.title.clone(),
            url: url.to_string(),
        })
    }
}

/// State changes reported by the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlayerEvent {
    Position(u64),
    Duration(u64),
    Paused(bool),
    Speed(f64),
    Seeked,
    Ended,
    Closed,
}

/// Requests from the user while a video is playing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum UserIntent {
    TogglePause,
    SkipBack,
    SkipForward,
    SpeedUp,
    SpeedDown,
    SeekFraction(f64),
    ToggleControls,
}

/// Instructions sent to the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PlayerCommand {
    Seek(u64),
    SetSpeed(f64),
    SetPause(bool),
    Quit,
}

pub(crate) fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

pub(crate) fn seconds_to_ms(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_pads_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(999), "00:00");
        assert_eq!(format_time(65_000), "01:05");
        assert_eq!(format_time(3_600_000), "60:00");
        assert_eq!(format_time(6_000_000 + 59_999), "100:59");
    }

    #[test]
    fn seconds_to_ms_rejects_nonsense() {
        assert_eq!(seconds_to_ms(12.3456), 12_346);
        assert_eq!(seconds_to_ms(-1.0), 0);
        assert_eq!(seconds_to_ms(f64::NAN), 0);
        assert_eq!(seconds_to_ms(f64::INFINITY), 0);
    }
}
