use std::time::Instant;

use tracing::{debug, info};

use crate::bookmarks::{BookmarkFile, BookmarkStore, upsert};

use super::{
    CONTROLS_HIDE_AFTER, ControlsTimer, MAX_SPEED, MIN_SPEED, PlayerCommand, PlayerEvent,
    SKIP_MS, SPEED_STEP, UserIntent,
};

/// Playback state of one video, bookmarked on every position change.
///
/// The bookmark mapping is read once when the session opens and then kept in
/// memory; each recorded position writes the whole mapping back.
#[derive(Debug)]
pub(crate) struct PlaybackSession {
    file: BookmarkFile,
    bookmarks: BookmarkStore,
    video_id: String,
    title: String,
    resume_ms: Option<u64>,
    position_ms: u64,
    duration_ms: u64,
    speed: f64,
    paused: bool,
    ended: bool,
    recorded_ms: Option<u64>,
    controls: ControlsTimer,
}

impl PlaybackSession {
    pub(crate) fn open(file: BookmarkFile, video_id: &str, title: &str, now: Instant) -> Self {
        let bookmarks = file.load();
        let resume_ms = bookmarks.get(video_id).map(|bookmark| bookmark.position_ms);
        info!(video_id, resume_ms, "Opened playback session");

        Self {
            file,
            bookmarks,
            video_id: video_id.to_string(),
            title: title.to_string(),
            resume_ms,
            position_ms: resume_ms.unwrap_or(0),
            duration_ms: 0,
            speed: 1.0,
            paused: false,
            ended: false,
            recorded_ms: resume_ms,
            controls: ControlsTimer::new(CONTROLS_HIDE_AFTER, now),
        }
    }

    /// Position to seek to before playback starts, if this video has a bookmark.
    pub(crate) fn resume_position(&self) -> Option<u64> {
        self.resume_ms.filter(|ms| *ms > 0)
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub(crate) fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub(crate) fn speed(&self) -> f64 {
        self.speed
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn has_ended(&self) -> bool {
        self.ended
    }

    pub(crate) fn controls_visible(&self, now: Instant) -> bool {
        self.controls.is_visible(now)
    }

    /// Playback progress in `[0, 1]`, or 0 while the duration is unknown.
    pub(crate) fn progress(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    pub(crate) fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub(crate) fn apply(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Position(ms) => self.record_position(ms),
            PlayerEvent::Duration(ms) => self.duration_ms = ms,
            PlayerEvent::Paused(paused) => self.paused = paused,
            PlayerEvent::Speed(speed) if speed.is_finite() && speed > 0.0 => self.speed = speed,
            PlayerEvent::Speed(_) | PlayerEvent::Seeked | PlayerEvent::Closed => {}
            PlayerEvent::Ended => self.ended = true,
        }
    }

    pub(crate) fn intent(&mut self, intent: UserIntent, now: Instant) -> Option<PlayerCommand> {
        if intent == UserIntent::ToggleControls {
            self.controls.toggle(now);
            return None;
        }
        self.controls.touch(now);

        match intent {
            UserIntent::TogglePause => {
                self.paused = !self.paused;
                Some(PlayerCommand::SetPause(self.paused))
            }
            UserIntent::SkipBack => Some(PlayerCommand::Seek(
                self.clamp_to_duration(self.position_ms.saturating_sub(SKIP_MS)),
            )),
            UserIntent::SkipForward => Some(PlayerCommand::Seek(
                self.clamp_to_duration(self.position_ms.saturating_add(SKIP_MS)),
            )),
            UserIntent::SpeedUp => Some(self.step_speed(SPEED_STEP)),
            UserIntent::SpeedDown => Some(self.step_speed(-SPEED_STEP)),
            UserIntent::SeekFraction(fraction) => {
                if self.duration_ms == 0 || !fraction.is_finite() {
                    return None;
                }
                let target = (fraction.clamp(0.0, 1.0) * self.duration_ms as f64).round() as u64;
                self.record_position(target);
                Some(PlayerCommand::Seek(target))
            }
            UserIntent::ToggleControls => None,
        }
    }

    fn step_speed(&mut self, delta: f64) -> PlayerCommand {
        self.speed = (self.speed + delta).clamp(MIN_SPEED, MAX_SPEED);
        PlayerCommand::SetSpeed(self.speed)
    }

    fn clamp_to_duration(&self, ms: u64) -> u64 {
        if self.duration_ms == 0 {
            ms
        } else {
            ms.min(self.duration_ms)
        }
    }

    fn record_position(&mut self, ms: u64) {
        self.position_ms = ms;
        if self.recorded_ms == Some(ms) {
            return;
        }
        self.bookmarks = upsert(
            &self.bookmarks,
            &self.video_id,
            &self.title,
            i64::try_from(ms).unwrap_or(i64::MAX),
        );
        self.file.save(&self.bookmarks);
        self.recorded_ms = Some(ms);
        debug!(video_id = %self.video_id, position_ms = ms, "Recorded position");
    }
}
