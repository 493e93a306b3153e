mod render;
mod session;
mod state;


use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{error, info};

use crate::api::CourseApi;
use crate::bookmarks::BookmarkFile;
use crate::config::Config;

use super::format::flatten_groups;
use super::playback::{
    LaunchMode, PlaybackSession, PlayerEvent, PlayerHandle, UserIntent, VideoTarget,
};
use super::playback_summary;

use self::render::draw_tui;
use self::session::TerminalSession;
use self::state::{BrowseAction, Browser, Screen};

const BROWSE_POLL: Duration = Duration::from_millis(200);
const PLAYING_POLL: Duration = Duration::from_millis(100);

struct NowPlaying {
    session: PlaybackSession,
    player: PlayerHandle,
}

pub(crate) fn run_tui(config: &Config, bookmarks: &BookmarkFile) -> Result<()> {
    let terminal_session = TerminalSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let api = CourseApi::from_config(config);
    let mut browser = Browser::default();
    browser.bookmarks = bookmarks.load();
    let mut status = match reload_courses(&api, &mut browser) {
        Ok(()) => status_info("Ready."),
        Err(err) => status_error(&format!("Could not load courses: {err:#}")),
    };
    let mut notice = None::<String>;
    let mut now_playing = None::<NowPlaying>;

    loop {
        let player_closed = now_playing.as_mut().is_some_and(drain_player_events);
        if player_closed && let Some(finished) = now_playing.take() {
            status = finish_playback(finished, &mut browser);
        }

        let now = Instant::now();
        terminal.draw(|frame| {
            draw_tui(
                frame,
                &browser,
                now_playing.as_ref().map(|playing| &playing.session),
                &status,
                notice.as_deref(),
                now,
            )
        })?;

        let poll = if now_playing.is_some() {
            PLAYING_POLL
        } else {
            BROWSE_POLL
        };
        if !event::poll(poll)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if notice.is_some() {
            notice = None;
            continue;
        }

        if let Some(playing) = now_playing.as_mut() {
            if let Some(message) = handle_playing_key(playing, key.code) {
                status = message;
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Up => browser.move_up(),
            KeyCode::Down => browser.move_down(),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Left => browser.back(),
            KeyCode::Char('r') => {
                status = match refresh(&api, &mut browser) {
                    Ok(()) => status_info("Refreshed."),
                    Err(err) => status_error(&format!("Refresh failed: {err:#}")),
                };
            }
            KeyCode::Enter | KeyCode::Right => match browser.enter() {
                BrowseAction::Nothing => {}
                BrowseAction::OpenCourse(course_id) => {
                    status = match open_course(&api, &mut browser, &course_id) {
                        Ok(()) => status_info("Course loaded."),
                        Err(err) => status_error(&format!("Could not open course: {err:#}")),
                    };
                }
                BrowseAction::Notice(message) => {
                    status = status_error("Video cannot be played.");
                    notice = Some(message);
                }
                BrowseAction::Play(video) => {
                    // Connecting to the player can take seconds; show why the screen is idle.
                    status = starting_status(&video);
                    terminal.draw(|frame| {
                        draw_tui(frame, &browser, None, &status, None, Instant::now())
                    })?;
                    match start_playback(config, bookmarks, &video) {
                        Ok(playing) => {
                            status = if playing.player.is_connected() {
                                status_info(&format!("Playing {}", video.title))
                            } else {
                                status_error(
                                    "Player started without IPC; position will not be saved.",
                                )
                            };
                            now_playing = Some(playing);
                        }
                        Err(err) => status = status_error(&format!("Playback failed: {err:#}")),
                    }
                }
            },
            _ => {}
        }
    }

    if let Some(mut playing) = now_playing.take() {
        let _ = playing.player.stop();
        finish_playback(playing, &mut browser);
    }
    terminal.show_cursor()?;
    terminal_session.leave()?;
    Ok(())
}

/// Applies pending player events; true once the player has gone away.
fn drain_player_events(playing: &mut NowPlaying) -> bool {
    while let Some(event) = playing.player.poll_event() {
        if event == PlayerEvent::Closed {
            return true;
        }
        playing.session.apply(event);
    }
    false
}

fn handle_playing_key(playing: &mut NowPlaying, code: KeyCode) -> Option<String> {
    let intent = match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            return match playing.player.stop() {
                Ok(()) => Some(status_info("Stopping player...")),
                Err(err) => Some(status_error(&format!("Could not stop player: {err:#}"))),
            };
        }
        KeyCode::Char(' ') => UserIntent::TogglePause,
        KeyCode::Left => UserIntent::SkipBack,
        KeyCode::Right => UserIntent::SkipForward,
        KeyCode::Up => UserIntent::SpeedUp,
        KeyCode::Down => UserIntent::SpeedDown,
        KeyCode::Char('c') => UserIntent::ToggleControls,
        KeyCode::Char(digit @ '0'..='9') => {
            let tenth = digit.to_digit(10).unwrap_or(0);
            UserIntent::SeekFraction(f64::from(tenth) / 10.0)
        }
        _ => return None,
    };

    let command = playing.session.intent(intent, Instant::now())?;
    match playing.player.send(command) {
        Ok(()) => None,
        Err(err) => Some(status_error(&format!("Player command failed: {err:#}"))),
    }
}

fn start_playback(
    config: &Config,
    bookmarks: &BookmarkFile,
    video: &VideoTarget,
) -> Result<NowPlaying> {
    let session =
        PlaybackSession::open(bookmarks.clone(), &video.id, &video.title, Instant::now());
    let player = PlayerHandle::launch(
        &config.player_bin,
        video,
        session.resume_position(),
        LaunchMode::Background,
    )?;
    Ok(NowPlaying { session, player })
}

fn starting_status(video: &VideoTarget) -> String {
    status_info(&format!("Starting player for {}...", video.title))
}

fn finish_playback(playing: NowPlaying, browser: &mut Browser) -> String {
    let NowPlaying { session, player } = playing;
    let tracked = player.is_connected();
    let status = match player.wait() {
        Ok(status) => Some(status),
        Err(err) => {
            error!(error = %err, "Failed to reap player");
            None
        }
    };
    browser.bookmarks = session.bookmarks().clone();
    info!(
        title = session.title(),
        position_ms = session.position_ms(),
        "Playback finished"
    );
    status_info(&playback_summary(&session, tracked, status).replace('\n', " | "))
}

fn reload_courses(api: &CourseApi, browser: &mut Browser) -> Result<()> {
    let token = api.fetch_token().context("failed to fetch API token")?;
    let groups = api.list_courses(&token)?;
    browser.set_courses(flatten_groups(groups));
    Ok(())
}

fn open_course(api: &CourseApi, browser: &mut Browser, course_id: &str) -> Result<()> {
    let token = api.fetch_token().context("failed to fetch API token")?;
    let detail = api.course_detail(&token, course_id)?;
    browser.show_course(detail);
    Ok(())
}

fn refresh(api: &CourseApi, browser: &mut Browser) -> Result<()> {
    let open_course_id = match browser.screen() {
        Screen::Courses => None,
        Screen::Lessons | Screen::Videos => browser.current_course_id().map(str::to_string),
    };
    match open_course_id {
        Some(course_id) => open_course(api, browser, &course_id),
        None => reload_courses(api, browser),
    }
}

fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}
