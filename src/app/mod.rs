mod format;
mod playback;
mod tui;

#[cfg(test)]
mod tests;

use std::process::ExitStatus;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::api::{CourseApi, CourseDetail};
use crate::bookmarks::BookmarkFile;
use crate::cli::{Cli, Command};
use crate::config::Config;

use self::format::{flatten_groups, lesson_progress, or_dash, saved_position, truncate};
use self::playback::{
    LaunchMode, PlaybackSession, PlayerEvent, PlayerHandle, VideoTarget, format_time,
    with_sigint_ignored,
};

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let bookmarks = BookmarkFile::new(&config.bookmarks_path);

    match cli.command {
        Some(Command::Courses) => run_courses(&config)?,
        Some(Command::Course { course_id }) => run_course(&config, &course_id)?,
        Some(Command::Lesson {
            course_id,
            lesson_id,
        }) => run_lesson(&config, &bookmarks, &course_id, &lesson_id)?,
        Some(Command::Play {
            course_id,
            lesson_id,
            video_id,
        }) => run_play(&config, &bookmarks, &course_id, &lesson_id, &video_id)?,
        Some(Command::Bookmarks) => run_bookmarks(&bookmarks),
        Some(Command::Tui) | None => tui::run_tui(&config, &bookmarks)?,
    }

    Ok(())
}

fn run_courses(config: &Config) -> Result<()> {
    let api = CourseApi::from_config(config);
    let token = api.fetch_token().context("failed to fetch API token")?;
    let rows = flatten_groups(api.list_courses(&token).context("failed to list courses")?);
    if rows.is_empty() {
        println!("No courses available.");
        return Ok(());
    }

    let mut current_group = None::<&str>;
    for row in &rows {
        if current_group != Some(row.group.as_str()) {
            current_group = Some(row.group.as_str());
            println!("\n{}", row.group.to_uppercase());
            println!(
                "  {:<10} {:<44} {:<12} {:<12} {:<8}",
                "ID", "NAME", "START", "WITHDRAWN", "WATCHED"
            );
        }
        let course = &row.course;
        println!(
            "  {:<10} {:<44} {:<12} {:<12} {:<8}",
            truncate(&course.id, 10),
            truncate(&course.name, 44),
            or_dash(course.start_date.as_deref()),
            or_dash(course.withdrawal_date.as_deref()),
            lesson_progress(course)
        );
    }
    Ok(())
}

fn run_course(config: &Config, course_id: &str) -> Result<()> {
    let detail = fetch_course(config, course_id)?;
    let course = &detail.course;
    println!("{}", course.name.to_uppercase());
    println!("  Start:     {}", or_dash(course.start_date.as_deref()));
    println!("  Withdrawn: {}", or_dash(course.withdrawal_date.as_deref()));
    println!("  Watched:   {}", lesson_progress(course));

    if detail.lessons.is_empty() {
        println!("\nNo lessons yet.");
        return Ok(());
    }

    println!("\n  {:<10} {:<36} {:<40}", "ID", "LESSON", "CONTENT");
    for lesson in &detail.lessons {
        println!(
            "  {:<10} {:<36} {:<40}",
            truncate(&lesson.id, 10),
            truncate(&lesson.name, 36),
            truncate(&or_dash(lesson.content.as_deref()), 40)
        );
    }
    Ok(())
}

fn run_lesson(
    config: &Config,
    bookmarks: &BookmarkFile,
    course_id: &str,
    lesson_id: &str,
) -> Result<()> {
    let detail = fetch_course(config, course_id)?;
    let lesson = detail.lesson(lesson_id)?;
    let store = bookmarks.load();

    println!("{}", lesson.name.to_uppercase());
    if let Some(content) = lesson.content.as_deref() {
        println!("  {}", content.trim());
    }

    if lesson.videos.is_empty() {
        println!("\nNo videos in this lesson.");
    } else {
        println!("\n  {:<10} {:<44} {:<8} {:<6}", "ID", "VIDEO", "SAVED", "STREAM");
        for video in &lesson.videos {
            println!(
                "  {:<10} {:<44} {:<8} {:<6}",
                truncate(&video.id, 10),
                truncate(&video.title, 44),
                saved_position(&store, video),
                if video.stream_url().is_some() { "yes" } else { "no" }
            );
        }
    }

    let documents = lesson.documents();
    if !documents.is_empty() {
        println!("\nDocuments:");
        for (label, url) in documents {
            println!("  {label}: {url}");
        }
    }
    Ok(())
}

fn run_play(
    config: &Config,
    bookmarks: &BookmarkFile,
    course_id: &str,
    lesson_id: &str,
    video_id: &str,
) -> Result<()> {
    let detail = fetch_course(config, course_id)?;
    let video = VideoTarget::from_video(detail.lesson(lesson_id)?.video(video_id)?)?;

    println!("Playing: {}", video.title);
    let mut session =
        PlaybackSession::open(bookmarks.clone(), &video.id, &video.title, Instant::now());
    if let Some(resume_ms) = session.resume_position() {
        println!("  Resuming at {}", format_time(resume_ms));
    }

    let (status, tracked) = with_sigint_ignored(|| {
        let player = PlayerHandle::launch(
            &config.player_bin,
            &video,
            session.resume_position(),
            LaunchMode::Foreground,
        )?;
        let tracked = player.is_connected();
        loop {
            match player.next_event() {
                PlayerEvent::Closed => break,
                event => session.apply(event),
            }
        }
        Ok((player.wait()?, tracked))
    })?;

    println!("\n{}", playback_summary(&session, tracked, Some(status)));
    Ok(())
}

fn run_bookmarks(bookmarks: &BookmarkFile) {
    let store = bookmarks.load();
    if store.is_empty() {
        println!("No bookmarks yet. Play a video to create one.");
        return;
    }

    println!("{:<12} {:<52} {:<8}", "VIDEO ID", "TITLE", "POSITION");
    for (video_id, bookmark) in store.iter() {
        println!(
            "{:<12} {:<52} {:<8}",
            truncate(video_id, 12),
            truncate(&bookmark.title, 52),
            format_time(bookmark.position_ms)
        );
    }
    println!("\nStored in {}", bookmarks.path().display());
}

fn fetch_course(config: &Config, course_id: &str) -> Result<CourseDetail> {
    let api = CourseApi::from_config(config);
    let token = api.fetch_token().context("failed to fetch API token")?;
    api.course_detail(&token, course_id)
        .with_context(|| format!("failed to load course {course_id}"))
}

pub(crate) fn playback_summary(
    session: &PlaybackSession,
    tracked: bool,
    status: Option<ExitStatus>,
) -> String {
    let mut message = if !tracked {
        format!(
            "Player closed: {}. Position tracking was unavailable.",
            session.title()
        )
    } else if session.has_ended() {
        format!("Finished: {}", session.title())
    } else {
        format!(
            "Saved position: {} at {}",
            session.title(),
            format_time(session.position_ms())
        )
    };

    if let Some(status) = status
        && !status.success()
    {
        message = format!("{message}\nplayer exited with status: {status}");
    }
    message
}
