use std::time::Instant;

use tempfile::TempDir;

use crate::api::{Course, ExamGroup, Video, parse_course_listing};
use crate::bookmarks::{BookmarkFile, BookmarkStore, upsert};

use super::format::*;
use super::playback::{PlaybackSession, PlayerEvent};
use super::playback_summary;

fn course(id: &str, total: Option<u32>, watched: Option<u32>) -> Course {
    Course {
        id: id.to_string(),
        name: format!("Course {id}"),
        start_date: None,
        withdrawal_date: None,
        total_lessons: total,
        watched_lessons: watched,
    }
}

fn video(id: &str) -> Video {
    Video {
        id: id.to_string(),
        title: format!("Video {id}"),
        resolutions: None,
    }
}

fn session_in(dir: &TempDir) -> PlaybackSession {
    let file = BookmarkFile::new(dir.path().join("videoData.json"));
    PlaybackSession::open(file, "42", "Intro", Instant::now())
}

#[test]
fn truncate_keeps_short_text_and_marks_cut_text() {
    assert_eq!(truncate("  Short  ", 10), "Short");
    assert_eq!(truncate("Constitutional Law", 10), "Constit...");
    assert_eq!(truncate("Direito Administrativo", 22), "Direito Administrativo");
}

#[test]
fn truncate_counts_characters_not_bytes() {
    assert_eq!(truncate("Português avançado", 12), "Português...");
}

#[test]
fn or_dash_fills_blank_values() {
    assert_eq!(or_dash(None), "-");
    assert_eq!(or_dash(Some("   ")), "-");
    assert_eq!(or_dash(Some(" 2024-01-10 ")), "2024-01-10");
}

#[test]
fn lesson_progress_variants() {
    assert_eq!(lesson_progress(&course("1", Some(12), Some(5))), "5/12");
    assert_eq!(lesson_progress(&course("2", Some(8), None)), "0/8");
    assert_eq!(lesson_progress(&course("3", None, Some(3))), "-");
}

#[test]
fn saved_position_reads_store() {
    let store = upsert(&BookmarkStore::default(), "7", "Ch1", 125_000);
    assert_eq!(saved_position(&store, &video("7")), "02:05");
    assert_eq!(saved_position(&store, &video("8")), "-");
}

#[test]
fn flatten_groups_keeps_listing_order() {
    let groups = parse_course_listing(
        r#"{"data":{"concursos":[
            {"id":1,"titulo":"Tax Auditor","cursos":[{"id":10,"nome":"Accounting"},{"id":"11","nome":"Tax Law"}]},
            {"id":2,"titulo":"Empty","cursos":[]},
            {"id":3,"titulo":"Police","cursos":[{"id":30,"nome":"Criminal Law"}]}
        ]}}"#,
    )
    .expect("listing parses");

    let rows = flatten_groups(groups);
    let flat: Vec<(&str, &str)> = rows
        .iter()
        .map(|row| (row.group.as_str(), row.course.id.as_str()))
        .collect();
    assert_eq!(
        flat,
        vec![("Tax Auditor", "10"), ("Tax Auditor", "11"), ("Police", "30")]
    );
}

#[test]
fn flatten_groups_of_nothing_is_empty() {
    assert!(flatten_groups(Vec::<ExamGroup>::new()).is_empty());
}

#[test]
fn summary_reports_saved_position() {
    let dir = TempDir::new().expect("temp dir");
    let mut session = session_in(&dir);
    session.apply(PlayerEvent::Duration(600_000));
    session.apply(PlayerEvent::Position(65_000));

    assert_eq!(
        playback_summary(&session, true, None),
        "Saved position: Intro at 01:05"
    );
}

#[test]
fn summary_reports_finished_video() {
    let dir = TempDir::new().expect("temp dir");
    let mut session = session_in(&dir);
    session.apply(PlayerEvent::Position(599_000));
    session.apply(PlayerEvent::Ended);

    assert_eq!(playback_summary(&session, true, None), "Finished: Intro");
}

#[test]
fn summary_without_ipc_says_tracking_was_unavailable() {
    let dir = TempDir::new().expect("temp dir");
    let session = session_in(&dir);

    assert_eq!(
        playback_summary(&session, false, None),
        "Player closed: Intro. Position tracking was unavailable."
    );
}

#[cfg(unix)]
#[test]
fn summary_appends_failed_exit_status() {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    let dir = TempDir::new().expect("temp dir");
    let session = session_in(&dir);

    let clean = playback_summary(&session, true, Some(ExitStatus::from_raw(0)));
    assert_eq!(clean, "Saved position: Intro at 00:00");

    let failed = playback_summary(&session, true, Some(ExitStatus::from_raw(2 << 8)));
    let mut lines = failed.lines();
    assert_eq!(lines.next(), Some("Saved position: Intro at 00:00"));
    assert!(
        lines.next().is_some_and(|line| line.starts_with("player exited with status:")),
        "unexpected summary: {failed}"
    );
}
