use crate::api::{Course, ExamGroup, Video};
use crate::bookmarks::BookmarkStore;

use super::playback::format_time;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.trim().to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn or_dash(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "-".to_string(),
    }
}

pub(crate) fn lesson_progress(course: &Course) -> String {
    match (course.watched_lessons, course.total_lessons) {
        (Some(watched), Some(total)) => format!("{watched}/{total}"),
        (None, Some(total)) => format!("0/{total}"),
        _ => "-".to_string(),
    }
}

pub(crate) fn saved_position(bookmarks: &BookmarkStore, video: &Video) -> String {
    bookmarks
        .get(&video.id)
        .map(|bookmark| format_time(bookmark.position_ms))
        .unwrap_or_else(|| "-".to_string())
}

/// A course listing row together with the exam group it was listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CourseRow {
    pub(crate) group: String,
    pub(crate) course: Course,
}

pub(crate) fn flatten_groups(groups: Vec<ExamGroup>) -> Vec<CourseRow> {
    groups
        .into_iter()
        .flat_map(|group| {
            let title = group.title;
            group.courses.into_iter().map(move |course| CourseRow {
                group: title.clone(),
                course,
            })
        })
        .collect()
}
