use crate::api::{CourseDetail, Lesson};
use crate::bookmarks::BookmarkStore;

use super::super::format::CourseRow;
use super::super::playback::VideoTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Screen {
    Courses,
    Lessons,
    Videos,
}

impl Screen {
    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Courses => "COURSES",
            Self::Lessons => "LESSONS",
            Self::Videos => "VIDEOS",
        }
    }
}

/// What the event loop must do after a key press in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum BrowseAction {
    Nothing,
    OpenCourse(String),
    Play(VideoTarget),
    Notice(String),
}

/// Navigation state of the course browser.
#[derive(Debug, Default)]
pub(super) struct Browser {
    pub(super) courses: Vec<CourseRow>,
    pub(super) detail: Option<CourseDetail>,
    pub(super) bookmarks: BookmarkStore,
    lesson_idx: Option<usize>,
    course_sel: usize,
    lesson_sel: usize,
    video_sel: usize,
}

impl Browser {
    pub(super) fn screen(&self) -> Screen {
        match (&self.detail, self.lesson_idx) {
            (None, _) => Screen::Courses,
            (Some(_), None) => Screen::Lessons,
            (Some(_), Some(_)) => Screen::Videos,
        }
    }

    pub(super) fn lesson(&self) -> Option<&Lesson> {
        self.detail.as_ref()?.lessons.get(self.lesson_idx?)
    }

    pub(super) fn selected(&self) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let sel = match self.screen() {
            Screen::Courses => self.course_sel,
            Screen::Lessons => self.lesson_sel,
            Screen::Videos => self.video_sel,
        };
        Some(sel.min(len - 1))
    }

    pub(super) fn len(&self) -> usize {
        match self.screen() {
            Screen::Courses => self.courses.len(),
            Screen::Lessons => self.detail.as_ref().map_or(0, |detail| detail.lessons.len()),
            Screen::Videos => self.lesson().map_or(0, |lesson| lesson.videos.len()),
        }
    }

    pub(super) fn move_up(&mut self) {
        let sel = self.selected().unwrap_or(0).saturating_sub(1);
        *self.selection_mut() = sel;
    }

    pub(super) fn move_down(&mut self) {
        let last = self.len().saturating_sub(1);
        let sel = (self.selected().unwrap_or(0) + 1).min(last);
        *self.selection_mut() = sel;
    }

    pub(super) fn set_courses(&mut self, courses: Vec<CourseRow>) {
        let keep_id = self
            .selected_course()
            .map(|row| row.course.id.clone());
        self.courses = courses;
        self.course_sel = keep_id
            .and_then(|id| self.courses.iter().position(|row| row.course.id == id))
            .unwrap_or(0);
    }

    /// Shows the lessons of `detail`. When it replaces the course already on
    /// screen, the open lesson stays open if it still exists.
    pub(super) fn show_course(&mut self, detail: CourseDetail) {
        let same_course = self
            .detail
            .as_ref()
            .is_some_and(|current| current.course.id == detail.course.id);
        let open_lesson_id = self.lesson().map(|lesson| lesson.id.clone());

        if same_course {
            self.lesson_idx = open_lesson_id
                .and_then(|id| detail.lessons.iter().position(|lesson| lesson.id == id));
        } else {
            self.lesson_idx = None;
            self.lesson_sel = 0;
            self.video_sel = 0;
        }
        self.detail = Some(detail);
    }

    pub(super) fn current_course_id(&self) -> Option<&str> {
        self.detail.as_ref().map(|detail| detail.course.id.as_str())
    }

    pub(super) fn enter(&mut self) -> BrowseAction {
        let Some(sel) = self.selected() else {
            return BrowseAction::Nothing;
        };
        match self.screen() {
            Screen::Courses => BrowseAction::OpenCourse(self.courses[sel].course.id.clone()),
            Screen::Lessons => {
                self.lesson_idx = Some(sel);
                self.video_sel = 0;
                BrowseAction::Nothing
            }
            Screen::Videos => {
                let Some(video) = self.lesson().and_then(|lesson| lesson.videos.get(sel)) else {
                    return BrowseAction::Nothing;
                };
                match VideoTarget::from_video(video) {
                    Ok(target) => BrowseAction::Play(target),
                    Err(err) => BrowseAction::Notice(format!("{}: {err}", video.title)),
                }
            }
        }
    }

    pub(super) fn back(&mut self) {
        match self.screen() {
            Screen::Courses => {}
            Screen::Lessons => self.detail = None,
            Screen::Videos => self.lesson_idx = None,
        }
    }

    fn selected_course(&self) -> Option<&CourseRow> {
        self.courses.get(self.course_sel)
    }

    fn selection_mut(&mut self) -> &mut usize {
        match self.screen() {
            Screen::Courses => &mut self.course_sel,
            Screen::Lessons => &mut self.lesson_sel,
            Screen::Videos => &mut self.video_sel,
        }
    }
}
