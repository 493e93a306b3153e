use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "lessonmark",
    version,
    about = "Browse courses and resume lesson videos where you left off"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List courses grouped by exam
    Courses,
    /// Show the lessons of a course
    Course { course_id: String },
    /// Show the videos and documents of a lesson
    Lesson {
        course_id: String,
        lesson_id: String,
    },
    /// Play a lesson video, resuming from its bookmark
    Play {
        course_id: String,
        lesson_id: String,
        video_id: String,
    },
    /// List saved playback positions
    Bookmarks,
    /// Interactive browser (default)
    Tui,
}

impl Command {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Tui)
    }
}
