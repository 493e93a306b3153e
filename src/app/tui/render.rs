use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use super::super::format::{lesson_progress, or_dash, saved_position, truncate};
use super::super::playback::{PlaybackSession, format_time};
use super::state::{Browser, Screen};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);

pub(super) fn draw_tui(
    frame: &mut Frame,
    browser: &Browser,
    playing: Option<&PlaybackSession>,
    status: &str,
    notice: Option<&str>,
    now: Instant,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let mode_text = if playing.is_some() {
        "PLAYING"
    } else {
        browser.screen().label()
    };
    let selected_text = browser
        .selected()
        .map(|idx| (idx + 1).to_string())
        .unwrap_or_else(|| "-".to_string());
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "LESSONMARK",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} items", browser.len()),
            Style::default().fg(MUTED),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("selected {selected_text}"),
            Style::default().fg(MUTED),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(mode_text, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    match playing {
        Some(session) => draw_now_playing(frame, chunks[1], session),
        None => draw_browser(frame, chunks[1], browser),
    }

    let controls_line = match playing {
        Some(session) if session.controls_visible(now) => Line::from(Span::styled(
            "Space pause  ←/→ 10s  ↑/↓ speed  0-9 jump  c hide  q stop",
            Style::default().fg(MUTED),
        )),
        Some(_) => Line::from(""),
        None => Line::from(Span::styled(
            "↑/↓ move  Enter open/play  Esc back  r refresh  q quit",
            Style::default().fg(MUTED),
        )),
    };
    let command_bar = Paragraph::new(controls_line)
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(message) = notice {
        let popup_text = format!("{message}\n\nPress any key to continue.");
        let popup_area = popup_rect_for_text(frame.area(), &popup_text);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(popup_text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block("Notice"));
        frame.render_widget(popup, popup_area);
    }
}

fn draw_browser(frame: &mut Frame, area: Rect, browser: &Browser) {
    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(area);

    let (header, widths, rows, title): (Vec<&str>, Vec<Constraint>, Vec<Row>, &'static str) =
        match browser.screen() {
            Screen::Courses => (
                vec!["Course", "Exam", "Watched"],
                vec![
                    Constraint::Percentage(52),
                    Constraint::Percentage(34),
                    Constraint::Length(10),
                ],
                browser
                    .courses
                    .iter()
                    .map(|row| {
                        Row::new(vec![
                            Cell::from(row.course.name.clone()),
                            Cell::from(row.group.clone()),
                            Cell::from(lesson_progress(&row.course)),
                        ])
                    })
                    .collect(),
                "Courses",
            ),
            Screen::Lessons => (
                vec!["Lesson", "Content", "Videos"],
                vec![
                    Constraint::Percentage(36),
                    Constraint::Percentage(50),
                    Constraint::Length(8),
                ],
                browser
                    .detail
                    .iter()
                    .flat_map(|detail| detail.lessons.iter())
                    .map(|lesson| {
                        Row::new(vec![
                            Cell::from(lesson.name.clone()),
                            Cell::from(or_dash(lesson.content.as_deref())),
                            Cell::from(lesson.videos.len().to_string()),
                        ])
                    })
                    .collect(),
                "Lessons",
            ),
            Screen::Videos => (
                vec!["Video", "Saved", "Stream"],
                vec![
                    Constraint::Percentage(70),
                    Constraint::Length(9),
                    Constraint::Length(8),
                ],
                browser
                    .lesson()
                    .iter()
                    .flat_map(|lesson| lesson.videos.iter())
                    .map(|video| {
                        Row::new(vec![
                            Cell::from(video.title.clone()),
                            Cell::from(saved_position(&browser.bookmarks, video)),
                            Cell::from(if video.stream_url().is_some() { "yes" } else { "no" }),
                        ])
                    })
                    .collect(),
                "Videos",
            ),
        };

    let table = Table::new(rows, widths)
        .header(
            Row::new(header).style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        )
        .block(panel_block(title))
        .row_highlight_style(
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    let mut table_state = TableState::default();
    table_state.select(browser.selected());
    frame.render_stateful_widget(table, body_chunks[0], &mut table_state);

    let selection = Paragraph::new(selection_text(browser))
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: false })
        .block(panel_block("Selected"))
        .alignment(Alignment::Left);
    frame.render_widget(selection, body_chunks[1]);
}

fn selection_text(browser: &Browser) -> String {
    let Some(sel) = browser.selected() else {
        return match browser.screen() {
            Screen::Courses => "No courses loaded.\n\nPress r to refresh.".to_string(),
            Screen::Lessons => "This course has no lessons.".to_string(),
            Screen::Videos => "This lesson has no videos.".to_string(),
        };
    };

    match browser.screen() {
        Screen::Courses => {
            let row = &browser.courses[sel];
            format!(
                "Course\n{}\n\nExam\n{}\n\nStart\n{}\n\nWithdrawn\n{}\n\nWatched\n{}",
                truncate(&row.course.name, 40),
                truncate(&row.group, 40),
                or_dash(row.course.start_date.as_deref()),
                or_dash(row.course.withdrawal_date.as_deref()),
                lesson_progress(&row.course),
            )
        }
        Screen::Lessons => {
            let Some(lesson) = browser.detail.as_ref().and_then(|d| d.lessons.get(sel)) else {
                return String::new();
            };
            let mut text = format!(
                "Lesson\n{}\n\nContent\n{}\n\nVideos\n{}",
                truncate(&lesson.name, 40),
                or_dash(lesson.content.as_deref()),
                lesson.videos.len(),
            );
            for (label, url) in lesson.documents() {
                text.push_str(&format!("\n\n{label}\n{url}"));
            }
            text
        }
        Screen::Videos => {
            let Some(video) = browser.lesson().and_then(|lesson| lesson.videos.get(sel)) else {
                return String::new();
            };
            format!(
                "Video\n{}\n\nSaved position\n{}\n\nStream\n{}",
                truncate(&video.title, 40),
                saved_position(&browser.bookmarks, video),
                video.stream_url().unwrap_or("unavailable"),
            )
        }
    }
}

fn draw_now_playing(frame: &mut Frame, area: Rect, session: &PlaybackSession) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(area);

    let state = if session.has_ended() {
        "Ended"
    } else if session.is_paused() {
        "Paused"
    } else {
        "Playing"
    };
    let info = Paragraph::new(format!(
        "Title\n{}\n\nState\n{}\n\nSpeed\n{:.2}x",
        session.title(),
        state,
        session.speed(),
    ))
    .style(Style::default().fg(Color::Rgb(230, 230, 230)))
    .block(panel_block("Now Playing"));
    frame.render_widget(info, chunks[0]);

    let label = format!(
        "{} / {}",
        format_time(session.position_ms()),
        format_time(session.duration_ms())
    );
    let progress = Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(session.progress());
    frame.render_widget(progress, chunks[1]);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let widest = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let available_width = area.width.saturating_sub(2).max(1);
    let width = widest
        .saturating_add(12)
        .clamp(40.min(available_width), 72.min(available_width));

    let available_height = area.height.saturating_sub(2).max(1);
    let height = (text.lines().count() as u16)
        .saturating_add(6)
        .clamp(8.min(available_height), 16.min(available_height));

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
