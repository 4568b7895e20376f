use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Model, ToastLevel};
use crate::search::SearchMode;

pub fn render_search_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let text = match &model.search {
        SearchMode::Idle => return,
        SearchMode::Editing(query) => format!("/{query}  Enter: search  Esc: cancel"),
        SearchMode::Active { query, .. } => {
            let (current, total) = model.search.position().unwrap_or((0, 0));
            format!("/{query}  [{current}/{total}]  n/N: next/prev  Esc: clear")
        }
    };
    let bar = Paragraph::new(text).style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(bar, area);
}

/// Status bar text: file name, percentage, line position and mode indicators.
pub fn status_text(model: &Model) -> String {
    let filename = model.file_path.file_name().map_or_else(
        || "untitled".to_string(),
        |s| s.to_string_lossy().to_string(),
    );
    let percent = model.viewport.scroll_percent();
    let line_info = format!(
        "Line {}/{}",
        (model.viewport.offset() + 1).min(model.viewport.total_lines().max(1)),
        model.viewport.total_lines()
    );
    let watch_indicator = if model.watch_enabled {
        " [watching]"
    } else {
        ""
    };
    let toc_indicator = if model.toc.visible { " [TOC]" } else { "" };
    format!(" {filename}  [{percent}%]  {line_info}{watch_indicator}{toc_indicator}  ?:help")
}

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let bg = if model.light_background {
        Color::Indexed(252)
    } else {
        Color::DarkGray
    };
    let fg = if model.light_background {
        Color::Black
    } else {
        Color::White
    };
    let status_bar = Paragraph::new(status_text(model)).style(Style::default().bg(bg).fg(fg));
    frame.render_widget(status_bar, area);
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        ToastLevel::Info => (
            "[info]",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
        ToastLevel::Warning => (
            "[warn]",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        ToastLevel::Error => ("[error]", Style::default().bg(Color::Red).fg(Color::White)),
    };
    let toast = Paragraph::new(format!("{prefix} {message}")).style(style);
    frame.render_widget(toast, area);
}
