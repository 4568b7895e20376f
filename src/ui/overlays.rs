use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};

use crate::app::Model;

/// Key bindings listed in the help overlay, grouped by section.
const HELP_SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/k or Up/Down", "Scroll"),
            ("Space/PageDown", "Page down"),
            ("b/PageUp", "Page up"),
            ("Ctrl-d / Ctrl-u", "Half page"),
            ("g / G", "Top / bottom"),
            ("f / click", "Follow in-document link"),
        ],
    ),
    (
        "Search",
        &[
            ("/", "Start search"),
            ("Enter", "Run search"),
            ("n / N", "Next / previous match"),
            ("Esc", "Clear search"),
        ],
    ),
    (
        "TOC",
        &[
            ("t", "Toggle TOC"),
            ("Tab", "Switch focus"),
            ("j/k, Enter", "Move / jump"),
            ("h / l", "Collapse / expand"),
        ],
    ),
    (
        "Other",
        &[
            ("w", "Toggle watch"),
            ("r", "Reload file"),
            ("q / Ctrl-c", "Quit"),
            ("? / F1", "Toggle help"),
        ],
    ),
];

pub fn render_help_overlay(model: &Model, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(12).max(48);
    let popup_height = area.height.saturating_sub(4).max(12);
    let popup = centered_popup_rect(popup_width, popup_height, area);

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    for (title, bindings) in HELP_SECTIONS {
        lines.push(Line::styled(*title, section_style));
        for (keys, action) in *bindings {
            lines.push(Line::raw(format!("  {keys:<20}{action}")));
        }
        lines.push(Line::raw(""));
    }

    let global_cfg = model
        .config_global_path
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());
    let local_cfg = model
        .config_local_path
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |p| p.display().to_string());
    lines.push(Line::styled("Config", section_style));
    lines.push(Line::raw(format!("  Global: {global_cfg}")));
    lines.push(Line::raw(format!("  Local override: {local_cfg}")));

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        popup,
    );
}

fn centered_popup_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w) / 2);
    let y = area.y + (area.height.saturating_sub(h) / 2);
    Rect::new(x, y, w, h)
}
