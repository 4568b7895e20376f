use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph};

use crate::app::Model;
use crate::document::{LineType, RenderedLine};
use crate::search::match_ranges;

use super::images::{self, ImageSurfaces};
use super::{
    DOC_WIDTH_PERCENT, DOCUMENT_LEFT_PADDING, TOC_WIDTH_PERCENT, overlays, status, style,
};

pub fn split_main_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(TOC_WIDTH_PERCENT),
            Constraint::Percentage(DOC_WIDTH_PERCENT),
        ])
        .split(area)
}

/// Columns available to document text for a terminal `total_width` wide.
pub fn document_content_width(total_width: u16, toc_visible: bool) -> u16 {
    let area = Rect::new(0, 0, total_width, 1);
    let doc_width = if toc_visible {
        split_main_columns(area)[1].width
    } else {
        total_width
    };
    doc_width.saturating_sub(DOCUMENT_LEFT_PADDING).max(1)
}

/// Render the complete UI.
pub fn render(model: &Model, frame: &mut Frame, surfaces: &mut ImageSurfaces) {
    let area = frame.area();

    if model.toc.visible {
        let chunks = split_main_columns(area);
        render_toc(model, frame, chunks[0]);
        render_document(model, frame, chunks[1], surfaces);
    } else {
        render_document(model, frame, area, surfaces);
    }

    if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    }
}

fn render_toc(model: &Model, frame: &mut Frame, area: Rect) {
    let headings = model.document.headings();
    let entries = model.toc.entries(headings);
    let visible_rows = area.height.saturating_sub(2) as usize;
    let max_start = entries.len().saturating_sub(visible_rows);
    let start = model.toc.scroll_offset.min(max_start);

    let items: Vec<Line> = entries
        .iter()
        .skip(start)
        .take(visible_rows)
        .map(|&idx| {
            let heading = &headings[idx];
            let selected = model.toc.selected == Some(idx);
            let indent = "  ".repeat(heading.level.saturating_sub(1) as usize);
            let marker = if selected { ">" } else { " " };
            let fold = if model.toc.collapsed.contains(&idx) {
                "+ "
            } else {
                ""
            };
            let base =
                style::style_for_line_type(LineType::Heading(heading.level), model.light_background);
            let style = if selected { base.reversed() } else { base };
            Line::styled(format!("{marker}{indent} {fold}{}", heading.text), style)
        })
        .collect();

    let toc_block = Block::default()
        .title("Table of Contents")
        .borders(Borders::ALL)
        .border_style(if model.toc.focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        });

    frame.render_widget(Paragraph::new(items).block(toc_block), area);
}

fn render_document(model: &Model, frame: &mut Frame, area: Rect, surfaces: &mut ImageSurfaces) {
    let search_active = model.search != crate::search::SearchMode::Idle;
    let toast_active = model.active_toast().is_some();
    let footer_rows = 1 + u16::from(search_active) + u16::from(toast_active);
    let doc_outer_area = Rect {
        height: area.height.saturating_sub(footer_rows),
        ..area
    };
    let search_area = Rect {
        y: area.y + area.height.saturating_sub(2),
        height: 1,
        ..area
    };
    let toast_area = Rect {
        y: area.y + area.height.saturating_sub(2 + u16::from(search_active)),
        height: 1,
        ..area
    };
    let status_area = Rect {
        y: area.y + area.height.saturating_sub(1),
        height: 1,
        ..area
    };

    let query = match &model.search {
        crate::search::SearchMode::Active { query, .. } => Some(query.as_str()),
        _ => None,
    };
    let current_match = model.search.current_line();
    let offset = model.viewport.offset();
    let content: Vec<Line> = model
        .document
        .visible_lines(offset, doc_outer_area.height as usize)
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let spans = styled_spans(line, model.light_background);
            let spans = match query {
                Some(query) => {
                    let is_current = current_match == Some(offset + idx);
                    highlight_spans(&spans, query, is_current)
                }
                None => spans,
            };
            Line::from(spans)
        })
        .collect();

    let doc_block = Block::default()
        .borders(Borders::NONE)
        .padding(Padding::left(DOCUMENT_LEFT_PADDING));
    let doc_area = doc_block.inner(doc_outer_area);
    // Clear first so image cells from previous frames do not leak.
    frame.render_widget(Clear, doc_outer_area);
    frame.render_widget(Paragraph::new(content).block(doc_block), doc_outer_area);

    images::render_images(model, frame, doc_area, surfaces);

    if toast_active {
        status::render_toast_bar(model, frame, toast_area);
    }
    if search_active {
        status::render_search_bar(model, frame, search_area);
    }
    status::render_status_bar(model, frame, status_area);
}

fn styled_spans(line: &RenderedLine, light_bg: bool) -> Vec<Span<'static>> {
    let line_style = style::style_for_line_type(line.line_type(), light_bg);
    line.spans()
        .iter()
        .map(|span| {
            Span::styled(
                span.text().to_string(),
                style::style_for_inline(line_style, span.style(), light_bg),
            )
        })
        .collect()
}

/// Split spans so every occurrence of `query` gets the highlight style.
///
/// Matches on the current line get the search color; other matches are reversed.
fn highlight_spans(spans: &[Span<'_>], query: &str, current: bool) -> Vec<Span<'static>> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let text = span.content.as_ref();
        let mut cursor = 0;
        for range in match_ranges(text, query) {
            if range.start > cursor {
                out.push(Span::styled(text[cursor..range.start].to_string(), span.style));
            }
            let style = if current {
                style::search_highlight(span.style)
            } else {
                span.style.add_modifier(Modifier::BOLD | Modifier::REVERSED)
            };
            out.push(Span::styled(text[range.clone()].to_string(), style));
            cursor = range.end;
        }
        if cursor < text.len() {
            out.push(Span::styled(text[cursor..].to_string(), span.style));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_content_width_subtracts_padding() {
        assert_eq!(document_content_width(80, false), 78);
        assert!(document_content_width(80, true) < 78);
        assert_eq!(document_content_width(1, false), 1);
    }

    #[test]
    fn test_highlight_spans_splits_matches() {
        let spans = vec![Span::raw("one Two three two")];
        let out = highlight_spans(&spans, "two", true);
        let texts: Vec<&str> = out.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(texts, vec!["one ", "Two", " three ", "two"]);
        assert_eq!(out[1].style.bg, Some(Color::Yellow));
        assert_eq!(out[0].style.bg, None);
    }

    #[test]
    fn test_highlight_spans_other_matches_are_reversed() {
        let spans = vec![Span::raw("abc")];
        let out = highlight_spans(&spans, "b", false);
        assert!(out[1].style.add_modifier.contains(Modifier::REVERSED));
    }
}
