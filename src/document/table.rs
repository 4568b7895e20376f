//! Fixed-grid table layout.
//!
//! Column widths start at the widest cell in each column. When the grid does
//! not fit, the widest column gives up one column at a time until it does, so
//! the result depends only on the cell contents and the available width.

use super::types::{InlineSpan, InlineStyle, LineType, RenderedLine};
use super::wrap::{display_width, push_merged, truncate_spans};

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// One table cell: styled inline content on a single row.
pub(crate) type Cell = Vec<InlineSpan>;

const MIN_COLUMN_WIDTH: usize = 3;

/// Lay out `rows` (the first is the header) into bordered lines no wider than `width`.
pub(crate) fn layout_table(rows: &[Vec<Cell>], aligns: &[Align], width: usize) -> Vec<RenderedLine> {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    if cols == 0 {
        return Vec::new();
    }
    let mut widths = vec![0usize; cols];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell_width(cell));
        }
    }
    for w in &mut widths {
        *w = (*w).max(MIN_COLUMN_WIDTH);
    }
    fit_widths(&mut widths, width);

    let border = InlineStyle::marker();
    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(border_line(&widths, '┌', '┬', '┐', border, width));
    for (idx, row) in rows.iter().enumerate() {
        lines.push(row_line(row, &widths, aligns, idx == 0, width));
        if idx == 0 && rows.len() > 1 {
            lines.push(border_line(&widths, '├', '┼', '┤', border, width));
        }
    }
    lines.push(border_line(&widths, '└', '┴', '┘', border, width));
    lines
}

/// Total rendered width: `│ cell │ cell │` is one bar plus three columns per cell.
fn grid_width(widths: &[usize]) -> usize {
    1 + widths.iter().sum::<usize>() + 3 * widths.len()
}

fn fit_widths(widths: &mut [usize], available: usize) {
    while grid_width(widths) > available {
        let Some((idx, &widest)) = widths
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        else {
            return;
        };
        if widest <= 1 {
            return;
        }
        widths[idx] -= 1;
    }
}

fn cell_width(cell: &Cell) -> usize {
    cell.iter().map(|s| display_width(s.text())).sum()
}

fn border_line(
    widths: &[usize],
    left: char,
    mid: char,
    right: char,
    style: InlineStyle,
    width: usize,
) -> RenderedLine {
    let mut text = String::new();
    text.push(left);
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            text.push(mid);
        }
        text.push_str(&"─".repeat(w + 2));
    }
    text.push(right);
    let spans = truncate_spans(&[InlineSpan::new(text, style)], width);
    RenderedLine::with_spans(spans, LineType::Table)
}

fn row_line(row: &[Cell], widths: &[usize], aligns: &[Align], header: bool, width: usize) -> RenderedLine {
    let border = InlineStyle::marker();
    let mut spans = Vec::new();
    push_merged(&mut spans, "│", border);
    for (i, w) in widths.iter().enumerate() {
        let empty = Vec::new();
        let cell = row.get(i).unwrap_or(&empty);
        let mut content = truncate_spans(cell, *w);
        if header {
            content = content
                .into_iter()
                .map(|s| {
                    let style = InlineStyle {
                        strong: true,
                        ..s.style()
                    };
                    InlineSpan::new(s.text(), style)
                })
                .collect();
        }
        let pad = w.saturating_sub(cell_width(&content));
        let (before, after) = match aligns.get(i).copied().unwrap_or_default() {
            Align::Left => (0, pad),
            Align::Right => (pad, 0),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        push_merged(&mut spans, &" ".repeat(before + 1), InlineStyle::default());
        for span in content {
            push_merged(&mut spans, span.text(), span.style());
        }
        push_merged(&mut spans, &" ".repeat(after + 1), InlineStyle::default());
        push_merged(&mut spans, "│", border);
    }
    RenderedLine::with_spans(truncate_spans(&spans, width), LineType::Table)
}
