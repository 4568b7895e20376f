//! Theming and color definitions.
//!
//! Uses ANSI colors that adapt to the terminal's palette, with indexed
//! alternatives that stay readable on light backgrounds.

use ratatui::style::{Color, Modifier, Style};

use crate::document::{InlineColor, InlineStyle, LineType};

/// Get the style for a given line type.
pub fn style_for_line_type(line_type: LineType, light_bg: bool) -> Style {
    let pick = |light: u8, dark: Color| if light_bg { Color::Indexed(light) } else { dark };
    match line_type {
        // Headings - bold with distinct colors per level
        LineType::Heading(1) => Style::default()
            .fg(pick(24, Color::Cyan))
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        LineType::Heading(2) => Style::default()
            .fg(pick(22, Color::Green))
            .add_modifier(Modifier::BOLD),
        LineType::Heading(3) => Style::default()
            .fg(pick(58, Color::Yellow))
            .add_modifier(Modifier::BOLD),
        LineType::Heading(4) => Style::default()
            .fg(pick(24, Color::Blue))
            .add_modifier(Modifier::BOLD),
        LineType::Heading(5) => Style::default()
            .fg(pick(54, Color::Magenta))
            .add_modifier(Modifier::BOLD),
        LineType::Heading(_) => Style::default()
            .fg(pick(24, Color::Cyan))
            .add_modifier(Modifier::BOLD),

        LineType::CodeBlock => Style::default().fg(pick(238, Color::Indexed(245))),

        LineType::BlockQuote(_) => Style::default()
            .fg(pick(24, Color::Blue))
            .add_modifier(Modifier::ITALIC),

        LineType::HorizontalRule => Style::default()
            .fg(pick(241, Color::Indexed(240)))
            .add_modifier(Modifier::DIM),

        // Placeholders stand out until the image arrives
        LineType::Image => Style::default()
            .fg(pick(90, Color::Magenta))
            .add_modifier(Modifier::ITALIC),

        LineType::ListItem { .. } | LineType::Table | LineType::Paragraph | LineType::Empty => {
            Style::default()
        }
    }
}

/// Get the style for an inline span, merged with a base line style.
pub fn style_for_inline(base: Style, inline: InlineStyle, light_bg: bool) -> Style {
    let mut style = base;

    if let Some(fg) = inline.fg {
        style = style
            .fg(color_for_terminal(fg))
            .remove_modifier(Modifier::DIM);
    }
    if let Some(bg) = inline.bg {
        style = style.bg(color_for_terminal(bg));
    }

    if inline.emphasis {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if inline.strong {
        style = style.add_modifier(Modifier::BOLD);
    }
    if inline.strikethrough {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    if inline.marker {
        style = style
            .fg(if light_bg {
                Color::Indexed(241)
            } else {
                Color::Yellow
            })
            .remove_modifier(Modifier::ITALIC | Modifier::UNDERLINED);
    }
    if inline.link {
        style = style.add_modifier(Modifier::UNDERLINED);
        if inline.fg.is_none() {
            style = style.fg(if light_bg {
                Color::Blue
            } else {
                Color::LightBlue
            });
        }
    }
    if inline.code && inline.fg.is_none() {
        style = style
            .fg(if light_bg {
                Color::Indexed(88)
            } else {
                Color::Red
            })
            .add_modifier(Modifier::BOLD);
    }

    style
}

/// Style for the current search match highlight.
pub fn search_highlight(base: Style) -> Style {
    base.bg(Color::Yellow).fg(Color::Black)
}

fn color_for_terminal(color: InlineColor) -> Color {
    if crate::image::supports_truecolor_terminal() {
        Color::Rgb(color.r, color.g, color.b)
    } else {
        Color::Indexed(crate::image::rgb_to_xterm_256(color.r, color.g, color.b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ListMarker;

    #[test]
    fn test_heading_styles_are_bold() {
        for level in 1..=6 {
            let style = style_for_line_type(LineType::Heading(level), false);
            assert!(style.add_modifier.contains(Modifier::BOLD), "level {level}");
        }
    }

    #[test]
    fn test_light_background_uses_indexed_colors() {
        let style = style_for_line_type(LineType::Heading(2), true);
        assert_eq!(style.fg, Some(Color::Indexed(22)));
        let style = style_for_line_type(LineType::Heading(2), false);
        assert_eq!(style.fg, Some(Color::Green));
    }

    #[test]
    fn test_plain_lines_have_default_style() {
        let item = LineType::ListItem {
            depth: 1,
            marker: ListMarker::Bullet,
        };
        assert_eq!(style_for_line_type(item, false), Style::default());
        assert_eq!(style_for_line_type(LineType::Paragraph, true), Style::default());
    }

    #[test]
    fn test_inline_flags_add_modifiers() {
        let inline = InlineStyle {
            emphasis: true,
            strong: true,
            strikethrough: true,
            ..InlineStyle::default()
        };
        let style = style_for_inline(Style::default(), inline, false);
        assert!(style.add_modifier.contains(Modifier::ITALIC));
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert!(style.add_modifier.contains(Modifier::CROSSED_OUT));
    }

    #[test]
    fn test_link_gets_underline_and_color() {
        let inline = InlineStyle {
            link: true,
            ..InlineStyle::default()
        };
        let style = style_for_inline(Style::default(), inline, false);
        assert!(style.add_modifier.contains(Modifier::UNDERLINED));
        assert_eq!(style.fg, Some(Color::LightBlue));
    }

    #[test]
    fn test_inline_code_keeps_highlighter_color() {
        let inline = InlineStyle {
            code: true,
            fg: Some(InlineColor { r: 1, g: 2, b: 3 }),
            ..InlineStyle::default()
        };
        let style = style_for_inline(Style::default(), inline, false);
        assert_ne!(style.fg, Some(Color::Red));
    }
}
