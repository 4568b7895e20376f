//! Syntax highlighting for code blocks.
//!
//! The layout engine only sees the [`Highlighter`] trait. The production
//! implementation is backed by syntect with Sublime Text syntax definitions.

use std::path::Path;
use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::document::{InlineColor, InlineSpan, InlineStyle};

/// Produces styled spans for a code block.
pub trait Highlighter: Send + Sync {
    /// Highlight `code`, returning one span list per line.
    ///
    /// `None` means the language is unknown or highlighting failed; callers
    /// fall back to plain text.
    fn highlight(&self, language: Option<&str>, code: &str) -> Option<Vec<Vec<InlineSpan>>>;
}

/// Highlighter that never colors anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, _language: Option<&str>, _code: &str) -> Option<Vec<Vec<InlineSpan>>> {
        None
    }
}

/// Terminal background brightness, used to pick a readable theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightBackground {
    Light,
    #[default]
    Dark,
}

impl HighlightBackground {
    /// Guess the background from the `COLORFGBG` convention (`fg;bg`).
    pub fn from_colorfgbg(colorfgbg: Option<&str>) -> Self {
        let Some(value) = colorfgbg else {
            return Self::Dark;
        };
        let bg_str = value.rsplit(';').next().unwrap_or(value);
        match bg_str.parse::<u8>() {
            Ok(bg) if bg >= 7 => Self::Light,
            _ => Self::Dark,
        }
    }

    /// Detect from the environment.
    pub fn detect() -> Self {
        Self::from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
    }

    pub const fn is_light(self) -> bool {
        matches!(self, Self::Light)
    }
}

/// syntect-backed highlighter for a fixed background.
#[derive(Debug, Clone, Copy)]
pub struct SyntectHighlighter {
    background: HighlightBackground,
}

impl SyntectHighlighter {
    pub const fn new(background: HighlightBackground) -> Self {
        Self { background }
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, language: Option<&str>, code: &str) -> Option<Vec<Vec<InlineSpan>>> {
        let syntax_set = syntax_set();
        let lang = language.filter(|l| !l.is_empty())?;
        let syntax = syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| syntax_set.find_syntax_by_name(lang))?;

        let mut highlighter = HighlightLines::new(syntax, theme_for(self.background));
        let mut lines = Vec::new();
        for line in code.lines() {
            let ranges = highlighter.highlight_line(line, syntax_set).ok()?;
            let spans = ranges
                .into_iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(style, text)| {
                    let fg = InlineColor {
                        r: style.foreground.r,
                        g: style.foreground.g,
                        b: style.foreground.b,
                    };
                    InlineSpan::new(
                        text,
                        InlineStyle {
                            code: true,
                            fg: Some(adjust_fg_for_background(fg, self.background)),
                            ..InlineStyle::default()
                        },
                    )
                })
                .collect();
            lines.push(spans);
        }
        Some(lines)
    }
}

/// Name of the syntax that handles files with this extension, if any.
pub fn language_for_file(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if matches!(ext.to_ascii_lowercase().as_str(), "md" | "markdown" | "txt") {
        return None;
    }
    syntax_set()
        .find_syntax_by_extension(ext)
        .map(|syntax| syntax.name.clone())
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme_for(background: HighlightBackground) -> &'static Theme {
    static DARK: OnceLock<Theme> = OnceLock::new();
    static LIGHT: OnceLock<Theme> = OnceLock::new();
    let (cell, preferred): (&OnceLock<Theme>, &[&str]) = match background {
        HighlightBackground::Dark => (
            &DARK,
            &[
                "Monokai Extended",
                "Monokai Extended Bright",
                "Solarized (dark)",
                "base16-ocean.dark",
            ],
        ),
        HighlightBackground::Light => (
            &LIGHT,
            &["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
        ),
    };
    cell.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        preferred
            .iter()
            .find_map(|name| theme_set.themes.get(*name).cloned())
            .or_else(|| theme_set.themes.values().next().cloned())
            .unwrap_or_default()
    })
}

fn adjust_fg_for_background(color: InlineColor, background: HighlightBackground) -> InlineColor {
    match background {
        HighlightBackground::Dark => color,
        HighlightBackground::Light => {
            if luma(color) < 155.0 {
                return color;
            }
            // Channels are scaled down from u8, so the result fits.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let darken = |c: u8| (f32::from(c) * 0.42).round() as u8;
            InlineColor {
                r: darken(color.r),
                g: darken(color.g),
                b: darken(color.b),
            }
        }
    }
}

fn luma(color: InlineColor) -> f32 {
    0.0722f32.mul_add(
        f32::from(color.b),
        0.2126f32.mul_add(f32::from(color.r), 0.7152 * f32::from(color.g)),
    )
}
