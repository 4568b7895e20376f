//! Greedy word wrapping over styled spans.
//!
//! Widths are measured in terminal columns, so wide glyphs count double.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::types::{InlineSpan, InlineStyle};

/// One output row of [`wrap_spans`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WrappedLine {
    pub spans: Vec<InlineSpan>,
    /// Character offset, within the input, of the first character placed on this row.
    pub start: usize,
}

enum Token {
    Space { text: String, style: InlineStyle, start: usize },
    Word { parts: Vec<(String, InlineStyle)>, start: usize },
    Break,
}

/// Display width of a string in terminal columns.
pub fn display_width(text: &str) -> usize {
    text.width()
}

/// Wrap spans to `width` columns.
///
/// Words never split unless a single word is wider than the whole line, in
/// which case it is broken at character boundaries. A `\n` inside span text
/// forces a line break. Whitespace at the start or end of a row is dropped.
pub(crate) fn wrap_spans(spans: &[InlineSpan], width: usize) -> Vec<WrappedLine> {
    let width = width.max(1);
    let mut out = Vec::new();
    let mut row = Row::default();

    for token in tokenize(spans) {
        match token {
            Token::Break => {
                row.flush_into(&mut out);
            }
            Token::Space { text, style, start } => {
                if row.width == 0 {
                    continue;
                }
                let w = text.width();
                if row.width + w > width {
                    row.flush_into(&mut out);
                } else {
                    row.push(&text, style, start);
                    row.width += w;
                }
            }
            Token::Word { parts, start } => {
                let w: usize = parts.iter().map(|(t, _)| t.width()).sum();
                if row.width + w <= width {
                    let mut offset = start;
                    for (text, style) in &parts {
                        row.push(text, *style, offset);
                        offset += text.chars().count();
                    }
                    row.width += w;
                    continue;
                }
                if row.width > 0 {
                    row.flush_into(&mut out);
                }
                if w <= width {
                    let mut offset = start;
                    for (text, style) in &parts {
                        row.push(text, *style, offset);
                        offset += text.chars().count();
                    }
                    row.width = w;
                    continue;
                }
                let mut offset = start;
                for (text, style) in &parts {
                    for ch in text.chars() {
                        let cw = ch.width().unwrap_or(0);
                        if row.width + cw > width && row.width > 0 {
                            row.flush_into(&mut out);
                        }
                        let mut buf = [0u8; 4];
                        row.push(ch.encode_utf8(&mut buf), *style, offset);
                        row.width += cw;
                        offset += 1;
                    }
                }
            }
        }
    }
    row.flush_into(&mut out);
    out
}

#[derive(Default)]
struct Row {
    spans: Vec<InlineSpan>,
    width: usize,
    start: Option<usize>,
}

impl Row {
    fn push(&mut self, text: &str, style: InlineStyle, offset: usize) {
        if text.is_empty() {
            return;
        }
        self.start.get_or_insert(offset);
        push_merged(&mut self.spans, text, style);
    }

    fn flush_into(&mut self, out: &mut Vec<WrappedLine>) {
        let mut spans = std::mem::take(&mut self.spans);
        trim_trailing_whitespace(&mut spans);
        let start = self.start.take().unwrap_or_default();
        self.width = 0;
        if !spans.is_empty() {
            out.push(WrappedLine { spans, start });
        }
    }
}

/// Append text, merging into the previous span when the style matches.
pub(crate) fn push_merged(spans: &mut Vec<InlineSpan>, text: &str, style: InlineStyle) {
    if let Some(last) = spans.last_mut()
        && last.style() == style
    {
        *last = InlineSpan::new(format!("{}{text}", last.text()), style);
        return;
    }
    spans.push(InlineSpan::new(text, style));
}

fn trim_trailing_whitespace(spans: &mut Vec<InlineSpan>) {
    while let Some(last) = spans.last() {
        let trimmed = last.text().trim_end();
        if trimmed.is_empty() {
            spans.pop();
        } else {
            if trimmed.len() != last.text().len() {
                let style = last.style();
                let trimmed = trimmed.to_string();
                spans.pop();
                spans.push(InlineSpan::new(trimmed, style));
            }
            break;
        }
    }
}

fn tokenize(spans: &[InlineSpan]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word: Vec<(String, InlineStyle)> = Vec::new();
    let mut word_start = 0usize;
    let mut offset = 0usize;

    let finish_word =
        |word: &mut Vec<(String, InlineStyle)>, tokens: &mut Vec<Token>, start: usize| {
            if !word.is_empty() {
                tokens.push(Token::Word {
                    parts: std::mem::take(word),
                    start,
                });
            }
        };

    for span in spans {
        let style = span.style();
        for ch in span.text().chars() {
            if ch == '\n' {
                finish_word(&mut word, &mut tokens, word_start);
                tokens.push(Token::Break);
            } else if ch.is_whitespace() {
                finish_word(&mut word, &mut tokens, word_start);
                let ch = if ch == '\t' { ' ' } else { ch };
                match tokens.last_mut() {
                    Some(Token::Space { text, style: s, .. }) if *s == style => text.push(ch),
                    _ => tokens.push(Token::Space {
                        text: ch.to_string(),
                        style,
                        start: offset,
                    }),
                }
            } else {
                if word.is_empty() {
                    word_start = offset;
                }
                match word.last_mut() {
                    Some((text, s)) if *s == style => text.push(ch),
                    _ => word.push((ch.to_string(), style)),
                }
            }
            offset += 1;
        }
    }
    finish_word(&mut word, &mut tokens, word_start);
    tokens
}

/// Cut spans down to `width` columns, ending with `…` when anything was dropped.
pub(crate) fn truncate_spans(spans: &[InlineSpan], width: usize) -> Vec<InlineSpan> {
    let total: usize = spans.iter().map(|s| s.text().width()).sum();
    if total <= width {
        return spans.to_vec();
    }
    if width == 0 {
        return Vec::new();
    }
    let budget = width - 1;
    let mut used = 0usize;
    let mut out = Vec::new();
    let mut last_style = InlineStyle::default();
    'outer: for span in spans {
        last_style = span.style();
        let mut text = String::new();
        for ch in span.text().chars() {
            let cw = ch.width().unwrap_or(0);
            if used + cw > budget {
                if !text.is_empty() {
                    out.push(InlineSpan::new(text, span.style()));
                }
                break 'outer;
            }
            used += cw;
            text.push(ch);
        }
        if !text.is_empty() {
            out.push(InlineSpan::new(text, span.style()));
        }
    }
    push_merged(&mut out, "…", last_style);
    out
}

/// Cut a plain string down to `width` columns without an ellipsis.
pub(crate) fn clip_str(text: &str, width: usize) -> String {
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let cw = ch.width().unwrap_or(0);
        if used + cw > width {
            break;
        }
        used += cw;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Vec<InlineSpan> {
        vec![InlineSpan::new(text, InlineStyle::default())]
    }

    fn row_text(line: &WrappedLine) -> String {
        line.spans.iter().map(InlineSpan::text).collect()
    }

    #[test]
    fn test_wrap_breaks_between_words() {
        let rows = wrap_spans(&plain("the quick brown fox"), 10);
        let texts: Vec<_> = rows.iter().map(row_text).collect();
        assert_eq!(texts, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_hard_breaks_overlong_word() {
        let rows = wrap_spans(&plain("abcdefghijklmnop xy"), 5);
        let texts: Vec<_> = rows.iter().map(row_text).collect();
        assert_eq!(texts, vec!["abcde", "fghij", "klmno", "p xy"]);
    }

    #[test]
    fn test_wrap_respects_forced_breaks() {
        let rows = wrap_spans(&plain("one\ntwo"), 40);
        let texts: Vec<_> = rows.iter().map(row_text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_wrap_keeps_styled_word_together() {
        let bold = InlineStyle {
            strong: true,
            ..InlineStyle::default()
        };
        let spans = vec![
            InlineSpan::new("aaaa ", InlineStyle::default()),
            InlineSpan::new("bb", bold),
            InlineSpan::new("cc", InlineStyle::default()),
        ];
        let rows = wrap_spans(&spans, 6);
        let texts: Vec<_> = rows.iter().map(row_text).collect();
        assert_eq!(texts, vec!["aaaa", "bbcc"]);
        assert_eq!(rows[1].spans.len(), 2);
    }

    #[test]
    fn test_wrap_counts_wide_glyphs_as_two_columns() {
        let rows = wrap_spans(&plain("日本語 日本語"), 6);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row_text(row).width() <= 6);
        }
    }

    #[test]
    fn test_wrap_tracks_row_start_offsets() {
        let rows = wrap_spans(&plain("aaa bbb ccc"), 3);
        let starts: Vec<_> = rows.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 4, 8]);
    }

    #[test]
    fn test_truncate_spans_adds_ellipsis() {
        let out = truncate_spans(&plain("abcdefgh"), 5);
        let text: String = out.iter().map(InlineSpan::text).collect();
        assert_eq!(text, "abcd…");
    }

    #[test]
    fn test_truncate_spans_leaves_short_text() {
        let out = truncate_spans(&plain("abc"), 5);
        assert_eq!(out, plain("abc"));
    }
}
