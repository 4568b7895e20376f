//! Thin adapter over comrak.
//!
//! Parses CommonMark plus the GFM extensions the viewer renders and keeps a
//! line-start table so node positions can be turned into byte ranges.

use std::ops::Range;

use comrak::nodes::AstNode;
use comrak::{Arena, Options, parse_document};

/// A parsed document borrowed from a comrak arena.
pub struct Ast<'a> {
    root: &'a AstNode<'a>,
    line_starts: Vec<usize>,
    source_len: usize,
}

impl<'a> Ast<'a> {
    /// The document node.
    pub const fn root(&self) -> &'a AstNode<'a> {
        self.root
    }

    /// Byte range of `node` in the source, if comrak recorded a position.
    pub fn byte_range(&self, node: &AstNode<'_>) -> Option<Range<usize>> {
        let pos = node.data.borrow().sourcepos;
        let start = self.offset(pos.start.line, pos.start.column)?;
        // End columns are inclusive.
        let end = self
            .offset(pos.end.line, pos.end.column)
            .map_or(self.source_len, |e| (e + 1).min(self.source_len));
        (start < end).then_some(start..end)
    }

    fn offset(&self, line: usize, column: usize) -> Option<usize> {
        if line == 0 || column == 0 {
            return None;
        }
        let line_start = *self.line_starts.get(line - 1)?;
        Some((line_start + column - 1).min(self.source_len))
    }
}

/// Parse markdown source into an AST allocated in `arena`.
///
/// comrak never rejects input; malformed constructs degrade to text.
pub fn parse<'a>(arena: &'a Arena<AstNode<'a>>, source: &str) -> Ast<'a> {
    let _scope = crate::perf::scope("document.parse");
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.extension.superscript = true;

    let root = parse_document(arena, source, &options);
    let line_starts = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    Ast {
        root,
        line_starts,
        source_len: source.len(),
    }
}
