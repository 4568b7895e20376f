//! Core document types.

use std::ops::Range;

use unicode_width::UnicodeWidthStr;

use crate::image::ImageSource;

/// A laid-out markdown document: wrapped lines plus side indices.
///
/// Immutable once built. A resize or reload produces a new document
/// rather than patching this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    lines: Vec<RenderedLine>,
    headings: Vec<HeadingRef>,
    images: Vec<ImageRef>,
    links: Vec<LinkRef>,
    footnotes: Vec<FootnoteRef>,
}

impl RenderedDocument {
    /// Create an empty document.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a document from layout output.
    ///
    /// Index entries that point past the last line are dropped so every
    /// stored line number is valid.
    pub(crate) fn from_parts(
        lines: Vec<RenderedLine>,
        mut headings: Vec<HeadingRef>,
        mut images: Vec<ImageRef>,
        mut links: Vec<LinkRef>,
        mut footnotes: Vec<FootnoteRef>,
    ) -> Self {
        let total = lines.len();
        if headings.iter().any(|h| h.line >= total) {
            // Parent indices are positional, so rebuild them after dropping.
            headings.retain(|h| h.line < total);
            assign_heading_parents(&mut headings);
        }
        images.retain(|img| img.line_range.start < total);
        for img in &mut images {
            img.line_range.end = img.line_range.end.min(total);
        }
        links.retain(|l| l.line < total);
        footnotes.retain(|f| f.line < total);
        Self {
            lines,
            headings,
            images,
            links,
            footnotes,
        }
    }

    /// Get the total number of rendered lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// All rendered lines in order.
    pub fn lines(&self) -> &[RenderedLine] {
        &self.lines
    }

    /// Get the headings for the table of contents.
    pub fn headings(&self) -> &[HeadingRef] {
        &self.headings
    }

    /// Get image references.
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// Get link references.
    pub fn links(&self) -> &[LinkRef] {
        &self.links
    }

    /// Get footnote definitions.
    pub fn footnotes(&self) -> &[FootnoteRef] {
        &self.footnotes
    }

    /// Line of the footnote definition with the given label.
    pub fn footnote_line(&self, label: &str) -> Option<usize> {
        self.footnotes
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.line)
    }

    /// Resolve an in-document `#anchor` to a heading line.
    pub fn resolve_internal_anchor(&self, anchor: &str) -> Option<usize> {
        let target = anchor.trim().trim_start_matches('#');
        if target.is_empty() {
            return None;
        }
        if let Some(label) = target.strip_prefix("fn-") {
            return self.footnote_line(label);
        }
        let normalized = slugify(target);
        self.headings
            .iter()
            .find(|h| h.id.as_deref() == Some(target) || slugify(&h.text) == normalized)
            .map(|h| h.line)
    }

    /// Lines from `offset` to `offset + count`, clipped to the document.
    pub fn visible_lines(&self, offset: usize, count: usize) -> &[RenderedLine] {
        let start = offset.min(self.lines.len());
        let end = offset.saturating_add(count).min(self.lines.len());
        &self.lines[start..end]
    }

    /// Get a specific rendered line by index.
    pub fn line_at(&self, index: usize) -> Option<&RenderedLine> {
        self.lines.get(index)
    }

    /// Index of the last heading at or above `line`.
    pub fn heading_at_or_before(&self, line: usize) -> Option<usize> {
        let idx = self.headings.partition_point(|h| h.line <= line);
        idx.checked_sub(1)
    }

    /// First line after the section that starts at heading `index`.
    ///
    /// A section ends at the next heading of any level.
    pub fn section_end(&self, index: usize) -> usize {
        self.headings
            .get(index + 1)
            .map_or(self.lines.len(), |next| next.line)
    }
}

/// Compute each heading's parent as the nearest preceding heading of a lower level.
pub(crate) fn assign_heading_parents(headings: &mut [HeadingRef]) {
    let mut stack: Vec<usize> = Vec::new();
    for idx in 0..headings.len() {
        let level = headings[idx].level;
        while stack.last().is_some_and(|&top| headings[top].level >= level) {
            stack.pop();
        }
        headings[idx].parent = stack.last().copied();
        stack.push(idx);
    }
}

/// GitHub-style heading slug: lowercase alphanumerics joined by single dashes.
pub fn slugify(text: &str) -> String {
    let mut out = String::new();
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else if ch == '-' || ch.is_whitespace() {
            pending_dash = true;
        }
    }
    out
}

/// A single rendered line for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    spans: Vec<InlineSpan>,
    line_type: LineType,
    source_range: Option<Range<usize>>,
}

impl RenderedLine {
    /// Create a line holding one unstyled span.
    pub fn new(content: impl Into<String>, line_type: LineType) -> Self {
        let content = content.into();
        let spans = if content.is_empty() {
            Vec::new()
        } else {
            vec![InlineSpan::new(content, InlineStyle::default())]
        };
        Self {
            spans,
            line_type,
            source_range: None,
        }
    }

    /// Create a blank separator line.
    pub fn empty() -> Self {
        Self::new(String::new(), LineType::Empty)
    }

    /// Create a line from styled spans.
    pub fn with_spans(spans: Vec<InlineSpan>, line_type: LineType) -> Self {
        Self {
            spans,
            line_type,
            source_range: None,
        }
    }

    /// Attach the byte range of source text this line was produced from.
    #[must_use]
    pub fn with_source_range(mut self, range: Option<Range<usize>>) -> Self {
        self.source_range = range;
        self
    }

    pub fn spans(&self) -> &[InlineSpan] {
        &self.spans
    }

    pub const fn line_type(&self) -> LineType {
        self.line_type
    }

    pub fn source_range(&self) -> Option<&Range<usize>> {
        self.source_range.as_ref()
    }

    /// Concatenated plain text of all spans.
    pub fn text(&self) -> String {
        self.spans.iter().map(InlineSpan::text).collect()
    }

    /// Visible width in terminal columns.
    pub fn display_width(&self) -> usize {
        self.spans.iter().map(|s| s.text.width()).sum()
    }

    pub(crate) fn set_line_type(&mut self, line_type: LineType) {
        self.line_type = line_type;
    }

    pub(crate) fn prepend(&mut self, span: InlineSpan) {
        if !span.text.is_empty() {
            self.spans.insert(0, span);
        }
    }
}

/// Inline style flags for a span of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub emphasis: bool,
    pub strong: bool,
    pub code: bool,
    pub strikethrough: bool,
    pub link: bool,
    /// Structural decoration such as list markers, quote bars and table borders.
    pub marker: bool,
    pub fg: Option<InlineColor>,
    pub bg: Option<InlineColor>,
}

impl InlineStyle {
    /// Style used for decoration emitted by the layout engine.
    pub fn marker() -> Self {
        Self {
            marker: true,
            ..Self::default()
        }
    }
}

/// RGB color for inline spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Inline styled text span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    text: String,
    style: InlineStyle,
}

impl InlineSpan {
    pub fn new(text: impl Into<String>, style: InlineStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn style(&self) -> InlineStyle {
        self.style
    }
}

/// Kind of list marker on a list item line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Bullet,
    Ordered(usize),
}

/// Type of rendered line (for styling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    Paragraph,
    /// Heading level 1-6.
    Heading(u8),
    CodeBlock,
    /// Quote nesting depth, starting at 1.
    BlockQuote(u8),
    /// List nesting depth (starting at 1) and the item's marker.
    ListItem { depth: u8, marker: ListMarker },
    Table,
    HorizontalRule,
    Image,
    Empty,
}

/// Reference to a heading in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRef {
    /// Heading level (1-6)
    pub level: u8,
    /// Heading text with markup stripped
    pub text: String,
    /// Line number in rendered output
    pub line: usize,
    /// Unique anchor slug
    pub id: Option<String>,
    /// Index of the enclosing heading in `headings`
    pub parent: Option<usize>,
}

/// Reference to an image in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Alt text
    pub alt: String,
    /// Raw `src` as written in the markdown
    pub src: String,
    /// Classified source
    pub source: ImageSource,
    /// Byte range of the image syntax in the source
    pub source_range: Option<Range<usize>>,
    /// Rows reserved for the image in rendered output
    pub line_range: Range<usize>,
}

/// Reference to a link in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Link text
    pub text: String,
    /// Link URL
    pub url: String,
    /// Line number in rendered output
    pub line: usize,
}

/// A footnote definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteRef {
    pub label: String,
    /// Line where the definition starts
    pub line: usize,
}
