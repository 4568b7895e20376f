//! Width-dependent layout of a markdown AST into rendered lines.
//!
//! Every block produces a [`Fragment`] whose index entries use line numbers
//! relative to the fragment. Containers lay their children out at a reduced
//! width, prefix each child line, and splice the result into their own
//! fragment, shifting the indices as they go.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use comrak::nodes::{AstNode, ListDelimType, ListType, NodeList, NodeValue, TableAlignment};

use super::parser::Ast;
use super::table::{self, Align, Cell};
use super::types::{
    FootnoteRef, HeadingRef, ImageRef, InlineSpan, InlineStyle, LineType, LinkRef, ListMarker,
    RenderedDocument, RenderedLine, assign_heading_parents, slugify,
};
use super::wrap::{clip_str, display_width, push_merged, truncate_spans, wrap_spans};
use crate::highlight::{Highlighter, PlainHighlighter};
use crate::image::ImageSource;

/// Columns between the left edge and an image caption.
pub const IMAGE_CAPTION_MARGIN: usize = 2;

const QUOTE_PREFIX: &str = "│ ";
const BULLET: &str = "• ";
const TASK_DONE: &str = "✓ ";
const TASK_OPEN: &str = "□ ";

/// How many rows an image occupies, as reported by the image subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    /// Decoded; reserve this many terminal rows.
    Rows(u16),
    /// The image could not be loaded.
    Missing,
}

/// Inputs to layout besides the AST and width.
#[derive(Clone)]
pub struct LayoutContext {
    image_slots: HashMap<String, ImageSlot>,
    highlighter: Arc<dyn Highlighter>,
}

impl LayoutContext {
    pub fn new(highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            image_slots: HashMap::new(),
            highlighter,
        }
    }

    pub fn highlighter(&self) -> &dyn Highlighter {
        self.highlighter.as_ref()
    }

    /// Slot recorded for an image `src`, if any.
    pub fn image_slot(&self, src: &str) -> Option<ImageSlot> {
        self.image_slots.get(src).copied()
    }

    /// Record a slot. Returns true when this changes the layout.
    pub fn set_image_slot(&mut self, src: impl Into<String>, slot: ImageSlot) -> bool {
        self.image_slots.insert(src.into(), slot) != Some(slot)
    }

    /// Drop the slot for `src`. Returns true when one was recorded.
    pub fn remove_image_slot(&mut self, src: &str) -> bool {
        self.image_slots.remove(src).is_some()
    }
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self::new(Arc::new(PlainHighlighter))
    }
}

impl fmt::Debug for LayoutContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutContext")
            .field("image_slots", &self.image_slots.len())
            .finish_non_exhaustive()
    }
}

/// Lay out a parsed document at `width` columns.
///
/// Pure: the same AST, width and context always give the same document.
pub fn layout(ast: &Ast<'_>, width: u16, ctx: &LayoutContext) -> RenderedDocument {
    let _scope = crate::perf::scope("document.layout");
    let width = usize::from(width).max(1);
    let mut engine = Engine {
        ast,
        ctx,
        list_depth: 0,
        quote_depth: 0,
        slug_counts: HashMap::new(),
    };
    let frag = engine.blocks(ast.root(), width, true);
    let Fragment {
        lines,
        mut headings,
        images,
        links,
        footnotes,
    } = frag;
    assign_heading_parents(&mut headings);
    RenderedDocument::from_parts(lines, headings, images, links, footnotes)
}

/// Lines plus index entries numbered from the fragment's first line.
#[derive(Debug, Default)]
struct Fragment {
    lines: Vec<RenderedLine>,
    headings: Vec<HeadingRef>,
    images: Vec<ImageRef>,
    links: Vec<LinkRef>,
    footnotes: Vec<FootnoteRef>,
}

impl Fragment {
    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append `other` below this fragment, optionally separated by a blank line.
    fn append(&mut self, other: Self, gap: bool) {
        if other.is_empty() {
            return;
        }
        if gap && !self.is_empty() {
            self.lines.push(RenderedLine::empty());
        }
        let base = self.lines.len();
        self.lines.extend(other.lines);
        self.headings.extend(other.headings.into_iter().map(|mut h| {
            h.line += base;
            h
        }));
        self.images.extend(other.images.into_iter().map(|mut img| {
            img.line_range = img.line_range.start + base..img.line_range.end + base;
            img
        }));
        self.links.extend(other.links.into_iter().map(|mut l| {
            l.line += base;
            l
        }));
        self.footnotes.extend(other.footnotes.into_iter().map(|mut f| {
            f.line += base;
            f
        }));
    }

    /// Prefix the first line with `first` and every other line with `rest`.
    fn indent(&mut self, first: &str, rest: &str) {
        for (i, line) in self.lines.iter_mut().enumerate() {
            let prefix = if i == 0 { first } else { rest };
            line.prepend(InlineSpan::new(prefix, InlineStyle::marker()));
        }
    }

    fn retag(&mut self, from: impl Fn(LineType) -> bool, to: LineType) {
        for line in &mut self.lines {
            if from(line.line_type()) {
                line.set_line_type(to);
            }
        }
    }
}

/// Nesting depth as stored on a line; very deep nesting saturates.
fn depth_tag(depth: usize) -> u8 {
    u8::try_from(depth).unwrap_or(u8::MAX)
}

/// Fit a prefix into `width`, returning the prefix actually used and the
/// width left for content (always at least one column).
fn gutter(prefix: &str, width: usize) -> (String, usize) {
    let pw = display_width(prefix);
    if pw < width {
        return (prefix.to_string(), width - pw);
    }
    let clipped = clip_str(prefix, width.saturating_sub(1));
    let cw = display_width(&clipped);
    (clipped, width.saturating_sub(cw).max(1))
}

struct PendingLink {
    text: String,
    url: String,
    /// Character offset into the collected inline text.
    start: usize,
}

struct Engine<'x, 'a> {
    ast: &'x Ast<'a>,
    ctx: &'x LayoutContext,
    list_depth: usize,
    quote_depth: usize,
    slug_counts: HashMap<String, usize>,
}

impl<'a> Engine<'_, 'a> {
    fn blocks(&mut self, node: &'a AstNode<'a>, width: usize, gap: bool) -> Fragment {
        let mut frag = Fragment::default();
        for child in node.children() {
            let block = self.block(child, width);
            frag.append(block, gap);
        }
        frag
    }

    fn block(&mut self, node: &'a AstNode<'a>, width: usize) -> Fragment {
        let range = self.ast.byte_range(node);
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Paragraph => self.paragraph(node, width, range),
            NodeValue::Heading(heading) => self.heading(node, heading.level, width, range),
            NodeValue::CodeBlock(code) => {
                let language = code.info.split_whitespace().next();
                self.code_block(language, &code.literal, range)
            }
            NodeValue::List(list) => self.list(node, list, width),
            NodeValue::BlockQuote => self.blockquote(node, width),
            NodeValue::Table(table) => {
                let aligns: Vec<Align> = table
                    .alignments
                    .iter()
                    .map(|a| match a {
                        TableAlignment::Center => Align::Center,
                        TableAlignment::Right => Align::Right,
                        _ => Align::Left,
                    })
                    .collect();
                self.table(node, &aligns, width, range)
            }
            NodeValue::ThematicBreak => {
                let mut frag = Fragment::default();
                frag.lines.push(
                    RenderedLine::with_spans(
                        vec![InlineSpan::new("─".repeat(width), InlineStyle::marker())],
                        LineType::HorizontalRule,
                    )
                    .with_source_range(range),
                );
                frag
            }
            NodeValue::FootnoteDefinition(def) => self.footnote(node, &def.name, width),
            NodeValue::HtmlBlock(html) => self.plain_lines(&html.literal, width, range),
            NodeValue::Item(_) | NodeValue::TaskItem(_) => self.blocks(node, width, true),
            // Inline nodes never appear at block level in a well-formed tree.
            NodeValue::Text(_)
            | NodeValue::Code(_)
            | NodeValue::SoftBreak
            | NodeValue::LineBreak
            | NodeValue::HtmlInline(_)
            | NodeValue::Link(_)
            | NodeValue::Image(_)
            | NodeValue::Emph
            | NodeValue::Strong
            | NodeValue::Strikethrough => Fragment::default(),
            _ => self.blocks(node, width, true),
        }
    }

    fn paragraph(&mut self, node: &'a AstNode<'a>, width: usize, range: Option<Range<usize>>) -> Fragment {
        let mut frag = Fragment::default();
        let mut run: Vec<&'a AstNode<'a>> = Vec::new();
        for child in node.children() {
            if let Some((image, link)) = hoistable_image(child) {
                let text = self.inline_run(&run, width, range.clone());
                frag.append(text, true);
                run.clear();
                let block = self.image_block(image, link, width);
                frag.append(block, true);
            } else {
                run.push(child);
            }
        }
        let text = self.inline_run(&run, width, range);
        frag.append(text, true);
        frag
    }

    fn inline_run(
        &self,
        nodes: &[&'a AstNode<'a>],
        width: usize,
        range: Option<Range<usize>>,
    ) -> Fragment {
        let mut spans = Vec::new();
        let mut links = Vec::new();
        for node in nodes {
            collect_inline(node, InlineStyle::default(), &mut spans, &mut links);
        }
        let mut frag = Fragment::default();
        if spans.iter().all(|s| s.text().trim().is_empty()) {
            return frag;
        }
        let rows = wrap_spans(&spans, width);
        for row in &rows {
            frag.lines.push(
                RenderedLine::with_spans(row.spans.clone(), LineType::Paragraph)
                    .with_source_range(range.clone()),
            );
        }
        for link in links {
            let line = rows
                .partition_point(|r| r.start <= link.start)
                .saturating_sub(1);
            frag.links.push(LinkRef {
                text: link.text,
                url: link.url,
                line,
            });
        }
        frag
    }

    fn heading(
        &mut self,
        node: &'a AstNode<'a>,
        level: u8,
        width: usize,
        range: Option<Range<usize>>,
    ) -> Fragment {
        let level = level.clamp(1, 6);
        let text = plain_text(node);
        let mut spans = vec![InlineSpan::new(
            format!("{} ", "#".repeat(usize::from(level))),
            InlineStyle::marker(),
        )];
        let mut links = Vec::new();
        for child in node.children() {
            collect_inline(child, InlineStyle::default(), &mut spans, &mut links);
        }
        let spans: Vec<InlineSpan> = spans
            .into_iter()
            .map(|s| {
                if s.text().contains('\n') {
                    InlineSpan::new(s.text().replace('\n', " "), s.style())
                } else {
                    s
                }
            })
            .collect();

        let id = self.unique_slug(&text);
        let mut frag = Fragment::default();
        frag.lines.push(
            RenderedLine::with_spans(truncate_spans(&spans, width), LineType::Heading(level))
                .with_source_range(range),
        );
        frag.headings.push(HeadingRef {
            level,
            text,
            line: 0,
            id: Some(id),
            parent: None,
        });
        frag.links.extend(links.into_iter().map(|l| LinkRef {
            text: l.text,
            url: l.url,
            line: 0,
        }));
        frag
    }

    fn unique_slug(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base = "section".to_string();
        }
        let count = self.slug_counts.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        id
    }

    fn code_block(&self, language: Option<&str>, literal: &str, range: Option<Range<usize>>) -> Fragment {
        let code = literal.replace('\t', "    ");
        let raw_lines: Vec<&str> = code.lines().collect();
        let highlighted = self
            .ctx
            .highlighter()
            .highlight(language, &code)
            .filter(|lines| lines.len() == raw_lines.len());

        let mut frag = Fragment::default();
        for (i, raw) in raw_lines.iter().enumerate() {
            let spans = match &highlighted {
                Some(lines) => lines[i].clone(),
                None if raw.is_empty() => Vec::new(),
                None => vec![InlineSpan::new(*raw, InlineStyle::default())],
            };
            frag.lines.push(
                RenderedLine::with_spans(spans, LineType::CodeBlock).with_source_range(range.clone()),
            );
        }
        frag
    }

    fn list(&mut self, node: &'a AstNode<'a>, list: &NodeList, width: usize) -> Fragment {
        let items: Vec<&'a AstNode<'a>> = node.children().collect();
        let ordered = list.list_type == ListType::Ordered;
        let delim = if list.delimiter == ListDelimType::Paren {
            ')'
        } else {
            '.'
        };
        let last = list.start + items.len().saturating_sub(1);
        let number_width = last.to_string().len();
        let gap = !list.tight;

        self.list_depth += 1;
        let depth = depth_tag(self.list_depth);
        let mut frag = Fragment::default();
        for (i, item) in items.iter().enumerate() {
            let task = match &item.data.borrow().value {
                NodeValue::TaskItem(symbol) => Some(symbol.is_some()),
                _ => None,
            };
            let (marker, prefix) = if ordered {
                let n = list.start + i;
                (ListMarker::Ordered(n), format!("{n:>number_width$}{delim} "))
            } else {
                (ListMarker::Bullet, BULLET.to_string())
            };
            let prefix = match task {
                Some(true) if ordered => format!("{prefix}{TASK_DONE}"),
                Some(false) if ordered => format!("{prefix}{TASK_OPEN}"),
                Some(true) => TASK_DONE.to_string(),
                Some(false) => TASK_OPEN.to_string(),
                None => prefix,
            };
            let (first, child_width) = gutter(&prefix, width);
            let rest = " ".repeat(display_width(&first));

            let mut body = self.blocks(item, child_width, gap);
            if body.is_empty() {
                body.lines.push(RenderedLine::new(String::new(), LineType::Paragraph));
            }
            body.retag(
                |t| t == LineType::Paragraph,
                LineType::ListItem { depth, marker },
            );
            body.indent(&first, &rest);
            frag.append(body, gap);
        }
        self.list_depth -= 1;
        frag
    }

    fn blockquote(&mut self, node: &'a AstNode<'a>, width: usize) -> Fragment {
        let (prefix, child_width) = gutter(QUOTE_PREFIX, width);
        self.quote_depth += 1;
        let depth = depth_tag(self.quote_depth);
        let mut body = self.blocks(node, child_width, true);
        self.quote_depth -= 1;
        if body.is_empty() {
            body.lines.push(RenderedLine::empty());
        }
        body.retag(
            |t| matches!(t, LineType::Paragraph | LineType::Empty),
            LineType::BlockQuote(depth),
        );
        body.indent(&prefix, &prefix);
        body
    }

    fn table(
        &self,
        node: &'a AstNode<'a>,
        aligns: &[Align],
        width: usize,
        range: Option<Range<usize>>,
    ) -> Fragment {
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        let mut pending: Vec<(usize, PendingLink)> = Vec::new();
        for row in node.children() {
            let mut cells = Vec::new();
            for cell in row.children() {
                let mut spans = Vec::new();
                let mut links = Vec::new();
                for child in cell.children() {
                    collect_inline(child, InlineStyle::default(), &mut spans, &mut links);
                }
                let spans = spans
                    .into_iter()
                    .map(|s| InlineSpan::new(s.text().replace('\n', " "), s.style()))
                    .collect();
                cells.push(spans);
                pending.extend(links.into_iter().map(|l| (rows.len(), l)));
            }
            rows.push(cells);
        }

        let mut frag = Fragment::default();
        frag.lines = table::layout_table(&rows, aligns, width)
            .into_iter()
            .map(|line| line.with_source_range(range.clone()))
            .collect();
        // Top border, header, separator, then one line per body row.
        for (row, link) in pending {
            let line = if row == 0 { 1 } else { row + 2 };
            frag.links.push(LinkRef {
                text: link.text,
                url: link.url,
                line,
            });
        }
        frag
    }

    fn footnote(&mut self, node: &'a AstNode<'a>, label: &str, width: usize) -> Fragment {
        let (first, child_width) = gutter(&format!("[^{label}]: "), width);
        let rest = " ".repeat(display_width(&first));
        let mut body = self.blocks(node, child_width, true);
        if body.is_empty() {
            body.lines.push(RenderedLine::new(String::new(), LineType::Paragraph));
        }
        body.indent(&first, &rest);
        body.footnotes.insert(
            0,
            FootnoteRef {
                label: label.to_string(),
                line: 0,
            },
        );
        body
    }

    fn image_block(&self, node: &'a AstNode<'a>, link: Option<String>, width: usize) -> Fragment {
        let data = node.data.borrow();
        let NodeValue::Image(image) = &data.value else {
            return Fragment::default();
        };
        let src = image.url.clone();
        let alt = plain_text(node);
        let source = ImageSource::parse(&src);
        let label = if alt.trim().is_empty() { src.clone() } else { alt.clone() };
        let image_style = InlineStyle {
            emphasis: true,
            ..InlineStyle::default()
        };

        let mut frag = Fragment::default();
        let line_range = match self.ctx.image_slot(&src) {
            Some(ImageSlot::Rows(rows)) if rows > 0 => {
                let (margin, caption_width) = gutter(&" ".repeat(IMAGE_CAPTION_MARGIN), width);
                let mut spans = vec![InlineSpan::new(margin, InlineStyle::default())];
                spans.extend(truncate_spans(&[InlineSpan::new(label, image_style)], caption_width));
                frag.lines.push(RenderedLine::with_spans(spans, LineType::Image));
                for _ in 0..rows {
                    frag.lines.push(RenderedLine::new(String::new(), LineType::Image));
                }
                1..1 + usize::from(rows)
            }
            Some(ImageSlot::Missing) => {
                let text = format!("[Image not found: {}]", source.describe());
                frag.lines.push(placeholder_line(&text, width));
                0..1
            }
            _ => {
                frag.lines.push(placeholder_line(&format!("[Image: {label}]"), width));
                0..1
            }
        };
        let source_range = self.ast.byte_range(node);
        for line in &mut frag.lines {
            *line = std::mem::replace(line, RenderedLine::empty())
                .with_source_range(source_range.clone());
        }
        if let Some(url) = link {
            frag.links.push(LinkRef {
                text: alt.clone(),
                url,
                line: 0,
            });
        }
        frag.images.push(ImageRef {
            alt,
            src,
            source,
            source_range,
            line_range,
        });
        frag
    }

    fn plain_lines(&self, text: &str, width: usize, range: Option<Range<usize>>) -> Fragment {
        let mut frag = Fragment::default();
        for raw in text.lines() {
            let spans = [InlineSpan::new(raw, InlineStyle::default())];
            for row in wrap_spans(&spans, width) {
                frag.lines.push(
                    RenderedLine::with_spans(row.spans, LineType::Paragraph)
                        .with_source_range(range.clone()),
                );
            }
        }
        frag
    }
}

fn placeholder_line(text: &str, width: usize) -> RenderedLine {
    let style = InlineStyle {
        emphasis: true,
        ..InlineStyle::default()
    };
    RenderedLine::with_spans(
        truncate_spans(&[InlineSpan::new(text, style)], width),
        LineType::Image,
    )
}

/// An image that should be laid out as its own block: either a bare image
/// or a link wrapping nothing but an image (a badge).
fn hoistable_image<'a>(node: &'a AstNode<'a>) -> Option<(&'a AstNode<'a>, Option<String>)> {
    match &node.data.borrow().value {
        NodeValue::Image(_) => Some((node, None)),
        NodeValue::Link(link) => {
            let mut meaningful = node.children().filter(|c| !is_blank_text(c));
            let only = meaningful.next()?;
            if meaningful.next().is_some() {
                return None;
            }
            matches!(only.data.borrow().value, NodeValue::Image(_))
                .then(|| (only, Some(link.url.clone())))
        }
        _ => None,
    }
}

fn is_blank_text(node: &AstNode<'_>) -> bool {
    match &node.data.borrow().value {
        NodeValue::Text(t) => t.trim().is_empty(),
        NodeValue::SoftBreak | NodeValue::LineBreak => true,
        _ => false,
    }
}

fn char_len(spans: &[InlineSpan]) -> usize {
    spans.iter().map(|s| s.text().chars().count()).sum()
}

fn collect_inline<'a>(
    node: &'a AstNode<'a>,
    style: InlineStyle,
    spans: &mut Vec<InlineSpan>,
    links: &mut Vec<PendingLink>,
) {
    let children = |style: InlineStyle, spans: &mut Vec<InlineSpan>, links: &mut Vec<PendingLink>| {
        for child in node.children() {
            collect_inline(child, style, spans, links);
        }
    };
    match &node.data.borrow().value {
        NodeValue::Text(text) => push_merged(spans, text, style),
        NodeValue::Code(code) => push_merged(
            spans,
            &code.literal,
            InlineStyle {
                code: true,
                ..style
            },
        ),
        NodeValue::SoftBreak => push_merged(spans, " ", style),
        NodeValue::LineBreak => push_merged(spans, "\n", style),
        NodeValue::HtmlInline(html) => push_merged(spans, html, style),
        NodeValue::Emph => children(
            InlineStyle {
                emphasis: true,
                ..style
            },
            spans,
            links,
        ),
        NodeValue::Strong => children(
            InlineStyle {
                strong: true,
                ..style
            },
            spans,
            links,
        ),
        NodeValue::Strikethrough => children(
            InlineStyle {
                strikethrough: true,
                ..style
            },
            spans,
            links,
        ),
        NodeValue::Link(link) => {
            links.push(PendingLink {
                text: plain_text(node),
                url: link.url.clone(),
                start: char_len(spans),
            });
            children(
                InlineStyle {
                    link: true,
                    ..style
                },
                spans,
                links,
            );
        }
        NodeValue::Image(image) => {
            let alt = plain_text(node);
            let label = if alt.trim().is_empty() { &image.url } else { &alt };
            push_merged(
                spans,
                &format!("[Image: {label}]"),
                InlineStyle {
                    emphasis: true,
                    ..style
                },
            );
        }
        NodeValue::FootnoteReference(reference) => {
            links.push(PendingLink {
                text: reference.name.clone(),
                url: format!("#fn-{}", reference.name),
                start: char_len(spans),
            });
            push_merged(
                spans,
                &format!("[^{}]", reference.name),
                InlineStyle {
                    link: true,
                    ..style
                },
            );
        }
        _ => children(style, spans, links),
    }
}

/// Text content with all markup stripped.
fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut out = String::new();
    for child in node.descendants().skip(1) {
        match &child.data.borrow().value {
            NodeValue::Text(text) => out.push_str(text),
            NodeValue::Code(code) => out.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
            _ => {}
        }
    }
    out
}
