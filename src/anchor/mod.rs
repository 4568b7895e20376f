//! Reading-position preservation across re-layouts.
//!
//! Before a reparse (file change) or re-layout (resize, image heights
//! settling) the viewer captures an [`AnchorSnapshot`] describing what the
//! reader is looking at. After the new [`RenderedDocument`] is built,
//! [`reconcile_anchor`] maps that snapshot back to a line offset.
//!
//! Resolution order:
//! 1. the anchored heading's id
//! 2. the anchored heading's normalized text
//! 3. the stored scroll percentage (only when no heading was above the top)
//! 4. a hash of the lines at the old top, searched near the old offset
//! 5. the top of the document

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::app::Model;
use crate::document::RenderedDocument;

/// Lines hashed for the content fallback.
pub const CONTENT_HASH_LINES: usize = 3;

/// Distance searched around the old offset when matching the content hash.
pub const CONTENT_HASH_WINDOW: usize = 64;

/// A description of the reader's position that survives re-layout.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollAnchor {
    /// Offset within the section of a heading.
    Heading {
        id: Option<String>,
        text: String,
        line_offset: usize,
    },
    /// Fraction of the document above the viewport top, in `0.0..=1.0`.
    Percentage(f32),
    /// Hash of the lines at the viewport top and where they were.
    ContentHash { hash: u64, line_offset: usize },
}

/// A primary anchor plus the content-hash fallback captured alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSnapshot {
    pub primary: ScrollAnchor,
    pub fallback: Option<ScrollAnchor>,
}

/// Capture the reading position of `model`.
pub fn capture_anchor(model: &Model) -> AnchorSnapshot {
    capture(&model.document, model.viewport.offset())
}

/// Capture the reading position of `offset` within `doc`.
pub fn capture(doc: &RenderedDocument, offset: usize) -> AnchorSnapshot {
    let primary = match doc.heading_at_or_before(offset) {
        Some(idx) => {
            let heading = &doc.headings()[idx];
            ScrollAnchor::Heading {
                id: heading.id.clone(),
                text: heading.text.clone(),
                line_offset: offset - heading.line,
            }
        }
        None => ScrollAnchor::Percentage(fraction(offset, doc.line_count())),
    };
    let fallback = content_hash(doc, offset).map(|hash| ScrollAnchor::ContentHash {
        hash,
        line_offset: offset,
    });
    AnchorSnapshot { primary, fallback }
}

/// Map a snapshot onto a freshly built document.
///
/// Always returns a line inside `doc` (or 0 for an empty document).
pub fn reconcile_anchor(doc: &RenderedDocument, snapshot: &AnchorSnapshot) -> usize {
    let last = doc.line_count().saturating_sub(1);
    let resolved = match &snapshot.primary {
        ScrollAnchor::Heading {
            id,
            text,
            line_offset,
        } => find_heading(doc, id.as_deref(), text)
            .map(|idx| offset_in_section(doc, idx, *line_offset)),
        ScrollAnchor::Percentage(pct) => Some(from_fraction(*pct, doc.line_count())),
        ScrollAnchor::ContentHash { hash, line_offset } => find_content(doc, *hash, *line_offset),
    };
    let resolved = resolved.or_else(|| match &snapshot.fallback {
        Some(ScrollAnchor::ContentHash { hash, line_offset }) => {
            find_content(doc, *hash, *line_offset)
        }
        _ => None,
    });
    if resolved.is_none() {
        tracing::debug!("scroll anchor missed, returning to top");
    }
    resolved.unwrap_or(0).min(last)
}

fn find_heading(doc: &RenderedDocument, id: Option<&str>, text: &str) -> Option<usize> {
    let headings = doc.headings();
    if let Some(id) = id
        && let Some(idx) = headings.iter().position(|h| h.id.as_deref() == Some(id))
    {
        return Some(idx);
    }
    let wanted = normalize(text);
    headings.iter().position(|h| normalize(&h.text) == wanted)
}

fn offset_in_section(doc: &RenderedDocument, idx: usize, line_offset: usize) -> usize {
    let start = doc.headings()[idx].line;
    let len = doc.section_end(idx).saturating_sub(start);
    start + line_offset.min(len.saturating_sub(1))
}

/// Lowercase with runs of whitespace collapsed to one space.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn content_hash(doc: &RenderedDocument, offset: usize) -> Option<u64> {
    let lines = doc.visible_lines(offset, CONTENT_HASH_LINES);
    if lines.is_empty() {
        return None;
    }
    let mut hasher = DefaultHasher::new();
    for line in lines {
        line.text().hash(&mut hasher);
    }
    Some(hasher.finish())
}

/// Nearest offset to `around` whose top lines hash to `hash`.
fn find_content(doc: &RenderedDocument, hash: u64, around: usize) -> Option<usize> {
    let total = doc.line_count();
    if total == 0 {
        return None;
    }
    (0..=CONTENT_HASH_WINDOW)
        .flat_map(|d| {
            let below = around.checked_add(d);
            let above = if d == 0 { None } else { around.checked_sub(d) };
            below.into_iter().chain(above)
        })
        .filter(|&candidate| candidate < total)
        .find(|&candidate| content_hash(doc, candidate) == Some(hash))
}

fn fraction(offset: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        (offset as f32 / total as f32).clamp(0.0, 1.0)
    }
}

fn from_fraction(pct: f32, total: usize) -> usize {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    {
        (pct.clamp(0.0, 1.0) * total as f32).round() as usize
    }
}
