//! Markdown document parsing and layout.
//!
//! This module handles:
//! - Parsing markdown with comrak ([`parser`])
//! - Laying the AST out into width-dependent styled lines ([`layout`])
//! - Indexing headings, images, links and footnotes for navigation

pub mod layout;
pub mod parser;
mod table;
mod types;
mod wrap;

pub use layout::{IMAGE_CAPTION_MARGIN, ImageSlot, LayoutContext};
pub use types::{
    FootnoteRef, HeadingRef, ImageRef, InlineColor, InlineSpan, InlineStyle, LineType, LinkRef,
    ListMarker, RenderedDocument, RenderedLine, slugify,
};
pub use wrap::display_width;

use std::path::Path;

use comrak::Arena;

/// Image file extensions that are shown as a single inline image.
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff", "tif", "ico", "avif",
];

/// Parse `source` and lay it out at `width` columns.
///
/// Never fails: malformed markdown degrades to plain text.
pub fn parse_and_layout(source: &str, width: u16, ctx: &LayoutContext) -> RenderedDocument {
    let arena = Arena::new();
    let ast = parser::parse(&arena, source);
    layout::layout(&ast, width, ctx)
}

/// Prepare file content for rendering based on its extension.
///
/// Code files are wrapped in a fenced block of their language so they render
/// highlighted; image files become a one-image document. Markdown and
/// unrecognized files pass through unchanged.
pub fn prepare_content(file_path: &Path, content: String) -> String {
    if is_image_file(file_path) {
        return image_markdown(file_path);
    }
    let Some(language) = crate::highlight::language_for_file(file_path) else {
        return content;
    };
    let fence = if content.contains("```") { "~~~~" } else { "```" };
    format!("{fence}{language}\n{content}\n{fence}")
}

/// Returns true if the file extension is a recognized image format.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Markdown that displays an image file inline.
///
/// Angle brackets keep names with spaces or parentheses intact.
fn image_markdown(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("![{name}](<{name}>)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_content_wraps_rust_file() {
        let result = prepare_content(Path::new("main.rs"), "fn main() {}".to_string());
        assert!(result.starts_with("```Rust\n"), "{result}");
        assert!(result.ends_with("\n```"));
        assert!(result.contains("fn main() {}"));
    }

    #[test]
    fn test_prepare_content_passes_markdown_through() {
        let content = "# Hello\nworld".to_string();
        assert_eq!(prepare_content(Path::new("README.md"), content.clone()), content);
    }

    #[test]
    fn test_prepare_content_wraps_image_file() {
        let result = prepare_content(Path::new("dir/My Photo.PNG"), String::new());
        assert_eq!(result, "![My Photo.PNG](<My Photo.PNG>)");
    }

    #[test]
    fn test_image_file_document_has_one_image() {
        let md = prepare_content(Path::new("cat.png"), String::new());
        let doc = parse_and_layout(&md, 80, &LayoutContext::default());
        assert_eq!(doc.images().len(), 1);
        assert_eq!(doc.images()[0].src, "cat.png");
    }

    #[test]
    fn test_code_file_renders_as_code_lines() {
        let md = prepare_content(Path::new("lib.rs"), "mod a;\nmod b;".to_string());
        let doc = parse_and_layout(&md, 80, &LayoutContext::default());
        assert_eq!(doc.line_count(), 2);
        assert!(doc.lines().iter().all(|l| l.line_type() == LineType::CodeBlock));
    }
}
