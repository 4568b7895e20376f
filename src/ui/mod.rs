//! Terminal UI components.
//!
//! This module contains all UI-related code including:
//! - [`viewport`]: Scroll position and visible range management
//! - [`style`]: Theming and colors
//! - [`images`]: Protocol-encoded image surfaces

pub mod images;
pub mod style;
pub mod viewport;

mod overlays;
mod render;
mod status;

pub use render::{document_content_width, render, split_main_columns};
pub use status::status_text;

pub const DOCUMENT_LEFT_PADDING: u16 = 2;
pub const TOC_WIDTH_PERCENT: u16 = 30;
pub const DOC_WIDTH_PERCENT: u16 = 70;
